//! Lexer module for Volpe - tokenizes source code before parsing
//!
//! Two phases, as in most of the toolchain:
//! 1. Lexer: Source code → Token stream
//! 2. Parser: Token stream → expression tree
//!
//! The token grammar lives in `lexer.pest`.

use pest::error::InputLocation;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::SourceSpan;
use crate::error::SyntaxError;

#[derive(Parser)]
#[grammar = "lexer.pest"]
struct LexerParser;

/// Position information for a token
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// A token with its value and position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Span of source text
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
    pub text: String,
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Let,
    Fn,
    If,
    Else,
    While,
    True,
    False,
    Void,

    // Literals
    Identifier(String),
    Number(f64),
    String(String),

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    Equal,        // =
    EqualEqual,   // ==
    NotEqual,     // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Bang,         // !
    AndAnd,       // &&
    OrOr,         // ||
    Ampersand,    // &

    // Punctuation
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    LeftBrace,    // {
    RightBrace,   // }
    HashBrace,    // #{
    Comma,        // ,
    Dot,          // .
    Semicolon,    // ;
    Colon,        // :

    // Special
    Eof,
}

/// Lexer that converts source code to tokens
pub struct Lexer<'a> {
    source: &'a str,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the source code
    pub fn tokenize(&mut self) -> Result<Vec<Token>, SyntaxError> {
        let pairs = LexerParser::parse(Rule::tokens, self.source).map_err(|e| {
            let offset = match e.location {
                InputLocation::Pos(pos) => pos,
                InputLocation::Span((start, _)) => start,
            };
            let position = self.position_from_offset(offset);
            SyntaxError::new(
                "unrecognized input",
                SourceSpan::new(position.line, position.column, offset, 1),
            )
        })?;

        for pair in pairs {
            if pair.as_rule() == Rule::tokens {
                for inner in pair.into_inner() {
                    if inner.as_rule() == Rule::token {
                        if let Some(token) = self.process_token(inner)? {
                            self.tokens.push(token);
                        }
                    }
                }
            }
        }

        // Add EOF token
        let eof_pos = self.position_from_offset(self.source.len());
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span {
                start: eof_pos.clone(),
                end: eof_pos,
                text: String::new(),
            },
        });

        Ok(std::mem::take(&mut self.tokens))
    }

    /// Process a single token pair
    fn process_token(
        &self,
        pair: pest::iterators::Pair<Rule>,
    ) -> Result<Option<Token>, SyntaxError> {
        let span = self.span_from_pair(&pair);

        for inner in pair.into_inner() {
            let kind = match inner.as_rule() {
                Rule::keyword_token => match inner.as_str() {
                    "let" => TokenKind::Let,
                    "fn" => TokenKind::Fn,
                    "if" => TokenKind::If,
                    "else" => TokenKind::Else,
                    "while" => TokenKind::While,
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "void" => TokenKind::Void,
                    kw => return Err(self.error(format!("unknown keyword `{}`", kw), &span)),
                },

                Rule::identifier_token => TokenKind::Identifier(inner.as_str().to_string()),

                Rule::number_token => {
                    let text = inner.as_str();
                    let n: f64 = text
                        .parse()
                        .map_err(|_| self.error(format!("invalid number `{}`", text), &span))?;
                    TokenKind::Number(n)
                }

                Rule::string_token => {
                    let text = inner.as_str();
                    // Remove quotes and unescape
                    TokenKind::String(unescape_string(&text[1..text.len() - 1]))
                }

                Rule::operator_token => match inner.as_str() {
                    "==" => TokenKind::EqualEqual,
                    "!=" => TokenKind::NotEqual,
                    "<=" => TokenKind::LessEqual,
                    ">=" => TokenKind::GreaterEqual,
                    "&&" => TokenKind::AndAnd,
                    "||" => TokenKind::OrOr,
                    "+" => TokenKind::Plus,
                    "-" => TokenKind::Minus,
                    "*" => TokenKind::Star,
                    "/" => TokenKind::Slash,
                    "%" => TokenKind::Percent,
                    "<" => TokenKind::Less,
                    ">" => TokenKind::Greater,
                    "=" => TokenKind::Equal,
                    "!" => TokenKind::Bang,
                    "&" => TokenKind::Ampersand,
                    op => return Err(self.error(format!("unknown operator `{}`", op), &span)),
                },

                Rule::punctuation_token => match inner.as_str() {
                    "#{" => TokenKind::HashBrace,
                    "(" => TokenKind::LeftParen,
                    ")" => TokenKind::RightParen,
                    "[" => TokenKind::LeftBracket,
                    "]" => TokenKind::RightBracket,
                    "{" => TokenKind::LeftBrace,
                    "}" => TokenKind::RightBrace,
                    "," => TokenKind::Comma,
                    "." => TokenKind::Dot,
                    ";" => TokenKind::Semicolon,
                    ":" => TokenKind::Colon,
                    p => return Err(self.error(format!("unknown punctuation `{}`", p), &span)),
                },

                _ => continue,
            };

            return Ok(Some(Token { kind, span }));
        }

        Ok(None)
    }

    fn error(&self, message: String, span: &Span) -> SyntaxError {
        SyntaxError::new(message, SourceSpan::from(span))
    }

    /// Create a Span from a pest Pair
    fn span_from_pair(&self, pair: &pest::iterators::Pair<Rule>) -> Span {
        let pest_span = pair.as_span();
        Span {
            start: self.position_from_offset(pest_span.start()),
            end: self.position_from_offset(pest_span.end()),
            text: pair.as_str().to_string(),
        }
    }

    /// Calculate line and column from byte offset
    fn position_from_offset(&self, offset: usize) -> Position {
        let mut line = 1;
        let mut column = 1;

        for (i, c) in self.source.char_indices() {
            if i >= offset {
                break;
            }
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }

        Position {
            line,
            column,
            offset,
        }
    }
}

/// Unescape a string body (handle \n, \t, etc.)
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Convenience function to tokenize a string
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_keywords() {
        let tokens = tokenize("let fn if else while").unwrap();
        assert_eq!(tokens.len(), 6); // 5 keywords + EOF
        assert!(matches!(tokens[0].kind, TokenKind::Let));
        assert!(matches!(tokens[1].kind, TokenKind::Fn));
        assert!(matches!(tokens[2].kind, TokenKind::If));
        assert!(matches!(tokens[3].kind, TokenKind::Else));
        assert!(matches!(tokens[4].kind, TokenKind::While));
    }

    #[test]
    fn test_keyword_vs_identifier() {
        // "let" is a keyword, "letter" is an identifier
        let tokens = tokenize("let letter voided").unwrap();
        assert_eq!(tokens.len(), 4);
        assert!(matches!(tokens[0].kind, TokenKind::Let));
        assert!(matches!(&tokens[1].kind, TokenKind::Identifier(s) if s == "letter"));
        assert!(matches!(&tokens[2].kind, TokenKind::Identifier(s) if s == "voided"));
    }

    #[test]
    fn test_tokenize_assignment() {
        let tokens = tokenize("x = 42").unwrap();
        assert_eq!(tokens.len(), 4); // identifier, =, number, EOF
        assert!(matches!(&tokens[0].kind, TokenKind::Identifier(s) if s == "x"));
        assert!(matches!(tokens[1].kind, TokenKind::Equal));
        assert!(matches!(tokens[2].kind, TokenKind::Number(n) if n == 42.0));
    }

    #[test]
    fn test_tokenize_numbers() {
        let tokens = tokenize("3.14 1e3 7").unwrap();
        assert!(matches!(tokens[0].kind, TokenKind::Number(n) if n == 3.14));
        assert!(matches!(tokens[1].kind, TokenKind::Number(n) if n == 1000.0));
        assert!(matches!(tokens[2].kind, TokenKind::Number(n) if n == 7.0));
    }

    #[test]
    fn test_tokenize_string_escapes() {
        let tokens = tokenize(r#""a\"b\nc""#).unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(matches!(&tokens[0].kind, TokenKind::String(s) if s == "a\"b\nc"));
    }

    #[test]
    fn test_tokenize_operators() {
        let tokens = tokenize("+ - * / == != <= >= && || & !").unwrap();
        assert!(matches!(tokens[0].kind, TokenKind::Plus));
        assert!(matches!(tokens[1].kind, TokenKind::Minus));
        assert!(matches!(tokens[2].kind, TokenKind::Star));
        assert!(matches!(tokens[3].kind, TokenKind::Slash));
        assert!(matches!(tokens[4].kind, TokenKind::EqualEqual));
        assert!(matches!(tokens[5].kind, TokenKind::NotEqual));
        assert!(matches!(tokens[6].kind, TokenKind::LessEqual));
        assert!(matches!(tokens[7].kind, TokenKind::GreaterEqual));
        assert!(matches!(tokens[8].kind, TokenKind::AndAnd));
        assert!(matches!(tokens[9].kind, TokenKind::OrOr));
        assert!(matches!(tokens[10].kind, TokenKind::Ampersand));
        assert!(matches!(tokens[11].kind, TokenKind::Bang));
    }

    #[test]
    fn test_object_brace() {
        let tokens = tokenize("#{ a: 1 }").unwrap();
        assert!(matches!(tokens[0].kind, TokenKind::HashBrace));
        assert!(matches!(tokens[2].kind, TokenKind::Colon));
        assert!(matches!(tokens[4].kind, TokenKind::RightBrace));
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = tokenize("1 // the rest is ignored\n2").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].span.start.line, 2);
        assert_eq!(tokens[1].span.start.column, 1);
    }

    #[test]
    fn test_token_positions() {
        let tokens = tokenize("x\n  y").unwrap();
        assert_eq!(tokens[0].span.start.line, 1);
        assert_eq!(tokens[1].span.start.line, 2);
        assert_eq!(tokens[1].span.start.column, 3);
        assert_eq!(tokens[1].span.start.offset, 4);
    }

    #[test]
    fn test_unrecognized_input() {
        let err = tokenize("x = @").unwrap_err();
        assert_eq!(err.span.line, 1);
        assert_eq!(err.span.column, 5);
    }
}
