//! Token-based parser for Volpe
//!
//! A recursive descent parser that consumes tokens from the lexer and
//! produces the sequence of top-level expressions of a program.

use std::rc::Rc;

use crate::ast::{
    AssignTarget, BinaryOperator, Expression, Literal, LogicalOperator, SourceSpan,
    UnaryOperator,
};
use crate::error::SyntaxError;
use crate::lexer::{Position, Span, Token, TokenKind};

type Result<T> = std::result::Result<T, SyntaxError>;

/// Parser that consumes tokens to produce expressions
pub struct TokenParser {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenParser {
    /// Create a new parser from a token stream.
    /// The stream is expected to end with an `Eof` token, as produced by the lexer.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let end = tokens.last().map_or(
                Position {
                    line: 1,
                    column: 1,
                    offset: 0,
                },
                |t| t.span.end.clone(),
            );
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span {
                    start: end.clone(),
                    end,
                    text: String::new(),
                },
            });
        }
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Vec<Expression>> {
        let mut expressions = Vec::new();

        loop {
            self.skip_semicolons();
            if self.is_at_end() {
                break;
            }
            expressions.push(self.parse_expression()?);
        }

        Ok(expressions)
    }

    /// Parse an expression
    fn parse_expression(&mut self) -> Result<Expression> {
        if self.check(&TokenKind::Let) {
            return self.parse_declaration();
        }
        self.parse_assignment()
    }

    /// Parse a declaration: `let name = value`
    fn parse_declaration(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        self.expect(&TokenKind::Let)?;
        let name = self.parse_identifier()?;
        self.expect(&TokenKind::Equal)?;
        let value = self.parse_expression()?;

        Ok(Expression::Declaration {
            name,
            value: Box::new(value),
            span: self.span_from(start),
        })
    }

    /// Parse an assignment (right associative) or fall through to `||`
    fn parse_assignment(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        let expr = self.parse_or()?;

        if !self.check(&TokenKind::Equal) {
            return Ok(expr);
        }
        self.advance();
        let value = self.parse_expression()?;

        let target = match expr {
            Expression::Variable { name, .. } => AssignTarget::Variable(name),
            Expression::Index { object, index, .. } => AssignTarget::Index { object, index },
            Expression::Member { object, field, .. } => AssignTarget::Member { object, field },
            other => {
                return Err(SyntaxError::new(
                    "invalid assignment target",
                    other.span(),
                ))
            }
        };

        Ok(Expression::Assignment {
            target,
            value: Box::new(value),
            span: self.span_from(start),
        })
    }

    /// Parse or expression
    fn parse_or(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_and()?;

        while self.check(&TokenKind::OrOr) {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::Logical {
                left: Box::new(left),
                op: LogicalOperator::Or,
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    /// Parse and expression
    fn parse_and(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_equality()?;

        while self.check(&TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_equality()?;
            left = Expression::Logical {
                left: Box::new(left),
                op: LogicalOperator::And,
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    /// Parse equality expression
    fn parse_equality(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_comparison()?;

        loop {
            let op = if self.check(&TokenKind::EqualEqual) {
                BinaryOperator::Equal
            } else if self.check(&TokenKind::NotEqual) {
                BinaryOperator::NotEqual
            } else {
                break;
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = self.binary(left, op, right, start);
        }

        Ok(left)
    }

    /// Parse comparison expression
    fn parse_comparison(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_addition()?;

        loop {
            let op = if self.check(&TokenKind::Less) {
                BinaryOperator::LessThan
            } else if self.check(&TokenKind::LessEqual) {
                BinaryOperator::LessThanOrEqual
            } else if self.check(&TokenKind::Greater) {
                BinaryOperator::GreaterThan
            } else if self.check(&TokenKind::GreaterEqual) {
                BinaryOperator::GreaterThanOrEqual
            } else {
                break;
            };
            self.advance();
            let right = self.parse_addition()?;
            left = self.binary(left, op, right, start);
        }

        Ok(left)
    }

    /// Parse addition/subtraction
    fn parse_addition(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_multiplication()?;

        loop {
            let op = if self.check(&TokenKind::Plus) {
                BinaryOperator::Add
            } else if self.check(&TokenKind::Minus) {
                BinaryOperator::Subtract
            } else {
                break;
            };
            self.advance();
            let right = self.parse_multiplication()?;
            left = self.binary(left, op, right, start);
        }

        Ok(left)
    }

    /// Parse multiplication/division
    fn parse_multiplication(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_unary()?;

        loop {
            let op = if self.check(&TokenKind::Star) {
                BinaryOperator::Multiply
            } else if self.check(&TokenKind::Slash) {
                BinaryOperator::Divide
            } else if self.check(&TokenKind::Percent) {
                BinaryOperator::Modulo
            } else {
                break;
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(left, op, right, start);
        }

        Ok(left)
    }

    fn binary(
        &self,
        left: Expression,
        op: BinaryOperator,
        right: Expression,
        start: usize,
    ) -> Expression {
        Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
            span: self.span_from(start),
        }
    }

    /// Parse unary expression
    fn parse_unary(&mut self) -> Result<Expression> {
        let start = self.mark_position();

        let op = if self.check(&TokenKind::Minus) {
            UnaryOperator::Negate
        } else if self.check(&TokenKind::Bang) {
            UnaryOperator::Not
        } else {
            return self.parse_postfix();
        };

        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expression::UnaryOp {
            op,
            operand: Box::new(operand),
            span: self.span_from(start),
        })
    }

    /// Parse postfix expressions (calls, member access, indexing)
    fn parse_postfix(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(&TokenKind::LeftParen) && matches!(expr, Expression::Variable { .. }) {
                // Function call - only if expression is a bare name
                self.advance();
                let args = self.parse_argument_list(&TokenKind::RightParen)?;
                self.expect(&TokenKind::RightParen)?;

                if let Expression::Variable { name, .. } = expr {
                    expr = Expression::FunctionCall {
                        name,
                        args,
                        span: self.span_from(start),
                    };
                }
            } else if self.check(&TokenKind::LeftBracket) {
                self.advance();
                let index = self.parse_expression()?;
                self.expect(&TokenKind::RightBracket)?;
                expr = Expression::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    span: self.span_from(start),
                };
            } else if self.check(&TokenKind::Dot) {
                self.advance();
                let field = self.parse_identifier()?;
                expr = Expression::Member {
                    object: Box::new(expr),
                    field,
                    span: self.span_from(start),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parse comma separated expressions up to (not including) `closing`.
    /// A trailing comma is allowed.
    fn parse_argument_list(&mut self, closing: &TokenKind) -> Result<Vec<Expression>> {
        let mut args = Vec::new();
        while !self.check(closing) {
            args.push(self.parse_expression()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(args)
    }

    /// Parse primary expression
    fn parse_primary(&mut self) -> Result<Expression> {
        let span = self.current_span();

        let literal = match &self.current().kind {
            TokenKind::Number(n) => Some(Literal::Number(*n)),
            TokenKind::String(s) => Some(Literal::String(s.clone())),
            TokenKind::True => Some(Literal::Boolean(true)),
            TokenKind::False => Some(Literal::Boolean(false)),
            TokenKind::Void => Some(Literal::Void),
            _ => None,
        };
        if let Some(value) = literal {
            self.advance();
            return Ok(Expression::Literal { value, span });
        }

        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(Expression::Variable { name, span })
            }

            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }

            TokenKind::LeftBracket => self.parse_array(),
            TokenKind::HashBrace => self.parse_object(),
            TokenKind::LeftBrace => self.parse_block(),
            TokenKind::Ampersand => self.parse_function_reference(),
            TokenKind::Fn => self.parse_function(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),

            TokenKind::Eof => Err(SyntaxError::new("unexpected end of input", span)),
            other => Err(SyntaxError::new(
                format!("unexpected token {:?}", other),
                span,
            )),
        }
    }

    /// Parse array literal: `[a, b, c]`
    fn parse_array(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        self.expect(&TokenKind::LeftBracket)?;
        let elements = self.parse_argument_list(&TokenKind::RightBracket)?;
        self.expect(&TokenKind::RightBracket)?;

        Ok(Expression::Array {
            elements,
            span: self.span_from(start),
        })
    }

    /// Parse object literal: `#{ key: value, "quoted key": value }`
    fn parse_object(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        self.expect(&TokenKind::HashBrace)?;

        let mut entries = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            let key = match &self.current().kind {
                TokenKind::Identifier(name) => name.clone(),
                TokenKind::String(s) => s.clone(),
                other => {
                    return Err(SyntaxError::new(
                        format!("expected object key, found {:?}", other),
                        self.current_span(),
                    ))
                }
            };
            self.advance();
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expression()?;
            entries.push((key, value));

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(Expression::Object {
            entries,
            span: self.span_from(start),
        })
    }

    /// Parse a block: `{ expr; expr }`
    fn parse_block(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        self.expect(&TokenKind::LeftBrace)?;

        let mut expressions = Vec::new();
        loop {
            self.skip_semicolons();
            if self.check(&TokenKind::RightBrace) {
                break;
            }
            if self.is_at_end() {
                return Err(SyntaxError::new(
                    "unclosed block, expected '}'",
                    self.current_span(),
                ));
            }
            expressions.push(self.parse_expression()?);
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(Expression::Block {
            expressions,
            span: self.span_from(start),
        })
    }

    /// Parse a function reference: `&name`
    fn parse_function_reference(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        self.expect(&TokenKind::Ampersand)?;
        let name = self.parse_identifier()?;

        Ok(Expression::FunctionReference {
            name,
            span: self.span_from(start),
        })
    }

    /// Parse a named function definition or an anonymous function
    fn parse_function(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        self.expect(&TokenKind::Fn)?;

        let name = if self.check_identifier() {
            Some(self.parse_identifier()?)
        } else {
            None
        };
        let params = self.parse_param_list()?;
        let body = Rc::new(self.parse_block()?);
        let span = self.span_from(start);

        Ok(match name {
            Some(name) => Expression::FunctionDef {
                name,
                params,
                body,
                span,
            },
            None => Expression::Lambda { params, body, span },
        })
    }

    /// Parse parameter list: `(a, b, c)`
    fn parse_param_list(&mut self) -> Result<Vec<String>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RightParen) {
            params.push(self.parse_identifier()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(params)
    }

    /// Parse if expression: `if cond { ... } else if cond { ... } else { ... }`
    fn parse_if(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        self.expect(&TokenKind::If)?;
        let condition = self.parse_expression()?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.check(&TokenKind::Else) {
            self.advance();
            if self.check(&TokenKind::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                Some(Box::new(self.parse_block()?))
            }
        } else {
            None
        };

        Ok(Expression::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch,
            span: self.span_from(start),
        })
    }

    /// Parse while loop: `while cond { ... }`
    fn parse_while(&mut self) -> Result<Expression> {
        let start = self.mark_position();
        self.expect(&TokenKind::While)?;
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;

        Ok(Expression::While {
            condition: Box::new(condition),
            body: Box::new(body),
            span: self.span_from(start),
        })
    }

    /// Parse an identifier
    fn parse_identifier(&mut self) -> Result<String> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let n = name.clone();
                self.advance();
                Ok(n)
            }
            other => Err(SyntaxError::new(
                format!("expected identifier, found {:?}", other),
                self.current_span(),
            )),
        }
    }

    // Helper methods

    fn current(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.position += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn check_identifier(&self) -> bool {
        matches!(self.current().kind, TokenKind::Identifier(_))
    }

    fn skip_semicolons(&mut self) {
        while self.check(&TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(SyntaxError::new(
                format!("expected {:?}, found {:?}", kind, self.current().kind),
                self.current_span(),
            ))
        }
    }

    /// Mark the current position to start tracking a span
    fn mark_position(&self) -> usize {
        self.position
    }

    /// Create a SourceSpan from a marked position to the last consumed token
    fn span_from(&self, start_pos: usize) -> SourceSpan {
        let start_token = &self.tokens[start_pos];
        let end_pos = self.position.saturating_sub(1).max(start_pos);
        let end_token = &self.tokens[end_pos];

        SourceSpan {
            line: start_token.span.start.line,
            column: start_token.span.start.column,
            offset: start_token.span.start.offset,
            length: end_token
                .span
                .end
                .offset
                .saturating_sub(start_token.span.start.offset),
        }
    }

    /// Get the span of the current token
    fn current_span(&self) -> SourceSpan {
        SourceSpan::from(&self.current().span)
    }
}

/// Parse source code using the token-based parser
pub fn parse(source: &str) -> Result<Vec<Expression>> {
    let tokens = crate::lexer::tokenize(source)?;
    let mut parser = TokenParser::new(tokens);
    parser.parse_program()
}
