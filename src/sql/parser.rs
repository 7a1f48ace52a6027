//! # SQL Parser
//!
//! Recursive descent over the token stream with classic precedence
//! climbing for expressions:
//!
//! ```text
//! expr   := or
//! or     := and (OR and)*
//! and    := not (AND not)*
//! not    := NOT not | cmp
//! cmp    := add ((= | != | < | <= | > | >=) add)?
//! add    := mul ((+ | -) mul)*
//! mul    := unary ((* | /) unary)*
//! unary  := - unary | primary
//! primary:= number | string | TRUE | FALSE | NULL
//!         | identifier [ ( args ) ] | ( expr )
//! ```
//!
//! Statements cover the engine's surface: `CREATE TABLE`, `DROP TABLE`,
//! `INSERT INTO ... VALUES`, and `SELECT` with FROM / WHERE / GROUP BY /
//! HAVING / ORDER BY. All nodes land in the caller's bumpalo arena.

use bumpalo::Bump;
use eyre::Result;

use crate::error::Error;
use crate::types::Type;

use super::ast::{BinaryOp, ColumnDecl, Expr, OrderByItem, SelectStmt, Statement, UnaryOp};
use super::lexer::{tokenize, Keyword, Token};

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
    arena: &'a Bump,
}

/// Parses one statement; trailing semicolons are allowed, trailing garbage
/// is not.
pub fn parse_statement<'a>(arena: &'a Bump, input: &'a str) -> Result<Statement<'a>> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        position: 0,
        arena,
    };
    let statement = parser.statement()?;
    parser.accept(Token::Semicolon);
    parser.expect(Token::Eof)?;
    Ok(statement)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Token<'a> {
        self.tokens[self.position]
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.tokens[self.position];
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn accept(&mut self, token: Token<'a>) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn accept_keyword(&mut self, keyword: Keyword) -> bool {
        self.accept(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token<'a>) -> Result<()> {
        if self.accept(token) {
            Ok(())
        } else {
            Err(Error::parse(format!(
                "expected {token:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn identifier(&mut self) -> Result<&'a str> {
        match self.advance() {
            Token::Identifier(name) => Ok(name),
            other => Err(Error::parse(format!("expected identifier, found {other:?}"))),
        }
    }

    fn statement(&mut self) -> Result<Statement<'a>> {
        match self.peek() {
            Token::Keyword(Keyword::Create) => self.create_table(),
            Token::Keyword(Keyword::Drop) => self.drop_table(),
            Token::Keyword(Keyword::Insert) => self.insert(),
            Token::Keyword(Keyword::Select) => self.select(),
            other => Err(Error::parse(format!(
                "expected CREATE, DROP, INSERT or SELECT, found {other:?}"
            ))),
        }
    }

    fn create_table(&mut self) -> Result<Statement<'a>> {
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Table)?;
        let name = self.identifier()?;
        self.expect(Token::LParen)?;

        let mut columns = bumpalo::collections::Vec::new_in(self.arena);
        loop {
            columns.push(self.column_decl()?);
            if !self.accept(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;

        Ok(Statement::CreateTable {
            name,
            columns: columns.into_bump_slice(),
        })
    }

    fn column_decl(&mut self) -> Result<ColumnDecl<'a>> {
        let name = self.identifier()?;
        let type_name = self.identifier()?;

        let ty = match type_name.to_ascii_lowercase().as_str() {
            "boolean" => Type::Boolean,
            "uint64" => Type::Uint64,
            "int64" => Type::Int64,
            "varchar" => Type::Varchar,
            "string" => Type::String,
            other => {
                return Err(Error::parse(format!(
                    "unknown column type '{other}' for column '{name}'"
                )))
            }
        };

        let mut length = 0u32;
        if ty == Type::Varchar {
            self.expect(Token::LParen)?;
            match self.advance() {
                Token::Number(value) if value > 0 => length = value as u32,
                other => {
                    return Err(Error::parse(format!(
                        "varchar length must be a positive number, found {other:?}"
                    )))
                }
            }
            self.expect(Token::RParen)?;
        }

        Ok(ColumnDecl { name, ty, length })
    }

    fn drop_table(&mut self) -> Result<Statement<'a>> {
        self.expect_keyword(Keyword::Drop)?;
        self.expect_keyword(Keyword::Table)?;
        let name = self.identifier()?;
        Ok(Statement::DropTable { name })
    }

    fn insert(&mut self) -> Result<Statement<'a>> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let table = self.identifier()?;
        self.expect_keyword(Keyword::Values)?;
        self.expect(Token::LParen)?;

        let mut values = bumpalo::collections::Vec::new_in(self.arena);
        loop {
            values.push(&*self.arena.alloc(self.expression()?));
            if !self.accept(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;

        Ok(Statement::Insert {
            table,
            values: values.into_bump_slice(),
        })
    }

    fn select(&mut self) -> Result<Statement<'a>> {
        self.expect_keyword(Keyword::Select)?;

        let mut projection = bumpalo::collections::Vec::new_in(self.arena);
        loop {
            if self.accept(Token::Star) {
                projection.push(&*self.arena.alloc(Expr::Star));
            } else {
                projection.push(&*self.arena.alloc(self.expression()?));
            }
            if !self.accept(Token::Comma) {
                break;
            }
        }

        let mut from = bumpalo::collections::Vec::new_in(self.arena);
        if self.accept_keyword(Keyword::From) {
            loop {
                from.push(self.identifier()?);
                if !self.accept(Token::Comma) {
                    break;
                }
            }
        }

        let where_clause = if self.accept_keyword(Keyword::Where) {
            Some(&*self.arena.alloc(self.expression()?))
        } else {
            None
        };

        let mut group_by = bumpalo::collections::Vec::new_in(self.arena);
        if self.accept_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            loop {
                group_by.push(&*self.arena.alloc(self.expression()?));
                if !self.accept(Token::Comma) {
                    break;
                }
            }
        }

        let having = if self.accept_keyword(Keyword::Having) {
            Some(&*self.arena.alloc(self.expression()?))
        } else {
            None
        };

        let mut order_by = bumpalo::collections::Vec::new_in(self.arena);
        if self.accept_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            loop {
                let expr = &*self.arena.alloc(self.expression()?);
                let desc = if self.accept_keyword(Keyword::Desc) {
                    true
                } else {
                    self.accept_keyword(Keyword::Asc);
                    false
                };
                order_by.push(OrderByItem { expr, desc });
                if !self.accept(Token::Comma) {
                    break;
                }
            }
        }

        let select = self.arena.alloc(SelectStmt {
            projection: projection.into_bump_slice(),
            from: from.into_bump_slice(),
            where_clause,
            group_by: group_by.into_bump_slice(),
            having,
            order_by: order_by.into_bump_slice(),
        });
        Ok(Statement::Select(select))
    }

    fn expression(&mut self) -> Result<Expr<'a>> {
        self.or_expression()
    }

    fn binary(&mut self, op: BinaryOp, lhs: Expr<'a>, rhs: Expr<'a>) -> Expr<'a> {
        Expr::Binary {
            op,
            lhs: self.arena.alloc(lhs),
            rhs: self.arena.alloc(rhs),
        }
    }

    fn or_expression(&mut self) -> Result<Expr<'a>> {
        let mut lhs = self.and_expression()?;
        while self.accept_keyword(Keyword::Or) {
            let rhs = self.and_expression()?;
            lhs = self.binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expression(&mut self) -> Result<Expr<'a>> {
        let mut lhs = self.not_expression()?;
        while self.accept_keyword(Keyword::And) {
            let rhs = self.not_expression()?;
            lhs = self.binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn not_expression(&mut self) -> Result<Expr<'a>> {
        if self.accept_keyword(Keyword::Not) {
            let operand = self.not_expression()?;
            Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: self.arena.alloc(operand),
            })
        } else {
            self.comparison()
        }
    }

    fn comparison(&mut self) -> Result<Expr<'a>> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Token::Eq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::NotEq,
            Token::Lt => BinaryOp::Lt,
            Token::LtEq => BinaryOp::LtEq,
            Token::Gt => BinaryOp::Gt,
            Token::GtEq => BinaryOp::GtEq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.additive()?;
        Ok(self.binary(op, lhs, rhs))
    }

    fn additive(&mut self) -> Result<Expr<'a>> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = self.binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr<'a>> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = self.binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr<'a>> {
        if self.accept(Token::Minus) {
            let operand = self.unary()?;
            Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: self.arena.alloc(operand),
            })
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Result<Expr<'a>> {
        match self.advance() {
            Token::Number(value) => Ok(Expr::Number(value)),
            Token::StringLiteral(text) => Ok(Expr::String(text)),
            Token::Keyword(Keyword::True) => Ok(Expr::Bool(true)),
            Token::Keyword(Keyword::False) => Ok(Expr::Bool(false)),
            Token::Keyword(Keyword::Null) => Ok(Expr::Null),
            Token::Identifier(name) => {
                if self.accept(Token::LParen) {
                    let mut arguments = bumpalo::collections::Vec::new_in(self.arena);
                    if self.peek() != Token::RParen {
                        loop {
                            arguments.push(&*self.arena.alloc(self.expression()?));
                            if !self.accept(Token::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(Token::RParen)?;
                    Ok(Expr::Function {
                        name,
                        arguments: arguments.into_bump_slice(),
                    })
                } else {
                    Ok(Expr::Identifier(name))
                }
            }
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(Error::parse(format!(
                "expected an expression, found {other:?}"
            ))),
        }
    }
}
