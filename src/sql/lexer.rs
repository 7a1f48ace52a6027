//! # SQL Lexer
//!
//! A single-pass, zero-copy tokenizer: identifiers and string literals are
//! borrowed slices of the input, keywords are matched case-insensitively,
//! and numbers are parsed on the spot. Invalid input surfaces as a parse
//! error naming the offending character and its byte offset.

use eyre::Result;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Create,
    Table,
    Drop,
    Insert,
    Into,
    Values,
    Select,
    From,
    Where,
    Group,
    By,
    Having,
    Order,
    Asc,
    Desc,
    And,
    Or,
    Not,
    True,
    False,
    Null,
}

fn keyword_of(word: &str) -> Option<Keyword> {
    let upper = word.to_ascii_uppercase();
    let keyword = match upper.as_str() {
        "CREATE" => Keyword::Create,
        "TABLE" => Keyword::Table,
        "DROP" => Keyword::Drop,
        "INSERT" => Keyword::Insert,
        "INTO" => Keyword::Into,
        "VALUES" => Keyword::Values,
        "SELECT" => Keyword::Select,
        "FROM" => Keyword::From,
        "WHERE" => Keyword::Where,
        "GROUP" => Keyword::Group,
        "BY" => Keyword::By,
        "HAVING" => Keyword::Having,
        "ORDER" => Keyword::Order,
        "ASC" => Keyword::Asc,
        "DESC" => Keyword::Desc,
        "AND" => Keyword::And,
        "OR" => Keyword::Or,
        "NOT" => Keyword::Not,
        "TRUE" => Keyword::True,
        "FALSE" => Keyword::False,
        "NULL" => Keyword::Null,
        _ => return None,
    };
    Some(keyword)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Keyword(Keyword),
    Identifier(&'a str),
    Number(i64),
    StringLiteral(&'a str),
    LParen,
    RParen,
    Comma,
    Semicolon,
    Star,
    Plus,
    Minus,
    Slash,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eof,
}

/// Tokenizes the whole input up front; the parser works off the vector.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut position = 0usize;

    while position < bytes.len() {
        let byte = bytes[position];
        match byte {
            b' ' | b'\t' | b'\r' | b'\n' => position += 1,
            b'(' => {
                tokens.push(Token::LParen);
                position += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                position += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                position += 1;
            }
            b';' => {
                tokens.push(Token::Semicolon);
                position += 1;
            }
            b'*' => {
                tokens.push(Token::Star);
                position += 1;
            }
            b'+' => {
                tokens.push(Token::Plus);
                position += 1;
            }
            b'-' => {
                tokens.push(Token::Minus);
                position += 1;
            }
            b'/' => {
                tokens.push(Token::Slash);
                position += 1;
            }
            b'=' => {
                // `=` and `==` both compare
                position += if bytes.get(position + 1) == Some(&b'=') { 2 } else { 1 };
                tokens.push(Token::Eq);
            }
            b'!' => {
                if bytes.get(position + 1) == Some(&b'=') {
                    tokens.push(Token::NotEq);
                    position += 2;
                } else {
                    return Err(Error::parse(format!(
                        "unexpected '!' at byte {position} (did you mean '!=')"
                    )));
                }
            }
            b'<' => match bytes.get(position + 1) {
                Some(&b'=') => {
                    tokens.push(Token::LtEq);
                    position += 2;
                }
                Some(&b'>') => {
                    tokens.push(Token::NotEq);
                    position += 2;
                }
                _ => {
                    tokens.push(Token::Lt);
                    position += 1;
                }
            },
            b'>' => {
                if bytes.get(position + 1) == Some(&b'=') {
                    tokens.push(Token::GtEq);
                    position += 2;
                } else {
                    tokens.push(Token::Gt);
                    position += 1;
                }
            }
            b'\'' | b'"' => {
                let quote = byte;
                let start = position + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end] != quote {
                    end += 1;
                }
                if end >= bytes.len() {
                    return Err(Error::parse(format!(
                        "unterminated string literal starting at byte {position}"
                    )));
                }
                tokens.push(Token::StringLiteral(&input[start..end]));
                position = end + 1;
            }
            b'0'..=b'9' => {
                let start = position;
                while position < bytes.len() && bytes[position].is_ascii_digit() {
                    position += 1;
                }
                let text = &input[start..position];
                let value = text.parse::<i64>().map_err(|_| {
                    Error::parse(format!("number '{text}' does not fit a 64-bit integer"))
                })?;
                tokens.push(Token::Number(value));
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let start = position;
                while position < bytes.len()
                    && (bytes[position].is_ascii_alphanumeric() || bytes[position] == b'_')
                {
                    position += 1;
                }
                let word = &input[start..position];
                match keyword_of(word) {
                    Some(keyword) => tokens.push(Token::Keyword(keyword)),
                    None => tokens.push(Token::Identifier(word)),
                }
            }
            other => {
                return Err(Error::parse(format!(
                    "unexpected character '{}' at byte {position}",
                    other as char
                )))
            }
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}
