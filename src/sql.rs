//! Parser for the small SQL dialect the services speak.
//!
//! Supported statements:
//!
//! ```text
//! INSERT [OR REPLACE | OR IGNORE] INTO t (c1, c2) VALUES (?, 'x')
//! UPDATE t SET c1 = ?, c2 = ? WHERE id = ?
//! DELETE FROM t [WHERE <condition>]
//! SELECT * | DISTINCT col FROM t [WHERE <condition>] [ORDER BY col [ASC | DESC]]
//! ```
//!
//! `<condition>` is a chain of `col = v`, `col LIKE v`, `col >= v`, `col <= v`
//! joined by AND / OR (AND binds tighter). A `col >= a AND col <= b` pair
//! becomes a range. Placeholders bind positional parameters left to right.

use serde_json::Value;
use thiserror::Error;

use crate::schema::Table;
use crate::statement::{Direction, OnConflict, OrderBy, Predicate, Select, Statement};

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Expected {expected}, found {found}")]
    Expected { expected: String, found: String },
    #[error("Unknown table '{0}'")]
    UnknownTable(String),
    #[error("INSERT names {columns} column(s) but supplies {values} value(s)")]
    ColumnCountMismatch { columns: usize, values: usize },
    #[error("UPDATE must be keyed by 'WHERE id = ?', found column '{0}'")]
    UpdateNotById(String),
    #[error("Range bound on '{0}' must be written as '{0} >= ? AND {0} <= ?'")]
    UnpairedRange(String),
    #[error("Statement has {placeholders} placeholder(s) but {params} parameter(s) were given")]
    ParamCountMismatch { placeholders: usize, params: usize },
    #[error("LIKE pattern must be text, got {0}")]
    NonTextPattern(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(serde_json::Number),
    Placeholder,
    Star,
    Comma,
    LParen,
    RParen,
    Eq,
    Ge,
    Le,
    Semicolon,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{}'", s),
            Token::Str(s) => format!("string '{}'", s),
            Token::Num(n) => format!("number {}", n),
            Token::Placeholder => "'?'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Comma => "','".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Eq => "'='".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Semicolon => "';'".to_string(),
        }
    }
}

fn tokenize(sql: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '?' => {
                tokens.push(Token::Placeholder);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '>' | '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(if c == '>' { Token::Ge } else { Token::Le });
                i += 2;
            }
            '\'' => {
                // '' inside a literal is an escaped quote
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ParseError::UnterminatedString),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            text.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            '"' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|ch| *ch == '"')
                    .map(|p| start + p)
                    .ok_or(ParseError::UnterminatedString)?;
                tokens.push(Token::Ident(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<i64>()
                    .ok()
                    .map(serde_json::Number::from)
                    .or_else(|| text.parse::<f64>().ok().and_then(serde_json::Number::from_f64))
                    .ok_or(ParseError::UnexpectedChar(c, start))?;
                tokens.push(Token::Num(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(ParseError::UnexpectedChar(other, i)),
        }
    }

    Ok(tokens)
}

/// One comparison inside a WHERE clause before range pairs are fused
enum Comparison {
    Eq(String, Value),
    Like(String, Value),
    Ge(String, Value),
    Le(String, Value),
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    params: &'a [Value],
    next_param: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn found(&self) -> String {
        self.peek()
            .map(Token::describe)
            .unwrap_or_else(|| "end of statement".to_string())
    }

    fn expected<T>(&self, expected: &str) -> Result<T, ParseError> {
        Err(ParseError::Expected {
            expected: expected.to_string(),
            found: self.found(),
        })
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            self.expected(keyword)
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        if self.eat(&token) {
            Ok(())
        } else {
            self.expected(&token.describe())
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => self.expected("identifier"),
        }
    }

    fn table(&mut self) -> Result<Table, ParseError> {
        let name = self.ident()?;
        name.parse().map_err(|_| ParseError::UnknownTable(name))
    }

    /// A placeholder (bound to the next parameter) or a literal
    fn value(&mut self) -> Result<Value, ParseError> {
        let value = match self.peek() {
            Some(Token::Placeholder) => {
                let value = self.params.get(self.next_param).cloned().unwrap_or(Value::Null);
                self.next_param += 1;
                value
            }
            Some(Token::Str(s)) => Value::String(s.clone()),
            Some(Token::Num(n)) => Value::Number(n.clone()),
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("null") => Value::Null,
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => return self.expected("'?' or a literal value"),
        };
        self.pos += 1;
        Ok(value)
    }

    fn finish(&mut self) -> Result<(), ParseError> {
        self.eat(&Token::Semicolon);
        if self.peek().is_some() {
            return self.expected("end of statement");
        }
        if self.next_param != self.params.len() {
            return Err(ParseError::ParamCountMismatch {
                placeholders: self.next_param,
                params: self.params.len(),
            });
        }
        Ok(())
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        if self.eat_keyword("insert") {
            self.insert()
        } else if self.eat_keyword("update") {
            self.update()
        } else if self.eat_keyword("delete") {
            self.delete()
        } else if self.eat_keyword("select") {
            self.select().map(Statement::Select)
        } else {
            self.expected("INSERT, UPDATE, DELETE or SELECT")
        }
    }

    fn insert(&mut self) -> Result<Statement, ParseError> {
        let on_conflict = if self.eat_keyword("or") {
            if self.eat_keyword("replace") {
                OnConflict::Replace
            } else if self.eat_keyword("ignore") {
                OnConflict::Ignore
            } else {
                return self.expected("REPLACE or IGNORE");
            }
        } else {
            OnConflict::Append
        };

        self.expect_keyword("into")?;
        let table = self.table()?;

        self.expect(Token::LParen)?;
        let mut columns = vec![self.ident()?];
        while self.eat(&Token::Comma) {
            columns.push(self.ident()?);
        }
        self.expect(Token::RParen)?;

        self.expect_keyword("values")?;
        self.expect(Token::LParen)?;
        let mut values = vec![self.value()?];
        while self.eat(&Token::Comma) {
            values.push(self.value()?);
        }
        self.expect(Token::RParen)?;

        if columns.len() != values.len() {
            return Err(ParseError::ColumnCountMismatch {
                columns: columns.len(),
                values: values.len(),
            });
        }

        Ok(Statement::Insert {
            table,
            columns,
            values,
            on_conflict,
        })
    }

    fn update(&mut self) -> Result<Statement, ParseError> {
        let table = self.table()?;
        self.expect_keyword("set")?;

        let mut assignments = Vec::new();
        loop {
            let column = self.ident()?;
            self.expect(Token::Eq)?;
            assignments.push((column, self.value()?));
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        self.expect_keyword("where")?;
        let column = self.ident()?;
        if column != "id" {
            return Err(ParseError::UpdateNotById(column));
        }
        self.expect(Token::Eq)?;
        let id = self.value()?;

        Ok(Statement::Update {
            table,
            assignments,
            id,
        })
    }

    fn delete(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword("from")?;
        let table = self.table()?;
        let filter = if self.eat_keyword("where") {
            Some(self.condition()?)
        } else {
            None
        };
        Ok(Statement::Delete { table, filter })
    }

    fn select(&mut self) -> Result<Select, ParseError> {
        let distinct = if self.eat_keyword("distinct") {
            let column = self.ident()?;
            self.eat(&Token::Star);
            Some(column)
        } else {
            self.expect(Token::Star)?;
            None
        };

        self.expect_keyword("from")?;
        let mut select = Select::from(self.table()?);
        select.distinct = distinct;

        if self.eat_keyword("where") {
            select.filter = Some(self.condition()?);
        }

        if self.eat_keyword("order") {
            self.expect_keyword("by")?;
            let column = self.ident()?;
            let direction = if self.eat_keyword("desc") {
                Direction::Desc
            } else {
                self.eat_keyword("asc");
                Direction::Asc
            };
            select.order_by = Some(OrderBy { column, direction });
        }

        Ok(select)
    }

    fn comparison(&mut self) -> Result<Comparison, ParseError> {
        let column = self.ident()?;
        if self.eat(&Token::Eq) {
            Ok(Comparison::Eq(column, self.value()?))
        } else if self.eat(&Token::Ge) {
            Ok(Comparison::Ge(column, self.value()?))
        } else if self.eat(&Token::Le) {
            Ok(Comparison::Le(column, self.value()?))
        } else if self.eat_keyword("like") {
            Ok(Comparison::Like(column, self.value()?))
        } else {
            self.expected("'=', '>=', '<=' or LIKE")
        }
    }

    /// OR of AND-groups
    fn condition(&mut self) -> Result<Predicate, ParseError> {
        let mut alternatives = vec![self.conjunction()?];
        while self.eat_keyword("or") {
            alternatives.push(self.conjunction()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Predicate::Or(alternatives)
        })
    }

    fn conjunction(&mut self) -> Result<Predicate, ParseError> {
        let mut comparisons = vec![self.comparison()?];
        while self.eat_keyword("and") {
            comparisons.push(self.comparison()?);
        }

        let mut parts = Vec::new();
        let mut iter = comparisons.into_iter().peekable();
        while let Some(comparison) = iter.next() {
            let predicate = match comparison {
                Comparison::Eq(column, value) => Predicate::Eq { column, value },
                Comparison::Like(column, value) => match value {
                    Value::String(pattern) => Predicate::Like { column, pattern },
                    other => return Err(ParseError::NonTextPattern(other.to_string())),
                },
                Comparison::Ge(column, low) => match iter.peek() {
                    Some(Comparison::Le(upper, _)) if *upper == column => {
                        let Some(Comparison::Le(_, high)) = iter.next() else {
                            unreachable!("peeked an upper bound");
                        };
                        Predicate::Range { column, low, high }
                    }
                    _ => return Err(ParseError::UnpairedRange(column)),
                },
                Comparison::Le(column, _) => return Err(ParseError::UnpairedRange(column)),
            };
            parts.push(predicate);
        }

        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::And(parts)
        })
    }
}

/// Parse `sql`, binding `params` to its `?` placeholders in order
pub fn parse(sql: &str, params: &[Value]) -> Result<Statement, ParseError> {
    let mut parser = Parser {
        tokens: tokenize(sql)?,
        pos: 0,
        params,
        next_param: 0,
    };
    let statement = parser.statement()?;
    parser.finish()?;
    Ok(statement)
}
