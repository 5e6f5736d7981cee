//! Parser for stored `CREATE TABLE` definitions.
//!
//! SQLite's pragmas report columns, index column lists and foreign-key
//! column pairs, but not declared constraint names, not foreign-key names,
//! and not whether an INTEGER primary key carries `AUTOINCREMENT`. All of
//! those survive only in the verbatim `CREATE TABLE` text kept in
//! `sqlite_master`, so the reader recovers them by parsing that text.
//!
//! The parser handles bracket-quoted identifiers (with `\]`/`\\` escapes),
//! double-quoted and backtick-quoted identifiers, and named or unnamed
//! table/column constraints. Unnamed constraints get derived names
//! (`pk_<table>`, `uq_<table>_<n>`, `fk_<table>_<n>`) since there is
//! nothing better to report.

use crate::core::identifier::unescape_bracketed;
use crate::error::{Result, SchemaError};

/// A primary-key or unique constraint recovered from the table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

/// A foreign-key constraint recovered from the table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

/// Everything the pragmas cannot tell us about a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTableDdl {
    pub primary_key: Option<ParsedConstraint>,
    pub unique_constraints: Vec<ParsedConstraint>,
    pub foreign_keys: Vec<ParsedForeignKey>,
    pub autoincrement_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// A quoted identifier, unescaped.
    Ident(String),
    /// A bare word (identifier, keyword or number).
    Word(String),
    /// A string literal, kept only so it cannot be mistaken for a name.
    Literal(String),
    Punct(char),
}

fn parse_error(table_name: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::NotSupported(format!(
        "Cannot parse the stored definition of table [{}]: {}",
        table_name,
        message.into()
    ))
}

fn tokenize(table_name: &str, sql: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '[' {
            chars.next();
            let mut raw = String::new();
            loop {
                match chars.next() {
                    None => return Err(parse_error(table_name, "unterminated [ identifier")),
                    Some('\\') => {
                        raw.push('\\');
                        if let Some(next) = chars.next() {
                            raw.push(next);
                        }
                    }
                    Some(']') => break,
                    Some(other) => raw.push(other),
                }
            }
            tokens.push(Token::Ident(unescape_bracketed(&raw)));
        } else if c == '"' || c == '`' {
            let delim = c;
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    None => return Err(parse_error(table_name, "unterminated quoted identifier")),
                    Some(d) if d == delim => {
                        // Doubled delimiter is an escape.
                        if chars.peek() == Some(&delim) {
                            chars.next();
                            text.push(delim);
                        } else {
                            break;
                        }
                    }
                    Some(other) => text.push(other),
                }
            }
            tokens.push(Token::Ident(text));
        } else if c == '\'' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    None => return Err(parse_error(table_name, "unterminated string literal")),
                    Some('\'') => {
                        if chars.peek() == Some(&'\'') {
                            chars.next();
                            text.push('\'');
                        } else {
                            break;
                        }
                    }
                    Some(other) => text.push(other),
                }
            }
            tokens.push(Token::Literal(text));
        } else if c == '-' {
            chars.next();
            if chars.peek() == Some(&'-') {
                for d in chars.by_ref() {
                    if d == '\n' {
                        break;
                    }
                }
            } else {
                tokens.push(Token::Punct('-'));
            }
        } else if c.is_alphanumeric() || c == '_' {
            let mut word = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' || d == '$' {
                    word.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Word(word));
        } else {
            chars.next();
            tokens.push(Token::Punct(c));
        }
    }
    Ok(tokens)
}

fn is_kw(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
}

fn name_of(token: &Token) -> Option<String> {
    match token {
        Token::Ident(s) | Token::Word(s) => Some(s.clone()),
        _ => None,
    }
}

/// Read a parenthesized name list starting at `item[start]` (which must be
/// `(`). Decorations after a name (COLLATE, ASC, DESC) are skipped. Returns
/// the names and the index just past the closing `)`.
fn parse_paren_names(
    table_name: &str,
    item: &[Token],
    start: usize,
) -> Result<(Vec<String>, usize)> {
    if item.get(start) != Some(&Token::Punct('(')) {
        return Err(parse_error(table_name, "expected a parenthesized column list"));
    }
    let mut names = Vec::new();
    let mut expect_name = true;
    let mut depth = 1usize;
    let mut i = start + 1;
    while i < item.len() {
        match &item[i] {
            Token::Punct('(') => depth += 1,
            Token::Punct(')') => {
                depth -= 1;
                if depth == 0 {
                    return Ok((names, i + 1));
                }
            }
            Token::Punct(',') if depth == 1 => expect_name = true,
            token => {
                if expect_name && depth == 1 {
                    if let Some(name) = name_of(token) {
                        names.push(name);
                        expect_name = false;
                    }
                }
            }
        }
        i += 1;
    }
    Err(parse_error(table_name, "unterminated column list"))
}

/// Split the definition body (tokens after the opening paren) into
/// top-level comma-separated items.
fn split_items(table_name: &str, tokens: &[Token]) -> Result<Vec<Vec<Token>>> {
    let mut items = Vec::new();
    let mut current = Vec::new();
    let mut depth = 1usize;
    for token in tokens {
        match token {
            Token::Punct('(') => {
                depth += 1;
                current.push(token.clone());
            }
            Token::Punct(')') => {
                depth -= 1;
                if depth == 0 {
                    if !current.is_empty() {
                        items.push(current);
                    }
                    return Ok(items);
                }
                current.push(token.clone());
            }
            Token::Punct(',') if depth == 1 => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(token.clone()),
        }
    }
    Err(parse_error(table_name, "unterminated table definition"))
}

/// Parse a stored `CREATE TABLE` definition.
pub fn parse_create_table(table_name: &str, sql: &str) -> Result<ParsedTableDdl> {
    let tokens = tokenize(table_name, sql)?;
    if tokens.len() < 3 || !is_kw(&tokens[0], "CREATE") {
        return Err(parse_error(table_name, "not a CREATE TABLE statement"));
    }
    let body_start = tokens
        .iter()
        .position(|t| *t == Token::Punct('('))
        .ok_or_else(|| parse_error(table_name, "no column list found"))?;
    if !tokens[..body_start].iter().any(|t| is_kw(t, "TABLE")) {
        return Err(parse_error(table_name, "not a CREATE TABLE statement"));
    }

    let items = split_items(table_name, &tokens[body_start + 1..])?;
    let mut parsed = ParsedTableDdl::default();

    for item in &items {
        if item.is_empty() {
            return Err(parse_error(table_name, "empty table definition entry"));
        }
        let (name, rest) = if is_kw(&item[0], "CONSTRAINT") {
            let name = item
                .get(1)
                .and_then(name_of)
                .ok_or_else(|| parse_error(table_name, "CONSTRAINT without a name"))?;
            (Some(name), &item[2..])
        } else {
            (None, &item[..])
        };
        if rest.is_empty() {
            return Err(parse_error(table_name, "empty table definition entry"));
        }

        if is_kw(&rest[0], "PRIMARY") {
            let (columns, _) = parse_paren_names(table_name, rest, 2)?;
            parsed.primary_key = Some(ParsedConstraint {
                name: name.unwrap_or_else(|| format!("pk_{}", table_name)),
                columns,
            });
        } else if is_kw(&rest[0], "UNIQUE") {
            let (columns, _) = parse_paren_names(table_name, rest, 1)?;
            let derived = format!("uq_{}_{}", table_name, parsed.unique_constraints.len() + 1);
            parsed.unique_constraints.push(ParsedConstraint {
                name: name.unwrap_or(derived),
                columns,
            });
        } else if is_kw(&rest[0], "FOREIGN") {
            let (columns, after_cols) = parse_paren_names(table_name, rest, 2)?;
            if !rest.get(after_cols).map(|t| is_kw(t, "REFERENCES")).unwrap_or(false) {
                return Err(parse_error(table_name, "FOREIGN KEY without REFERENCES"));
            }
            let referenced_table = rest
                .get(after_cols + 1)
                .and_then(name_of)
                .ok_or_else(|| parse_error(table_name, "REFERENCES without a table name"))?;
            let (referenced_columns, _) = parse_paren_names(table_name, rest, after_cols + 2)?;
            let derived = format!("fk_{}_{}", table_name, parsed.foreign_keys.len() + 1);
            parsed.foreign_keys.push(ParsedForeignKey {
                name: name.unwrap_or(derived),
                columns,
                referenced_table,
                referenced_columns,
            });
        } else {
            parse_column_item(table_name, item, &mut parsed)?;
        }
    }
    Ok(parsed)
}

/// Scan a column definition item for inline constraints.
fn parse_column_item(
    table_name: &str,
    item: &[Token],
    parsed: &mut ParsedTableDdl,
) -> Result<()> {
    let column = name_of(&item[0])
        .ok_or_else(|| parse_error(table_name, "column entry does not start with a name"))?;
    let mut pending_name: Option<String> = None;
    let mut i = 1;
    while i < item.len() {
        if is_kw(&item[i], "CONSTRAINT") {
            pending_name = item.get(i + 1).and_then(name_of);
            i += 2;
        } else if is_kw(&item[i], "PRIMARY") {
            parsed.primary_key = Some(ParsedConstraint {
                name: pending_name
                    .take()
                    .unwrap_or_else(|| format!("pk_{}", table_name)),
                columns: vec![column.clone()],
            });
            i += 1;
        } else if is_kw(&item[i], "UNIQUE") {
            let derived = format!("uq_{}_{}", table_name, parsed.unique_constraints.len() + 1);
            parsed.unique_constraints.push(ParsedConstraint {
                name: pending_name.take().unwrap_or(derived),
                columns: vec![column.clone()],
            });
            i += 1;
        } else if is_kw(&item[i], "AUTOINCREMENT") {
            parsed.autoincrement_column = Some(column.clone());
            i += 1;
        } else if is_kw(&item[i], "REFERENCES") {
            let referenced_table = item
                .get(i + 1)
                .and_then(name_of)
                .ok_or_else(|| parse_error(table_name, "REFERENCES without a table name"))?;
            let (referenced_columns, after) = parse_paren_names(table_name, item, i + 2)?;
            let derived = format!("fk_{}_{}", table_name, parsed.foreign_keys.len() + 1);
            parsed.foreign_keys.push(ParsedForeignKey {
                name: pending_name.take().unwrap_or(derived),
                columns: vec![column.clone()],
                referenced_table,
                referenced_columns,
            });
            i = after;
        } else {
            i += 1;
        }
    }
    Ok(())
}
