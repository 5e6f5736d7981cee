//! Identifier validation and quoting for generated DDL.
//!
//! All dialects emit bracket-quoted identifiers (`[Name]`). Identifiers
//! cannot be passed as parameters in prepared statements, so dynamic DDL
//! must validate and escape them here instead.

use crate::error::{Result, SchemaError};

/// Maximum identifier length (conservative limit across databases).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier before it is embedded in SQL text.
///
/// Rejects empty identifiers, identifiers containing NUL bytes, and
/// identifiers exceeding the maximum length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SchemaError::Validation(
            "Identifier cannot be empty".to_string(),
        ));
    }
    if name.contains('\0') {
        return Err(SchemaError::Validation(format!(
            "Identifier contains a NUL byte: {:?}",
            name
        )));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SchemaError::Validation(format!(
            "Identifier exceeds the maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }
    Ok(())
}

/// Quote an identifier with bracket syntax.
///
/// Escapes `\` to `\\` and `]` to `\]` and wraps the result in brackets.
///
/// # Examples
///
/// ```
/// use tablemorph::core::identifier::quote;
/// assert_eq!(quote("Users").unwrap(), "[Users]");
/// assert_eq!(quote("a]b").unwrap(), r"[a\]b]");
/// ```
pub fn quote(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!(
        "[{}]",
        name.replace('\\', r"\\").replace(']', r"\]")
    ))
}

/// Quote a list of identifiers and join them with `", "`.
pub fn quote_list<I, S>(names: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let quoted: Vec<String> = names
        .into_iter()
        .map(|n| quote(n.as_ref()))
        .collect::<Result<_>>()?;
    Ok(quoted.join(", "))
}

/// Render a string as a SQL string literal, doubling embedded quotes.
pub fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Unescape the inner text of a bracket-quoted identifier.
///
/// Inverse of [`quote`]: `\]` becomes `]` and `\\` becomes `\`.
pub fn unescape_bracketed(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
