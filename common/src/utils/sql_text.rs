//! Passthrough SQL preparation.
//!
//! User SQL for the execute endpoint is only accepted when it returns rows; it
//! is wrapped as a subquery so every row comes back as one JSON object.
//!
//! A `;` inside quoted strings, quoted identifiers, dollar-quoted bodies or
//! comments is not a separator. Backslash escapes in `E'...'` strings and
//! nested block comments are not tracked, so a `;` in those is rejected.

use crate::errors::{AppError, AppResult};

/// Leading keywords of statements that return rows.
const ROW_RETURNING_KEYWORDS: [&str; 4] = ["SELECT", "WITH", "VALUES", "TABLE"];

/// Prepares user SQL for passthrough execution.
pub struct SqlText;

impl SqlText {
    /// Strips whitespace and trailing semicolons.
    pub fn normalize(sql: &str) -> &str {
        sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
    }

    /// Checks if the SQL is a row-returning query.
    pub fn is_row_returning(sql: &str) -> bool {
        let first = Self::normalize(sql)
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_uppercase();
        ROW_RETURNING_KEYWORDS.iter().any(|kw| first.starts_with(kw))
    }

    /// Wraps the query so each result row is returned as a JSON object.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for empty SQL, statements that do not
    /// return rows, or more than one statement.
    pub fn as_json_rows(sql: &str) -> AppResult<String> {
        let sql = Self::normalize(sql);
        if sql.is_empty() {
            return Err(AppError::Validation("SQL statement is required".into()));
        }
        if !Self::is_row_returning(sql) {
            return Err(AppError::Validation(
                "only row-returning queries (SELECT/WITH/VALUES/TABLE) can be executed".into(),
            ));
        }
        if has_separator(sql) {
            return Err(AppError::Validation("multiple statements are not allowed".into()));
        }
        // newline ends a trailing line comment before the closing paren
        Ok(format!("SELECT row_to_json(q) FROM ({}\n) AS q", sql))
    }
}

/// Whether `sql` has a `;` outside quotes and comments.
fn has_separator(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b';' => return true,
            // a doubled quote closes and reopens the span
            quote @ (b'\'' | b'"') => match sql[i + 1..].find(quote as char) {
                Some(end) => i += end + 2,
                None => return false,
            },
            b'-' if bytes.get(i + 1) == Some(&b'-') => match sql[i..].find('\n') {
                Some(end) => i += end + 1,
                None => return false,
            },
            b'/' if bytes.get(i + 1) == Some(&b'*') => match sql[i + 2..].find("*/") {
                Some(end) => i += end + 4,
                None => return false,
            },
            b'$' => match dollar_tag(&sql[i..]) {
                Some(tag) => match sql[i + tag.len()..].find(tag) {
                    Some(end) => i += end + 2 * tag.len(),
                    None => return false,
                },
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    false
}

/// The `$tag$` opener at the start of `s`, if there is one.
fn dollar_tag(s: &str) -> Option<&str> {
    let end = s[1..].find('$')? + 2;
    let tag = &s[1..end - 1];
    let valid = tag
        .chars()
        .enumerate()
        .all(|(n, c)| c == '_' || c.is_ascii_alphabetic() || (n > 0 && c.is_ascii_digit()));
    valid.then(|| &s[..end])
}
