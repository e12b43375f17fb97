//! A tiny interpreter for migration scripts.
//!
//! It understands just enough SQL to observe schema changes: table creation
//! and removal, and statements that require a table to exist. Everything
//! else with a known leading keyword is accepted and logged.

use std::collections::BTreeSet;

/// Errors raised by the in-memory database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InMemoryStoreError {
    /// The statement does not start with a recognised keyword.
    #[error("syntax error at or near \"{0}\"")]
    Syntax(String),
    /// `CREATE TABLE` on a table that already exists.
    #[error("relation \"{0}\" already exists")]
    DuplicateTable(String),
    /// A statement referenced a table that does not exist.
    #[error("relation \"{0}\" does not exist")]
    UndefinedTable(String),
    /// Ledger writes were configured to fail.
    #[error("ledger write rejected")]
    LedgerWriteRejected,
}

const ACCEPTED_KEYWORDS: &[&str] = &[
    "SELECT", "DELETE", "COMMENT", "GRANT", "REVOKE", "DO", "SET", "CREATE", "DROP", "ALTER",
    "INSERT", "UPDATE",
];

/// Splits a script into statements, dropping `--` comments.
pub(crate) fn statements(script: &str) -> Vec<String> {
    let without_comments: String = script
        .lines()
        .map(|line| match line.find("--") {
            Some(idx) => &line[..idx],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn table_name(token: Option<&str>) -> String {
    token
        .unwrap_or_default()
        .split('(')
        .next()
        .unwrap_or_default()
        .trim_matches('"')
        .to_lowercase()
}

/// Applies one statement to `tables`.
pub(crate) fn execute(
    tables: &mut BTreeSet<String>,
    statement: &str,
) -> Result<(), InMemoryStoreError> {
    let tokens: Vec<&str> = statement.split_whitespace().collect();
    let upper: Vec<String> = tokens.iter().map(|t| t.to_uppercase()).collect();
    let keyword = upper.first().map(String::as_str).unwrap_or_default();

    if !ACCEPTED_KEYWORDS.contains(&keyword) {
        return Err(InMemoryStoreError::Syntax(
            tokens.first().copied().unwrap_or_default().to_string(),
        ));
    }

    let second = upper.get(1).map(String::as_str);
    match (keyword, second) {
        ("CREATE", Some("TABLE")) => {
            let if_not_exists = has_words(&upper, 2, &["IF", "NOT", "EXISTS"]);
            let name = table_name(tokens.get(if if_not_exists { 5 } else { 2 }).copied());
            if !tables.insert(name.clone()) && !if_not_exists {
                return Err(InMemoryStoreError::DuplicateTable(name));
            }
        }
        ("DROP", Some("TABLE")) => {
            let if_exists = has_words(&upper, 2, &["IF", "EXISTS"]);
            let name = table_name(tokens.get(if if_exists { 4 } else { 2 }).copied());
            if !tables.remove(&name) && !if_exists {
                return Err(InMemoryStoreError::UndefinedTable(name));
            }
        }
        ("INSERT", Some("INTO")) | ("ALTER", Some("TABLE")) => {
            require(tables, table_name(tokens.get(2).copied()))?;
        }
        ("UPDATE", _) => {
            require(tables, table_name(tokens.get(1).copied()))?;
        }
        _ => {}
    }
    Ok(())
}

fn has_words(upper: &[String], at: usize, words: &[&str]) -> bool {
    upper
        .get(at..at + words.len())
        .is_some_and(|found| found.iter().zip(words).all(|(a, b)| a.as_str() == *b))
}

fn require(tables: &BTreeSet<String>, name: String) -> Result<(), InMemoryStoreError> {
    if tables.contains(&name) {
        Ok(())
    } else {
        Err(InMemoryStoreError::UndefinedTable(name))
    }
}
