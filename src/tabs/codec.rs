//! Comma-joined list encoding used at the option-store boundary.
//!
//! Stored values are decoded leniently: spaces are ignored and tokens that do not parse come
//! back as `None`, keeping positions aligned. Request input is decoded strictly and rejected
//! as a whole on the first bad token.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};

pub fn join_list<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub fn parse_stored_list<T: FromStr>(raw: &str) -> Vec<Option<T>> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Vec::new();
    }
    compact.split(',').map(|tok| tok.parse::<T>().ok()).collect()
}

/// Normalized form of a stored list, used to compare against freshly encoded values.
pub fn compact_stored(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn parse_strict_list<T: FromStr>(raw: &str, what: &str) -> EngineResult<Vec<T>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .enumerate()
        .map(|(pos, tok)| {
            let tok = tok.trim();
            if tok.is_empty() || !tok.bytes().all(|b| b.is_ascii_digit()) {
                return Err(EngineError::malformed(format!(
                    "{what}: token {pos} ({tok:?}) is not a non-negative integer"
                )));
            }
            tok.parse::<T>().map_err(|_| {
                EngineError::malformed(format!("{what}: token {pos} ({tok:?}) is out of range"))
            })
        })
        .collect()
}

/// Parses a tab token: `tab3` or bare `3`.
pub fn parse_tab_token(tok: &str) -> Option<usize> {
    let tok = tok.trim();
    let digits = tok.strip_prefix("tab").unwrap_or(tok);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn parse_sequence_lenient(raw: &str) -> Vec<usize> {
    raw.split(',').filter_map(parse_tab_token).collect()
}

pub fn parse_sequence_strict(raw: &str, max_tabs: usize) -> EngineResult<Vec<usize>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let mut out: Vec<usize> = Vec::new();
    for tok in trimmed.split(',') {
        let index = parse_tab_token(tok)
            .ok_or_else(|| EngineError::malformed(format!("invalid tab token {:?}", tok.trim())))?;
        if index > max_tabs {
            return Err(EngineError::malformed(format!(
                "tab index {index} exceeds maximum {max_tabs}"
            )));
        }
        if out.contains(&index) {
            return Err(EngineError::malformed(format!("tab index {index} listed twice")));
        }
        out.push(index);
    }
    Ok(out)
}

pub fn join_sequence(seq: &[usize]) -> String {
    seq.iter()
        .map(|i| format!("tab{i}"))
        .collect::<Vec<_>>()
        .join(",")
}
