use crate::ir::{Cell, QueryResult, Row};
use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<[^>]*>|"[^"]*"|\S+"#).unwrap());

/// Accepted JSON layouts for a rows document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RowsDocument {
    List(Vec<Row>),
    Wrapped {
        #[serde(default)]
        columns: Vec<String>,
        rows: Vec<Row>,
    },
    Bindings {
        #[serde(default)]
        head: Head,
        results: Bindings,
    },
}

#[derive(Debug, Default, Deserialize)]
struct Head {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Bindings {
    bindings: Vec<Row>,
}

impl RowsDocument {
    fn into_result(self) -> QueryResult {
        match self {
            RowsDocument::List(rows) => QueryResult::new(rows),
            RowsDocument::Wrapped { columns, rows } => QueryResult::new(rows).with_columns(columns),
            RowsDocument::Bindings { head, results } => QueryResult::new(results.bindings).with_columns(head.vars),
        }
    }
}

/// Parses a rows document. JSON input may be a bare array of rows,
/// `{ "rows": [...] }`, or a SPARQL JSON results document; anything that
/// does not start like JSON is read as line-based triples.
pub fn parse_rows(input: &str) -> Result<Vec<Row>> {
    parse_result(input).map(|result| result.rows)
}

/// Like [`parse_rows`], keeping declared columns: SPARQL `head.vars`, the
/// `columns` of a wrapped document, or `s p o` for triples.
pub fn parse_result(input: &str) -> Result<QueryResult> {
    let trimmed = input.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Ok(QueryResult::default());
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return parse_json_result(trimmed);
    }
    Ok(QueryResult::new(parse_triples(trimmed)).with_columns(["s", "p", "o"]))
}

fn parse_json_result(input: &str) -> Result<QueryResult> {
    if let Ok(doc) = serde_json::from_str::<RowsDocument>(input) {
        return Ok(doc.into_result());
    }
    json5::from_str::<RowsDocument>(input)
        .map(RowsDocument::into_result)
        .map_err(|err| anyhow!("unrecognized rows document: {err}"))
}

/// Reads `subject predicate object` lines. A trailing ` .` is optional,
/// `#` starts a comment outside of `<...>` terms, and lines that do not
/// hold exactly three terms are skipped.
pub fn parse_triples(input: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let mut terms: Vec<&str> = Vec::new();
        for token in TOKEN_RE.find_iter(line).map(|m| m.as_str()) {
            if token.starts_with('#') {
                break;
            }
            terms.push(token);
        }
        if terms.last() == Some(&".") {
            terms.pop();
        } else if let Some(last) = terms.last_mut() {
            let term: &str = last;
            if !term.starts_with('<') && !term.starts_with('"') {
                *last = term.strip_suffix('.').unwrap_or(term);
            }
        }
        match terms.as_slice() {
            [] => {}
            [s, p, o] => {
                let mut row = Row::new();
                row.insert("s".to_string(), Cell::from(unquote(s)));
                row.insert("p".to_string(), Cell::from(unquote(p)));
                row.insert("o".to_string(), Cell::from(unquote(o)));
                rows.push(row);
            }
            _ => {
                tracing::warn!(line = idx + 1, terms = terms.len(), "skipping malformed triple line");
            }
        }
    }
    rows
}

fn unquote(term: &str) -> &str {
    term.strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .or_else(|| term.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
        .unwrap_or(term)
}
