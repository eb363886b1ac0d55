use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static LOCAL_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^#/:]+)$").unwrap());

/// A single binding cell. Query collaborators hand back either bare strings
/// or `{ "value": ... }` wrappers; both read the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Wrapped { value: String },
}

impl Cell {
    pub fn as_str(&self) -> &str {
        match self {
            Cell::Text(value) => value,
            Cell::Wrapped { value } => value,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

pub type Row = BTreeMap<String, Cell>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Declared result variables. A result with no rows is only
    /// classifiable through these.
    #[serde(default)]
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            columns: Vec::new(),
            rows,
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// Reads a column as a trimmed, non-empty string.
pub fn cell<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    let value = row.get(column)?.as_str().trim();
    if value.is_empty() { None } else { Some(value) }
}

pub fn row_from_pairs(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), Cell::from(*value)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationRow {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
}

impl RelationRow {
    pub fn new(subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            subject_type: None,
            object_type: None,
        }
    }

    pub fn with_types(mut self, subject_type: Option<&str>, object_type: Option<&str>) -> Self {
        self.subject_type = subject_type.map(str::to_string);
        self.object_type = object_type.map(str::to_string);
        self
    }

    /// Converts an `{s, p, o[, typeS, typeO]}` binding row. Returns `None`
    /// when any of the three required columns is absent or blank.
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            subject: cell(row, "s")?.to_string(),
            predicate: cell(row, "p")?.to_string(),
            object: cell(row, "o")?.to_string(),
            subject_type: cell(row, "typeS").map(str::to_string),
            object_type: cell(row, "typeO").map(str::to_string),
        })
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        !self.subject.trim().is_empty()
            && !self.predicate.trim().is_empty()
            && !self.object.trim().is_empty()
    }
}

pub fn relation_rows(rows: &[Row]) -> Vec<RelationRow> {
    rows.iter().filter_map(RelationRow::from_row).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Goal,
    Strategy,
    Solution,
    Context,
    Assumption,
    Justification,
    Defeater,
}

const ALL_KINDS: [NodeKind; 7] = [
    NodeKind::Goal,
    NodeKind::Strategy,
    NodeKind::Solution,
    NodeKind::Context,
    NodeKind::Assumption,
    NodeKind::Justification,
    NodeKind::Defeater,
];

/// Label prefixes tried in order when no type IRI settles the kind.
/// `SN` must precede `S`.
const LABEL_GUESSES: [(&str, NodeKind); 5] = [
    ("sn", NodeKind::Solution),
    ("s", NodeKind::Strategy),
    ("c", NodeKind::Context),
    ("a", NodeKind::Assumption),
    ("j", NodeKind::Justification),
];

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Goal => "goal",
            NodeKind::Strategy => "strategy",
            NodeKind::Solution => "solution",
            NodeKind::Context => "context",
            NodeKind::Assumption => "assumption",
            NodeKind::Justification => "justification",
            NodeKind::Defeater => "defeater",
        }
    }

    pub fn from_type_iri(iri: &str) -> Option<Self> {
        let name = local_name(iri);
        ALL_KINDS
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let lowered = label.trim().to_ascii_lowercase();
        LABEL_GUESSES
            .iter()
            .find(|(prefix, _)| lowered.starts_with(prefix))
            .map(|(_, kind)| *kind)
    }

    /// Resolves a kind: the type IRI wins, then the label prefix, then
    /// `fallback`.
    pub fn infer(type_iri: Option<&str>, label: &str, fallback: NodeKind) -> Self {
        type_iri
            .and_then(Self::from_type_iri)
            .or_else(|| Self::from_label(label))
            .unwrap_or(fallback)
    }

    /// Corner tag drawn on assumption/justification shapes.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            NodeKind::Assumption => Some("A"),
            NodeKind::Justification => Some("J"),
            _ => None,
        }
    }
}

/// The fragment or last path segment of an IRI; the whole string when it has
/// neither.
pub fn local_name(iri: &str) -> &str {
    let trimmed = iri.trim().trim_start_matches('<').trim_end_matches('>');
    LOCAL_NAME_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed)
}
