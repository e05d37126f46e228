//! Flat per-turn records shared by every stage.
//!
//! A stage reads the previous stage's record file, adds its own columns and
//! writes a new file. Columns a stage does not own are carried through
//! verbatim, including ones this crate never heard of.

use crate::MoralignError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const LANGUAGE_FLAG: &str = "mixed_language_flag";
pub const LEXICAL_OVERLAP: &str = "lexical_overlap";
pub const SYNTACTIC_SIMILARITY: &str = "syntactic_similarity";
pub const SENTIMENT: &str = "sentiment";

/// Conversation identifier. Keeps the JSON type it arrived with so that
/// numeric ids are written back as numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConversationId {
    Number(i64),
    Text(String),
}

impl ConversationId {
    /// Accept a JSON string or integer; anything else is not an id.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(ConversationId::Text(s.clone())),
            Value::Number(n) => n.as_i64().map(ConversationId::Number),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationId::Number(n) => write!(f, "{n}"),
            ConversationId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        ConversationId::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub id: ConversationId,
    pub from: Option<String>,
    pub value: String,
    #[serde(flatten)]
    pub columns: Map<String, Value>,
}

impl TurnRecord {
    pub fn new(id: ConversationId, from: Option<String>, value: impl Into<String>) -> Self {
        Self {
            id,
            from,
            value: value.into(),
            columns: Map::new(),
        }
    }

    /// Insert or overwrite a derived column. Existing columns keep their position.
    pub fn set_column(&mut self, name: &str, value: Value) {
        self.columns.insert(name.to_string(), value);
    }

    pub fn column(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }

    /// Numeric column value; `None` for absent, null, or non-numeric columns.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.columns.get(name).and_then(Value::as_f64)
    }

    /// Every column name in output order.
    pub fn field_names(&self) -> Vec<String> {
        let mut names = vec!["id".to_string(), "from".to_string(), "value".to_string()];
        names.extend(self.columns.keys().cloned());
        names
    }
}

/// Group row indices by conversation id, in first-encounter order.
/// Within a group, indices keep ingestion order.
pub fn group_by_conversation(records: &[TurnRecord]) -> Vec<(ConversationId, Vec<usize>)> {
    let mut position: HashMap<&ConversationId, usize> = HashMap::new();
    let mut groups: Vec<(ConversationId, Vec<usize>)> = Vec::new();

    for (i, record) in records.iter().enumerate() {
        match position.get(&record.id) {
            Some(&g) => groups[g].1.push(i),
            None => {
                position.insert(&record.id, groups.len());
                groups.push((record.id.clone(), vec![i]));
            }
        }
    }

    groups
}

/// Read a stage record file.
pub fn read_records(path: &Path) -> Result<Vec<TurnRecord>, MoralignError> {
    let raw = std::fs::read(path).map_err(|e| MoralignError::Ingest {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let records: Vec<TurnRecord> =
        serde_json::from_slice(&raw).map_err(|e| MoralignError::Ingest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if let Some(i) = records.iter().position(|r| r.value.trim().is_empty()) {
        return Err(MoralignError::Ingest {
            path: path.to_path_buf(),
            reason: format!("record {i} has empty text"),
        });
    }

    Ok(records)
}

/// Write records as a pretty-printed JSON array, creating parent directories.
pub fn write_records(path: &Path, records: &[TurnRecord]) -> Result<(), MoralignError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
