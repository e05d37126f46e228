//! Corpus loading: raw conversation files to flat turn records.
//!
//! Each `*.json` file in the raw directory holds either one conversation
//! object or an array of them, shaped `{id, conversations: [{from, value}]}`.

use crate::config::MoralignConfig;
use crate::language::{self, LinguaIdentifier};
use crate::record::{self, ConversationId, TurnRecord};
use crate::MoralignError;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// List `*.json` files directly inside `dir`, sorted by file name so that
/// encounter order is stable across runs and platforms.
pub fn list_corpus_files(dir: &Path) -> Result<Vec<PathBuf>, MoralignError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| MoralignError::Ingest {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Decode file bytes honoring a UTF-8 or UTF-16 byte-order mark.
/// Malformed byte sequences are an error, never replacement characters.
fn decode_text(raw: &[u8]) -> Result<String, String> {
    let (text, encoding, had_errors) = encoding_rs::UTF_8.decode(raw);
    if had_errors {
        return Err(format!("invalid {} byte sequence", encoding.name()));
    }
    Ok(text.into_owned())
}

/// Parse one corpus file into its conversation objects.
fn parse_corpus_file(path: &Path) -> Result<Vec<Value>, MoralignError> {
    let raw = std::fs::read(path).map_err(|e| MoralignError::Ingest {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let text = decode_text(&raw).map_err(|reason| MoralignError::Ingest {
        path: path.to_path_buf(),
        reason,
    })?;
    let data: Value = serde_json::from_str(&text).map_err(|e| MoralignError::Ingest {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    match data {
        Value::Array(items) => Ok(items),
        obj @ Value::Object(_) => Ok(vec![obj]),
        other => Err(MoralignError::Ingest {
            path: path.to_path_buf(),
            reason: format!("expected a conversation object or array, found {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Trimmed text of a turn, or `None` when missing, non-string, or blank.
fn turn_text(turn: &Value) -> Option<String> {
    let text = turn.get("value").and_then(Value::as_str)?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Flatten conversation objects into turn records, dropping empty turns.
fn flatten_conversations(
    path: &Path,
    conversations: &[Value],
    out: &mut Vec<TurnRecord>,
) -> Result<(), MoralignError> {
    for (i, item) in conversations.iter().enumerate() {
        let id = item
            .get("id")
            .and_then(ConversationId::from_json)
            .ok_or_else(|| MoralignError::Ingest {
                path: path.to_path_buf(),
                reason: format!("conversation {i} has no string or integer id"),
            })?;

        let turns = item
            .get("conversations")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for turn in turns {
            let Some(text) = turn_text(turn) else {
                continue;
            };
            let from = turn.get("from").and_then(Value::as_str).map(str::to_string);
            out.push(TurnRecord::new(id.clone(), from, text));
        }
    }
    Ok(())
}

/// Load and flatten every conversation file under `dir`.
pub fn load_and_flatten(dir: &Path) -> Result<Vec<TurnRecord>, MoralignError> {
    let files = list_corpus_files(dir)?;
    let mut records = Vec::new();

    for path in &files {
        let conversations = parse_corpus_file(path)?;
        let before = records.len();
        flatten_conversations(path, &conversations, &mut records)?;
        log::debug!(
            "{}: {} conversations, {} turns kept",
            path.display(),
            conversations.len(),
            records.len() - before
        );
    }

    log::info!("loaded {} turns from {} files", records.len(), files.len());
    Ok(records)
}

/// Stage 1 + 2: flatten the raw corpus and stamp the language flag.
pub fn handle_clean(
    config: &MoralignConfig,
    input: &Path,
    output: &Path,
) -> Result<(), MoralignError> {
    log::info!("loading and flattening {}", input.display());
    let mut records = load_and_flatten(input)?;

    log::info!("detecting languages and assigning flags");
    let identifier = LinguaIdentifier::new(&config.language)?;
    language::flag_records(&mut records, &identifier)?;

    record::write_records(output, &records)?;
    log::info!("saved {} rows to {}", records.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn single_object_and_array_files() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"{"id": "c1", "conversations": [{"from": "human", "value": "hi"}, {"from": "gpt", "value": "hello"}]}"#,
        );
        write(
            dir.path(),
            "b.json",
            r#"[{"id": "c2", "conversations": [{"from": "human", "value": "one"}]},
                {"id": 3, "conversations": [{"from": "gpt", "value": "two"}]}]"#,
        );

        let records = load_and_flatten(dir.path()).unwrap();
        let ids: Vec<String> = records.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["c1", "c1", "c2", "3"]);
        assert_eq!(records[1].from.as_deref(), Some("gpt"));
        assert_eq!(records[3].id, ConversationId::Number(3));
    }

    #[test]
    fn empty_and_missing_text_dropped() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"{"id": "c1", "conversations": [
                {"from": "human", "value": "   "},
                {"from": "gpt"},
                {"from": "human", "value": null},
                {"value": "  kept  "},
                {"from": "gpt", "value": ""}
            ]}"#,
        );

        let records = load_and_flatten(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "kept");
        assert_eq!(records[0].from, None);
    }

    #[test]
    fn conversation_without_turns_never_appears() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.json", r#"[{"id": "empty"}, {"id": "blank", "conversations": []}]"#);
        assert!(load_and_flatten(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn malformed_file_fails_with_name() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "good.json", r#"{"id": "c1", "conversations": []}"#);
        write(dir.path(), "bad.json", r#"{"id": "c2", "conversations": ["#);

        let err = load_and_flatten(dir.path()).unwrap_err();
        assert!(matches!(err, MoralignError::Ingest { .. }));
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn scalar_top_level_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.json", "42");
        assert!(load_and_flatten(dir.path()).is_err());
    }

    #[test]
    fn missing_id_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.json", r#"{"conversations": [{"from": "human", "value": "hi"}]}"#);
        let err = load_and_flatten(dir.path()).unwrap_err();
        assert!(err.to_string().contains("no string or integer id"));
    }

    #[test]
    fn non_json_files_ignored_and_order_sorted() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "notes.txt", "not a corpus file");
        write(dir.path(), "z.json", r#"{"id": "z", "conversations": [{"from": "a", "value": "last"}]}"#);
        write(dir.path(), "a.json", r#"{"id": "a", "conversations": [{"from": "a", "value": "first"}]}"#);

        let records = load_and_flatten(dir.path()).unwrap();
        let values: Vec<&str> = records.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["first", "last"]);
    }

    #[test]
    fn utf8_bom_accepted() {
        let dir = TempDir::new().unwrap();
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(r#"{"id": "c1", "conversations": [{"from": "h", "value": "héllo"}]}"#.as_bytes());
        std::fs::write(dir.path().join("bom.json"), bytes).unwrap();

        let records = load_and_flatten(dir.path()).unwrap();
        assert_eq!(records[0].value, "héllo");
    }

    #[test]
    fn invalid_utf8_fails_with_name() {
        let dir = TempDir::new().unwrap();
        let mut bytes = br#"{"id": "c1", "conversations": [{"from": "h", "value": "bad "#.to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE, 0x80]);
        bytes.extend_from_slice(br#" text"}]}"#);
        std::fs::write(dir.path().join("latin.json"), bytes).unwrap();

        let err = load_and_flatten(dir.path()).unwrap_err();
        assert!(matches!(err, MoralignError::Ingest { .. }));
        let msg = err.to_string();
        assert!(msg.contains("latin.json"), "{msg}");
        assert!(msg.contains("invalid"), "{msg}");
    }

    #[test]
    fn missing_directory_is_ingest_error() {
        let dir = TempDir::new().unwrap();
        let err = load_and_flatten(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, MoralignError::Ingest { .. }));
    }
}
