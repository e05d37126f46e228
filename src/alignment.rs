//! Linguistic alignment between the opening pair of turns.
//!
//! Only the first two turns of a conversation, ordered by speaker role, are
//! compared. The resulting pair is attached to every row of the conversation;
//! conversations with a single turn get nulls.

use crate::record::{self, ConversationId, LEXICAL_OVERLAP, SYNTACTIC_SIMILARITY, TurnRecord};
use crate::tokenize::{count_tokens, treebank_tokens};
use crate::MoralignError;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentPair {
    pub lexical_overlap: f64,
    pub syntactic_similarity: f64,
}

/// Jaccard similarity of the two texts' lowercase Treebank token sets,
/// punctuation included. 0.0 when either side has no tokens.
pub fn lexical_overlap(a: &str, b: &str) -> f64 {
    let ta: HashSet<String> = treebank_tokens(a).into_iter().collect();
    let tb: HashSet<String> = treebank_tokens(b).into_iter().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    inter as f64 / union as f64
}

/// Cosine similarity of bag-of-words count vectors over a vocabulary fit on
/// exactly these two texts. 0.0 when either vector is all zeros.
pub fn syntactic_similarity(a: &str, b: &str) -> f64 {
    let mut counts: BTreeMap<String, [u32; 2]> = BTreeMap::new();
    for (side, text) in [a, b].into_iter().enumerate() {
        for token in count_tokens(text) {
            counts.entry(token).or_insert([0, 0])[side] += 1;
        }
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);
    for [ca, cb] in counts.values() {
        let (ca, cb) = (*ca as f64, *cb as f64);
        dot += ca * cb;
        norm_a += ca * ca;
        norm_b += cb * cb;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Compare the opening pair of a conversation's turns.
pub fn align_pair(first: &str, second: &str) -> AlignmentPair {
    AlignmentPair {
        lexical_overlap: lexical_overlap(first, second),
        syntactic_similarity: syntactic_similarity(first, second),
    }
}

/// Row indices of a conversation ordered by speaker role ascending.
/// Stable, so equal roles keep ingestion order; a missing role sorts last.
fn order_by_role(records: &[TurnRecord], rows: &[usize]) -> Vec<usize> {
    let mut ordered = rows.to_vec();
    ordered.sort_by(|&x, &y| match (&records[x].from, &records[y].from) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    ordered
}

/// Alignment per conversation; `None` for conversations with fewer than two turns.
pub fn conversation_alignment(
    records: &[TurnRecord],
) -> HashMap<ConversationId, Option<AlignmentPair>> {
    record::group_by_conversation(records)
        .into_iter()
        .map(|(id, rows)| {
            let ordered = order_by_role(records, &rows);
            let pair = match ordered.as_slice() {
                [first, second, ..] => {
                    Some(align_pair(&records[*first].value, &records[*second].value))
                }
                _ => None,
            };
            (id, pair)
        })
        .collect()
}

/// Attach `lexical_overlap` and `syntactic_similarity` by conversation-id join.
/// Returns how many conversations had a comparable pair.
pub fn attach_alignment(records: &mut [TurnRecord]) -> Result<usize, MoralignError> {
    let features = conversation_alignment(records);
    let paired = features.values().filter(|p| p.is_some()).count();

    for record in records.iter_mut() {
        let pair = features.get(&record.id).ok_or_else(|| {
            MoralignError::Integrity(format!("no alignment entry for conversation {}", record.id))
        })?;
        let (lexical, syntactic) = match pair {
            Some(p) => (Value::from(p.lexical_overlap), Value::from(p.syntactic_similarity)),
            None => (Value::Null, Value::Null),
        };
        record.set_column(LEXICAL_OVERLAP, lexical);
        record.set_column(SYNTACTIC_SIMILARITY, syntactic);
    }

    log::info!(
        "alignment computed for {paired} of {} conversations",
        features.len()
    );
    Ok(paired)
}

/// Stage 4: alignment features for every conversation.
pub fn handle_align(input: &Path, output: &Path) -> Result<(), MoralignError> {
    let mut records = record::read_records(input)?;
    attach_alignment(&mut records)?;
    record::write_records(output, &records)?;
    log::info!("saved alignment features to {}", output.display());
    Ok(())
}
