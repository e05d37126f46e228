//! Moral foundation scoring.
//!
//! A `ScoringContext` is built once per run from config and owns the loaded
//! classifier. Turns are scored in parallel; each outcome is keyed by row
//! index and joined back by key, and the five foundation columns are written
//! all together: either five numbers or five nulls.

use crate::config::{MoralityConfig, ScorerBackend};
use crate::inference::LinearModel;
use crate::record::{self, TurnRecord};
use crate::MoralignError;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Foundation {
    Care = 0,
    Fairness = 1,
    Loyalty = 2,
    Authority = 3,
    Sanctity = 4,
}

impl Foundation {
    pub const ALL: [Foundation; 5] = [
        Foundation::Care,
        Foundation::Fairness,
        Foundation::Loyalty,
        Foundation::Authority,
        Foundation::Sanctity,
    ];

    /// Column name in record files.
    pub fn name(self) -> &'static str {
        match self {
            Foundation::Care => "care",
            Foundation::Fairness => "fairness",
            Foundation::Loyalty => "loyalty",
            Foundation::Authority => "authority",
            Foundation::Sanctity => "sanctity",
        }
    }
}

/// Five per-foundation likelihoods in `Foundation::ALL` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoralScores([f64; 5]);

impl MoralScores {
    pub fn new(values: [f64; 5]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> [f64; 5] {
        self.0
    }

    pub fn get(&self, foundation: Foundation) -> f64 {
        self.0[foundation as usize]
    }

    fn check_range(&self) -> Result<(), String> {
        for f in Foundation::ALL {
            let v = self.get(f);
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(format!("{} score {v} outside [0, 1]", f.name()));
            }
        }
        Ok(())
    }
}

/// Result of scoring one text. `Failed` keeps the reason so that a genuine
/// near-zero score is never confused with an error.
#[derive(Debug, Clone, PartialEq)]
pub enum MoralOutcome {
    Scored(MoralScores),
    Failed(String),
}

/// Text to five foundation scores. Implementations may fail per text.
pub trait MoralScorer: Sync {
    fn score(&self, text: &str) -> Result<MoralScores, String>;
}

impl MoralScorer for LinearModel {
    fn score(&self, text: &str) -> Result<MoralScores, String> {
        Ok(self.predict(text))
    }
}

/// Remote classifier: `POST {"text": ...}` answered with the five named scores.
pub struct HttpScorer {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpScorer {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::config::Config::builder()
                .timeout_global(Some(Duration::from_secs(timeout_secs)))
                .build(),
        );
        Self {
            agent,
            endpoint: endpoint.to_string(),
        }
    }
}

/// Pull the five named scores out of a classifier response object.
fn scores_from_json(resp: &serde_json::Value) -> Result<MoralScores, String> {
    let mut values = [0.0; 5];
    for f in Foundation::ALL {
        values[f as usize] = resp
            .get(f.name())
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| format!("response has no numeric {}", f.name()))?;
    }
    Ok(MoralScores::new(values))
}

impl MoralScorer for HttpScorer {
    fn score(&self, text: &str) -> Result<MoralScores, String> {
        let body = serde_json::json!({ "text": text });
        let resp: serde_json::Value = self
            .agent
            .post(&self.endpoint)
            .send_json(&body)
            .map_err(|e| format!("morality request: {e}"))?
            .body_mut()
            .read_json()
            .map_err(|e| format!("morality response: {e}"))?;
        scores_from_json(&resp)
    }
}

/// Loaded classifier plus the per-text invocation budget.
pub struct ScoringContext {
    scorer: Box<dyn MoralScorer>,
    max_input_chars: usize,
    threads: usize,
}

impl ScoringContext {
    pub fn new(scorer: Box<dyn MoralScorer>, max_input_chars: usize) -> Self {
        Self {
            scorer,
            max_input_chars,
            threads: 0,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn from_config(config: &MoralityConfig) -> Result<Self, MoralignError> {
        let scorer: Box<dyn MoralScorer> = match config.backend {
            ScorerBackend::Linear => Box::new(LinearModel::load(&config.model_path)?),
            ScorerBackend::Http => {
                let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                    MoralignError::Config("morality.endpoint is required for the http backend".into())
                })?;
                log::info!("scoring through {endpoint}");
                Box::new(HttpScorer::new(endpoint, config.timeout_secs))
            }
        };
        Ok(Self::new(scorer, config.max_input_chars).with_threads(config.threads))
    }

    /// Score one text. Never fails: errors become `MoralOutcome::Failed`.
    pub fn score_text(&self, text: &str) -> MoralOutcome {
        let len = text.chars().count();
        if len > self.max_input_chars {
            return MoralOutcome::Failed(format!(
                "input of {len} chars exceeds limit of {}",
                self.max_input_chars
            ));
        }
        match self.scorer.score(text).and_then(|s| s.check_range().map(|()| s)) {
            Ok(scores) => MoralOutcome::Scored(scores),
            Err(reason) => MoralOutcome::Failed(reason),
        }
    }
}

/// Write the five foundation columns for one outcome.
pub fn write_outcome(record: &mut TurnRecord, outcome: &MoralOutcome) {
    for f in Foundation::ALL {
        let value = match outcome {
            MoralOutcome::Scored(scores) => serde_json::Value::from(scores.get(f)),
            MoralOutcome::Failed(_) => serde_json::Value::Null,
        };
        record.set_column(f.name(), value);
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScoringSummary {
    pub scored: usize,
    pub failed: usize,
}

fn score_all(ctx: &ScoringContext, records: &[TurnRecord]) -> HashMap<usize, MoralOutcome> {
    records
        .par_iter()
        .enumerate()
        .map(|(row, record)| (row, ctx.score_text(&record.value)))
        .collect()
}

/// Score every record and merge the outcomes back by row key.
pub fn score_records(
    ctx: &ScoringContext,
    records: &mut [TurnRecord],
) -> Result<ScoringSummary, MoralignError> {
    let mut outcomes = if ctx.threads > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(ctx.threads)
            .build()
            .map_err(|e| MoralignError::Config(format!("scoring thread pool: {e}")))?;
        pool.install(|| score_all(ctx, records))
    } else {
        score_all(ctx, records)
    };

    merge_outcomes(records, &mut outcomes)
}

/// Join keyed outcomes onto records. Every row needs exactly one outcome.
pub fn merge_outcomes(
    records: &mut [TurnRecord],
    outcomes: &mut HashMap<usize, MoralOutcome>,
) -> Result<ScoringSummary, MoralignError> {
    if outcomes.len() != records.len() {
        return Err(MoralignError::Integrity(format!(
            "{} morality outcomes for {} rows",
            outcomes.len(),
            records.len()
        )));
    }

    let mut summary = ScoringSummary::default();
    for (row, record) in records.iter_mut().enumerate() {
        let outcome = outcomes.remove(&row).ok_or_else(|| {
            MoralignError::Integrity(format!("no morality outcome for row {row}"))
        })?;
        match &outcome {
            MoralOutcome::Scored(_) => summary.scored += 1,
            MoralOutcome::Failed(reason) => {
                log::debug!("row {row} (conversation {}): scoring failed: {reason}", record.id);
                summary.failed += 1;
            }
        }
        write_outcome(record, &outcome);
    }
    Ok(summary)
}

/// Stage 3: moral foundation scores for every turn.
pub fn handle_morality(
    config: &MoralityConfig,
    input: &Path,
    output: &Path,
) -> Result<(), MoralignError> {
    let mut records = record::read_records(input)?;
    let ctx = ScoringContext::from_config(config)?;

    log::info!("scoring {} turns", records.len());
    let summary = score_records(&ctx, &mut records)?;

    record::write_records(output, &records)?;
    log::info!(
        "saved moral scores for {} entries ({} failed) to {}",
        records.len(),
        summary.failed,
        output.display()
    );
    Ok(())
}
