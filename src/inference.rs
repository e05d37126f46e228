//! Pure-Rust TF-IDF + multi-head logistic inference.
//!
//! Loads weights exported from a scikit-learn style pipeline (TfidfVectorizer
//! over word n-grams, optional char_wb n-grams, one logistic head per moral
//! foundation). Each head is squashed through its own sigmoid, so the five
//! outputs are independent likelihoods rather than a distribution.

use crate::morality::{Foundation, MoralScores};
use crate::tokenize::word_tokens;
use crate::MoralignError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Exported TF-IDF vectorizer for one feature set (word or char).
#[derive(Deserialize)]
pub(crate) struct VectorizerWeights {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    pub ngram_range: [usize; 2],
    #[serde(default)]
    pub binary: bool,
    #[serde(default = "default_true")]
    pub sublinear_tf: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct ExportedHead {
    word_weights: Vec<f64>,
    #[serde(default)]
    char_weights: Vec<f64>,
    bias: f64,
}

#[derive(Deserialize)]
struct ExportedModel {
    word: VectorizerWeights,
    #[serde(default)]
    char: Option<VectorizerWeights>,
    heads: HashMap<String, ExportedHead>,
}

struct Head {
    word_weights: Vec<f64>,
    char_weights: Vec<f64>,
    bias: f64,
}

/// Loaded model ready for inference.
pub struct LinearModel {
    word: VectorizerWeights,
    char: Option<VectorizerWeights>,
    /// One head per foundation, in `Foundation::ALL` order.
    heads: Vec<Head>,
    pub hash: String,
}

/// 64-bit FNV-1a fingerprint of the raw model bytes as 16 hex chars. Fixed
/// constants, so the value is stable across toolchains and platforms.
pub(crate) fn fingerprint_hex(data: &[u8]) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let hash = data
        .iter()
        .fold(OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(PRIME));
    format!("{hash:016x}")
}

fn check_vectorizer(name: &str, vw: &VectorizerWeights) -> Result<(), String> {
    let dim = vw.idf.len();
    if let Some((gram, idx)) = vw.vocabulary.iter().find(|(_, idx)| **idx >= dim) {
        return Err(format!("{name} vocabulary entry {gram:?} -> {idx} exceeds idf length {dim}"));
    }
    let [lo, hi] = vw.ngram_range;
    if lo == 0 || lo > hi {
        return Err(format!("{name} ngram_range [{lo}, {hi}] is invalid"));
    }
    Ok(())
}

impl LinearModel {
    pub fn load(path: &Path) -> Result<Self, MoralignError> {
        let raw = std::fs::read(path).map_err(|e| {
            MoralignError::Classifier(format!("{}: {e}", path.display()))
        })?;
        let model = Self::parse(&raw)
            .map_err(|e| MoralignError::Classifier(format!("{}: {e}", path.display())))?;
        log::info!(
            "loaded moral foundation model from {} ({} word + {} char features, hash {})",
            path.display(),
            model.word.vocabulary.len(),
            model.char.as_ref().map_or(0, |c| c.vocabulary.len()),
            model.hash
        );
        Ok(model)
    }

    pub fn parse(raw: &[u8]) -> Result<Self, String> {
        let hash = fingerprint_hex(raw);
        let mut exported: ExportedModel = serde_json::from_slice(raw).map_err(|e| e.to_string())?;

        check_vectorizer("word", &exported.word)?;
        if let Some(char) = &exported.char {
            check_vectorizer("char", char)?;
        }

        let word_dim = exported.word.idf.len();
        let char_dim = exported.char.as_ref().map_or(0, |c| c.idf.len());

        let mut heads = Vec::with_capacity(Foundation::ALL.len());
        for foundation in Foundation::ALL {
            let head = exported
                .heads
                .remove(foundation.name())
                .ok_or_else(|| format!("missing head for {}", foundation.name()))?;
            if head.word_weights.len() != word_dim {
                return Err(format!(
                    "{} head has {} word weights, expected {word_dim}",
                    foundation.name(),
                    head.word_weights.len()
                ));
            }
            if head.char_weights.len() != char_dim {
                return Err(format!(
                    "{} head has {} char weights, expected {char_dim}",
                    foundation.name(),
                    head.char_weights.len()
                ));
            }
            heads.push(Head {
                word_weights: head.word_weights,
                char_weights: head.char_weights,
                bias: head.bias,
            });
        }
        if let Some(extra) = exported.heads.keys().next() {
            return Err(format!("unknown head {extra:?}"));
        }

        Ok(Self {
            word: exported.word,
            char: exported.char,
            heads,
            hash,
        })
    }

    /// Score text on every foundation.
    pub fn predict(&self, text: &str) -> MoralScores {
        let tokens = word_tokens(text);
        let word_ng = word_ngrams(&tokens, self.word.ngram_range[0], self.word.ngram_range[1]);
        let word_features = tfidf_features(&word_ng, &self.word);

        let char_features = self
            .char
            .as_ref()
            .map(|vw| tfidf_features(&char_wb_ngrams(text, vw.ngram_range[0], vw.ngram_range[1]), vw))
            .unwrap_or_default();

        let mut values = [0.0; 5];
        for (slot, head) in values.iter_mut().zip(&self.heads) {
            let raw = dot(&word_features, &head.word_weights)
                + dot(&char_features, &head.char_weights)
                + head.bias;
            *slot = sigmoid(raw);
        }
        MoralScores::new(values)
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn dot(features: &[(usize, f64)], weights: &[f64]) -> f64 {
    features.iter().map(|(idx, v)| v * weights[*idx]).sum()
}

/// Generate word n-grams and count occurrences.
pub(crate) fn word_ngrams(tokens: &[String], lo: usize, hi: usize) -> HashMap<String, u32> {
    let mut ngrams = HashMap::new();

    for n in lo..=hi {
        if n > tokens.len() {
            continue;
        }
        for window in tokens.windows(n) {
            let gram = window.join(" ");
            *ngrams.entry(gram).or_insert(0) += 1;
        }
    }

    ngrams
}

/// Generate char_wb n-grams (whitespace-bounded character n-grams).
pub(crate) fn char_wb_ngrams(text: &str, lo: usize, hi: usize) -> HashMap<String, u32> {
    let mut ngrams = HashMap::new();
    let lower = text.to_lowercase();

    for word in lower.split_whitespace() {
        let padded = format!(" {word} ");
        let chars: Vec<char> = padded.chars().collect();

        for n in lo..=hi {
            if n > chars.len() {
                continue;
            }
            for window in chars.windows(n) {
                let gram: String = window.iter().collect();
                *ngrams.entry(gram).or_insert(0) += 1;
            }
        }
    }

    ngrams
}

/// L2-normalized TF-IDF values for the n-grams present in the vocabulary.
pub(crate) fn tfidf_features(
    ngrams: &HashMap<String, u32>,
    vw: &VectorizerWeights,
) -> Vec<(usize, f64)> {
    let mut pairs: Vec<(usize, f64)> = Vec::new();

    for (gram, &count) in ngrams {
        if let Some(&idx) = vw.vocabulary.get(gram) {
            let tf = if vw.binary {
                1.0
            } else if vw.sublinear_tf {
                (count as f64).ln() + 1.0
            } else {
                count as f64
            };
            pairs.push((idx, tf * vw.idf[idx]));
        }
    }

    let norm_sq: f64 = pairs.iter().map(|(_, v)| v * v).sum();
    if norm_sq == 0.0 {
        return Vec::new();
    }
    let norm = norm_sq.sqrt();
    for (_, v) in &mut pairs {
        *v /= norm;
    }
    pairs
}
