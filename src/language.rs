//! Conversation-level language mixture flag.
//!
//! Every turn of a conversation is run through a language identifier; the
//! set of identified languages decides one flag for the whole conversation,
//! which is then joined back onto each of its rows by conversation id.

use crate::config::LanguageConfig;
use crate::record::{self, ConversationId, LANGUAGE_FLAG, TurnRecord};
use crate::MoralignError;
use lingua::{IsoCode639_3, LanguageDetector, LanguageDetectorBuilder};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

/// ISO 639-3 code the identifier reports for English.
pub const ENGLISH: &str = "eng";

/// Text to language code. `None` means detection failed for this text.
pub trait LanguageIdentifier: Sync {
    fn identify(&self, text: &str) -> Option<String>;
}

/// lingua-backed identifier over a fixed language set. A detection closer
/// than `min_relative_distance` to the runner-up language counts as failed.
pub struct LinguaIdentifier {
    detector: LanguageDetector,
}

impl LinguaIdentifier {
    pub fn new(config: &LanguageConfig) -> Result<Self, MoralignError> {
        let codes = config
            .languages
            .iter()
            .map(|code| {
                IsoCode639_3::from_str(code).map_err(|_| {
                    MoralignError::Config(format!("unknown language code {code:?}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if codes.len() < 2 {
            return Err(MoralignError::Config(
                "language detection needs at least two languages".into(),
            ));
        }
        let detector = LanguageDetectorBuilder::from_iso_codes_639_3(&codes)
            .with_minimum_relative_distance(config.min_relative_distance)
            .build();
        Ok(Self { detector })
    }
}

impl LanguageIdentifier for LinguaIdentifier {
    fn identify(&self, text: &str) -> Option<String> {
        self.detector
            .detect_language_of(text)
            .map(|lang| lang.iso_code_639_3().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LanguageFlag {
    /// Every detected turn is English.
    English = 0,
    /// Some language other than English was detected, alone or mixed.
    Mixed = 1,
    /// No turn yielded a detectable language.
    Undetected = 2,
}

impl From<LanguageFlag> for u8 {
    fn from(flag: LanguageFlag) -> u8 {
        flag as u8
    }
}

impl TryFrom<u8> for LanguageFlag {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(LanguageFlag::English),
            1 => Ok(LanguageFlag::Mixed),
            2 => Ok(LanguageFlag::Undetected),
            other => Err(format!("invalid language flag {other}")),
        }
    }
}

/// Decide the flag from the set of identified languages.
pub fn decide_flag(languages: &BTreeSet<String>) -> LanguageFlag {
    if languages.is_empty() {
        LanguageFlag::Undetected
    } else if languages.len() == 1 && languages.contains(ENGLISH) {
        LanguageFlag::English
    } else {
        LanguageFlag::Mixed
    }
}

/// Flag one conversation from its turn texts. Failed detections are skipped.
pub fn classify_conversation<'a, I>(texts: I, identifier: &dyn LanguageIdentifier) -> LanguageFlag
where
    I: IntoIterator<Item = &'a str>,
{
    let languages: BTreeSet<String> = texts
        .into_iter()
        .filter_map(|text| identifier.identify(text))
        .collect();
    decide_flag(&languages)
}

/// Compute the flag for every conversation, keyed by conversation id.
pub fn conversation_flags(
    records: &[TurnRecord],
    identifier: &dyn LanguageIdentifier,
) -> HashMap<ConversationId, LanguageFlag> {
    record::group_by_conversation(records)
        .into_par_iter()
        .map(|(id, rows)| {
            let flag =
                classify_conversation(rows.iter().map(|&i| records[i].value.as_str()), identifier);
            (id, flag)
        })
        .collect()
}

/// Stamp `mixed_language_flag` onto every record by conversation-id join.
pub fn flag_records(
    records: &mut [TurnRecord],
    identifier: &dyn LanguageIdentifier,
) -> Result<(), MoralignError> {
    let flags = conversation_flags(records, identifier);

    let mut counts: HashMap<LanguageFlag, usize> = HashMap::new();
    for flag in flags.values() {
        *counts.entry(*flag).or_insert(0) += 1;
    }
    log::info!(
        "language flags over {} conversations: {} english, {} mixed, {} undetected",
        flags.len(),
        counts.get(&LanguageFlag::English).unwrap_or(&0),
        counts.get(&LanguageFlag::Mixed).unwrap_or(&0),
        counts.get(&LanguageFlag::Undetected).unwrap_or(&0),
    );

    for record in records.iter_mut() {
        let flag = flags.get(&record.id).ok_or_else(|| {
            MoralignError::Integrity(format!("no language flag for conversation {}", record.id))
        })?;
        record.set_column(LANGUAGE_FLAG, serde_json::to_value(flag)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Identifies by a "lang:" prefix; anything else fails detection.
    struct PrefixIdentifier;

    impl LanguageIdentifier for PrefixIdentifier {
        fn identify(&self, text: &str) -> Option<String> {
            text.split_once(':').map(|(code, _)| code.to_string())
        }
    }

    fn turn(id: &str, value: &str) -> TurnRecord {
        TurnRecord::new(id.into(), Some("human".into()), value)
    }

    fn set(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn decision_rule() {
        assert_eq!(decide_flag(&set(&[])), LanguageFlag::Undetected);
        assert_eq!(decide_flag(&set(&["eng"])), LanguageFlag::English);
        assert_eq!(decide_flag(&set(&["eng", "spa"])), LanguageFlag::Mixed);
        assert_eq!(decide_flag(&set(&["deu"])), LanguageFlag::Mixed);
    }

    #[test]
    fn failed_detections_are_skipped_not_counted() {
        let flag = classify_conversation(["eng:hello", "???", "eng:bye"], &PrefixIdentifier);
        assert_eq!(flag, LanguageFlag::English);
    }

    #[test]
    fn all_failures_is_undetected() {
        let flag = classify_conversation(["@@@", "###", "$$$"], &PrefixIdentifier);
        assert_eq!(flag, LanguageFlag::Undetected);
    }

    #[test]
    fn one_foreign_turn_flips_to_mixed() {
        let english = ["eng:a", "eng:b", "eng:c"];
        assert_eq!(classify_conversation(english, &PrefixIdentifier), LanguageFlag::English);
        let mixed = ["eng:a", "fra:b", "eng:c"];
        assert_eq!(classify_conversation(mixed, &PrefixIdentifier), LanguageFlag::Mixed);
    }

    #[test]
    fn flag_broadcast_to_every_turn_of_a_conversation() {
        let mut records = vec![
            turn("c1", "eng:hi"),
            turn("c2", "!!!"),
            turn("c1", "spa:hola"),
            turn("c3", "eng:only english"),
            turn("c1", "###"),
        ];
        flag_records(&mut records, &PrefixIdentifier).unwrap();

        let flag_of = |r: &TurnRecord| r.column(LANGUAGE_FLAG).cloned();
        assert_eq!(flag_of(&records[0]), Some(json!(1)));
        assert_eq!(flag_of(&records[2]), Some(json!(1)));
        assert_eq!(flag_of(&records[4]), Some(json!(1)));
        assert_eq!(flag_of(&records[1]), Some(json!(2)));
        assert_eq!(flag_of(&records[3]), Some(json!(0)));
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn flag_serializes_as_integer() {
        assert_eq!(serde_json::to_value(LanguageFlag::Undetected).unwrap(), json!(2));
        let parsed: LanguageFlag = serde_json::from_value(json!(1)).unwrap();
        assert_eq!(parsed, LanguageFlag::Mixed);
        assert!(serde_json::from_value::<LanguageFlag>(json!(7)).is_err());
    }

    fn lingua() -> LinguaIdentifier {
        LinguaIdentifier::new(&LanguageConfig::default()).unwrap()
    }

    #[test]
    fn lingua_detects_english_and_spanish() {
        let identifier = lingua();
        let en = identifier.identify(
            "I would like to know more about the history of the Roman empire and how it shaped modern law.",
        );
        assert_eq!(en.as_deref(), Some(ENGLISH));
        let es = identifier.identify(
            "Me gustaría saber más sobre la historia del imperio romano y cómo influyó en el derecho moderno.",
        );
        assert_eq!(es.as_deref(), Some("spa"));
    }

    #[test]
    fn short_english_turns_stay_english() {
        let identifier = lingua();
        let turns = [
            "Hello, how are you?",
            "I am doing well, thank you for asking. How can I help you today?",
            "Thanks!",
        ];
        assert_eq!(classify_conversation(turns, &identifier), LanguageFlag::English);
        assert_eq!(identifier.identify("Hello, how are you?").as_deref(), Some(ENGLISH));
    }

    #[test]
    fn lingua_fails_on_symbols() {
        assert_eq!(lingua().identify("!!! ??? ### 12345 ..."), None);
    }

    #[test]
    fn unknown_language_code_rejected() {
        let config = LanguageConfig {
            languages: vec!["eng".into(), "xx1".into()],
            ..LanguageConfig::default()
        };
        assert!(matches!(
            LinguaIdentifier::new(&config),
            Err(MoralignError::Config(_))
        ));
    }
}
