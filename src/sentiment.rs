use crate::record::{SENTIMENT, TurnRecord};
use serde_json::Value;

/// Text to a compound polarity score in [-1, 1].
pub trait SentimentScorer {
    fn compound(&self, text: &str) -> Option<f64>;
}

/// VADER lexicon and rule based scorer.
pub struct VaderScorer {
    analyzer: vader_sentiment::SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: vader_sentiment::SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer for VaderScorer {
    fn compound(&self, text: &str) -> Option<f64> {
        let scores = self.analyzer.polarity_scores(text);
        scores.get("compound").copied().filter(|v| v.is_finite())
    }
}

/// Set the `sentiment` column on every record; null when the scorer gives nothing.
pub fn annotate_sentiment(records: &mut [TurnRecord], scorer: &dyn SentimentScorer) {
    for record in records.iter_mut() {
        let value = scorer
            .compound(&record.value)
            .map(Value::from)
            .unwrap_or(Value::Null);
        record.set_column(SENTIMENT, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed;

    impl SentimentScorer for Fixed {
        fn compound(&self, text: &str) -> Option<f64> {
            if text.is_empty() { None } else { Some(0.25) }
        }
    }

    #[test]
    fn annotate_sets_column_on_every_row() {
        let mut records = vec![
            TurnRecord::new("a".into(), None, "fine"),
            TurnRecord::new("a".into(), None, "also fine"),
        ];
        annotate_sentiment(&mut records, &Fixed);
        for r in &records {
            assert_eq!(r.column(SENTIMENT), Some(&json!(0.25)));
        }
    }

    #[test]
    fn vader_polarity_direction() {
        let scorer = VaderScorer::new();
        let pos = scorer.compound("I love this, it is wonderful and great!").unwrap();
        let neg = scorer.compound("I hate this, it is terrible and awful.").unwrap();
        assert!(pos > 0.5, "positive compound {pos}");
        assert!(neg < -0.5, "negative compound {neg}");
        assert!((-1.0..=1.0).contains(&pos) && (-1.0..=1.0).contains(&neg));
    }
}
