//! Corpus-level reporting over the final record set.
//!
//! Read-only with respect to its input: prints a summary, writes a markdown
//! report, and writes a sentiment-annotated copy of the records to a separate
//! file.

use crate::config::ReportConfig;
use crate::morality::Foundation;
use crate::record::{self, SENTIMENT, TurnRecord};
use crate::sentiment::{self, SentimentScorer, VaderScorer};
use crate::stats::{self, TestResult};
use crate::tokenize::count_tokens;
use crate::MoralignError;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write;
use std::path::Path;

const BAR_WIDTH: usize = 40;

const STOPWORDS: &[&str] = &[
    "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been", "but",
    "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "he", "her",
    "here", "him", "his", "how", "if", "in", "into", "is", "it", "its", "just", "me", "more",
    "my", "no", "not", "of", "on", "one", "or", "other", "our", "out", "she", "should", "so",
    "some", "such", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "those", "to", "too", "up", "us", "very", "was", "we", "were", "what", "when",
    "where", "which", "who", "why", "will", "with", "would", "you", "your",
];

#[derive(Debug, Clone, PartialEq)]
pub struct CorpusSummary {
    pub total_rows: usize,
    pub conversations: usize,
    /// Turns per speaker role, most frequent first.
    pub role_counts: Vec<(String, usize)>,
    pub columns: Vec<String>,
    pub messages_mean: Option<f64>,
    pub messages_std: Option<f64>,
    pub messages_quartiles: [Option<f64>; 3],
}

pub fn summarize(records: &[TurnRecord]) -> CorpusSummary {
    let groups = record::group_by_conversation(records);
    let sizes: Vec<f64> = groups.iter().map(|(_, rows)| rows.len() as f64).collect();

    let mut roles: HashMap<&str, usize> = HashMap::new();
    for r in records {
        *roles.entry(r.from.as_deref().unwrap_or("(none)")).or_insert(0) += 1;
    }
    let mut role_counts: Vec<(String, usize)> =
        roles.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    role_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut columns: Vec<String> = Vec::new();
    let mut seen = BTreeSet::new();
    for name in records.iter().flat_map(|r| r.field_names()) {
        if seen.insert(name.clone()) {
            columns.push(name);
        }
    }

    CorpusSummary {
        total_rows: records.len(),
        conversations: groups.len(),
        role_counts,
        columns,
        messages_mean: stats::mean(&sizes),
        messages_std: stats::sample_std(&sizes),
        messages_quartiles: [
            stats::quantile(&sizes, 0.25),
            stats::quantile(&sizes, 0.5),
            stats::quantile(&sizes, 0.75),
        ],
    }
}

/// Non-null numeric values of one column.
pub fn column_values(records: &[TurnRecord], name: &str) -> Vec<f64> {
    records.iter().filter_map(|r| r.number(name)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoundationTests {
    pub foundation: Foundation,
    pub n: usize,
    pub shapiro: Option<TestResult>,
    pub ttest: Option<TestResult>,
    pub wilcoxon: Option<TestResult>,
    pub mann_whitney: Option<TestResult>,
}

/// Normality and location tests of one foundation against `reference`.
pub fn test_foundation(records: &[TurnRecord], foundation: Foundation, reference: f64) -> FoundationTests {
    let values = column_values(records, foundation.name());
    let constant = vec![reference; values.len()];
    FoundationTests {
        foundation,
        n: values.len(),
        shapiro: stats::shapiro_wilk(&values),
        ttest: stats::ttest_1samp(&values, reference),
        wilcoxon: stats::wilcoxon_signed_rank(&values, reference),
        mann_whitney: stats::mann_whitney_u(&values, &constant),
    }
}

/// Columns entering the correlation matrix.
fn correlation_features() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = Foundation::ALL.iter().map(|f| f.name()).collect();
    names.push(SENTIMENT);
    names
}

/// Pairwise-complete Pearson correlations, row-major over `features`.
pub fn correlation_matrix(records: &[TurnRecord], features: &[&str]) -> Vec<Vec<Option<f64>>> {
    features
        .iter()
        .map(|a| {
            features
                .iter()
                .map(|b| {
                    let pairs: Vec<(f64, f64)> = records
                        .iter()
                        .filter_map(|r| Some((r.number(a)?, r.number(b)?)))
                        .collect();
                    stats::pearson(&pairs)
                })
                .collect()
        })
        .collect()
}

/// Most frequent content words across all turns.
pub fn top_words(records: &[TurnRecord], k: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for r in records {
        for token in count_tokens(&r.value) {
            if STOPWORDS.contains(&token.as_str()) || token.chars().all(|c| c.is_numeric()) {
                continue;
            }
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    let mut words: Vec<(String, usize)> = counts.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(k);
    words
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".into(), |v| format!("{v:.4}"))
}

fn fmt_p(r: &Option<TestResult>) -> String {
    r.as_ref().map_or_else(|| "n/a".into(), |t| format!("{:.4}", t.p_value))
}

fn write_histogram(md: &mut String, title: &str, values: &[f64], bins: usize) {
    writeln!(md, "### Distribution of {title} (n = {})", values.len()).unwrap();
    writeln!(md).unwrap();
    if values.is_empty() {
        writeln!(md, "No values.").unwrap();
        writeln!(md).unwrap();
        return;
    }
    let hist = stats::histogram(values, bins);
    let peak = hist.iter().map(|h| h.2).max().unwrap_or(1).max(1);
    writeln!(md, "```").unwrap();
    for (lo, hi, count) in hist {
        let bar = "#".repeat(count * BAR_WIDTH / peak);
        writeln!(md, "[{lo:>8.4}, {hi:>8.4}) {count:>6} {bar}").unwrap();
    }
    writeln!(md, "```").unwrap();
    writeln!(md).unwrap();
}

pub fn render_markdown(
    summary: &CorpusSummary,
    tests: &[FoundationTests],
    records: &[TurnRecord],
    config: &ReportConfig,
) -> String {
    let mut md = String::new();
    writeln!(md, "# moralign report").unwrap();
    writeln!(md).unwrap();

    writeln!(md, "## Corpus").unwrap();
    writeln!(md).unwrap();
    writeln!(md, "- Total rows: {}", summary.total_rows).unwrap();
    writeln!(md, "- Unique conversations: {}", summary.conversations).unwrap();
    let roles: Vec<String> = summary
        .role_counts
        .iter()
        .map(|(role, n)| format!("{role}: {n}"))
        .collect();
    writeln!(md, "- Turns per role: {}", roles.join(", ")).unwrap();
    writeln!(md, "- Columns: {}", summary.columns.join(", ")).unwrap();
    let [q25, q50, q75] = summary.messages_quartiles;
    writeln!(
        md,
        "- Messages per conversation: mean {}, std {}, 25% {}, 50% {}, 75% {}",
        fmt_opt(summary.messages_mean),
        fmt_opt(summary.messages_std),
        fmt_opt(q25),
        fmt_opt(q50),
        fmt_opt(q75)
    )
    .unwrap();
    writeln!(md).unwrap();

    writeln!(md, "## Moral foundations vs {}", config.reference).unwrap();
    writeln!(md).unwrap();
    writeln!(md, "| foundation | n | Shapiro-Wilk p | t-test p | Wilcoxon p | Mann-Whitney p |").unwrap();
    writeln!(md, "|---|---|---|---|---|---|").unwrap();
    for t in tests {
        writeln!(
            md,
            "| {} | {} | {} | {} | {} | {} |",
            t.foundation.name(),
            t.n,
            fmt_p(&t.shapiro),
            fmt_p(&t.ttest),
            fmt_p(&t.wilcoxon),
            fmt_p(&t.mann_whitney)
        )
        .unwrap();
    }
    writeln!(md).unwrap();

    writeln!(md, "## Distributions").unwrap();
    writeln!(md).unwrap();
    for name in correlation_features() {
        write_histogram(&mut md, name, &column_values(records, name), config.histogram_bins);
    }

    let features = correlation_features();
    let matrix = correlation_matrix(records, &features);
    writeln!(md, "## Correlation matrix").unwrap();
    writeln!(md).unwrap();
    writeln!(md, "| | {} |", features.join(" | ")).unwrap();
    writeln!(md, "|---|{}", "---|".repeat(features.len())).unwrap();
    for (name, row) in features.iter().zip(&matrix) {
        let cells: Vec<String> = row
            .iter()
            .map(|c| c.map_or_else(|| "n/a".into(), |v| format!("{v:.2}")))
            .collect();
        writeln!(md, "| {name} | {} |", cells.join(" | ")).unwrap();
    }
    writeln!(md).unwrap();

    writeln!(md, "## Top words").unwrap();
    writeln!(md).unwrap();
    for (word, count) in top_words(records, config.top_words) {
        writeln!(md, "- {word}: {count}").unwrap();
    }

    md
}

fn print_summary(summary: &CorpusSummary, tests: &[FoundationTests]) {
    println!("Total rows: {}", summary.total_rows);
    println!("Unique conversations: {}", summary.conversations);
    println!("From counts:");
    for (role, n) in &summary.role_counts {
        println!("  {role}: {n}");
    }
    println!("Column names: {}", summary.columns.join(", "));
    println!(
        "Messages per chat: mean {}, std {}",
        fmt_opt(summary.messages_mean),
        fmt_opt(summary.messages_std)
    );

    for t in tests {
        println!();
        println!("Running tests for {} (n = {}):", t.foundation.name(), t.n);
        println!("  Shapiro-Wilk p-value: {}", fmt_p(&t.shapiro));
        println!("  One-sample t-test p-value: {}", fmt_p(&t.ttest));
        println!("  Wilcoxon signed-rank p-value: {}", fmt_p(&t.wilcoxon));
        println!("  Mann-Whitney U p-value: {}", fmt_p(&t.mann_whitney));
    }
}

/// Build the full report from records, scoring sentiment on a copy.
pub fn build_report(
    records: &[TurnRecord],
    scorer: &dyn SentimentScorer,
    config: &ReportConfig,
) -> (String, Vec<TurnRecord>, CorpusSummary, Vec<FoundationTests>) {
    let summary = summarize(records);
    let tests: Vec<FoundationTests> = Foundation::ALL
        .iter()
        .map(|f| test_foundation(records, *f, config.reference))
        .collect();

    let mut annotated = records.to_vec();
    sentiment::annotate_sentiment(&mut annotated, scorer);

    let md = render_markdown(&summary, &tests, &annotated, config);
    (md, annotated, summary, tests)
}

/// Stage 5: statistics, report, and the sentiment-annotated copy.
pub fn handle_report(
    config: &ReportConfig,
    input: &Path,
    output: &Path,
    sentiment_output: &Path,
) -> Result<(), MoralignError> {
    let records = record::read_records(input)?;
    log::info!("reporting on {} rows from {}", records.len(), input.display());

    let scorer = VaderScorer::new();
    let (md, annotated, summary, tests) = build_report(&records, &scorer, config);
    print_summary(&summary, &tests);

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, md)?;
    record::write_records(sentiment_output, &annotated)?;

    log::info!(
        "report written to {}, sentiment scores to {}",
        output.display(),
        sentiment_output.display()
    );
    Ok(())
}
