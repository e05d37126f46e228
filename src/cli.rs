use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "moralign",
    version,
    about = "Moral-foundation and alignment features for conversation transcripts"
)]
pub struct Cli {
    /// Config file path (default: ./moralign.toml when present)
    #[arg(long, env = "MORALIGN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load and flatten raw conversations, then flag mixed-language conversations
    Clean(CleanArgs),
    /// Score every turn on the five moral foundations
    Morality(StageArgs),
    /// Compute lexical and syntactic alignment between the first two turns
    Align(StageArgs),
    /// Print corpus statistics and write the markdown report
    Report(ReportArgs),
    /// Run every stage in order with the configured paths
    Run,
}

#[derive(Parser)]
pub struct CleanArgs {
    /// Directory of raw conversation JSON files
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output file for flattened, language-flagged turns
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
pub struct StageArgs {
    /// Input record file (previous stage output)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output record file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
pub struct ReportArgs {
    /// Input record file (alignment stage output)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Markdown report path
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Sentiment-annotated copy of the records
    #[arg(long)]
    pub sentiment_output: Option<PathBuf>,
}
