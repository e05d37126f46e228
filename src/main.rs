use clap::Parser;
use std::process::ExitCode;

use moralign::cli::{Cli, Command};
use moralign::config::{self, MoralignConfig};
use moralign::{MoralignError, alignment, corpus, morality, report};

fn run_all(config: &MoralignConfig) -> Result<(), MoralignError> {
    let paths = &config.paths;
    corpus::handle_clean(config, &paths.raw_dir, &paths.cleaned)?;
    morality::handle_morality(&config.morality, &paths.cleaned, &paths.morality)?;
    alignment::handle_align(&paths.morality, &paths.alignment)?;
    report::handle_report(&config.report, &paths.alignment, &paths.report, &paths.sentiment)
}

fn run() -> Result<(), MoralignError> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    let paths = &config.paths;

    match cli.command {
        Command::Clean(args) => corpus::handle_clean(
            &config,
            args.input.as_deref().unwrap_or(&paths.raw_dir),
            args.output.as_deref().unwrap_or(&paths.cleaned),
        ),
        Command::Morality(args) => morality::handle_morality(
            &config.morality,
            args.input.as_deref().unwrap_or(&paths.cleaned),
            args.output.as_deref().unwrap_or(&paths.morality),
        ),
        Command::Align(args) => alignment::handle_align(
            args.input.as_deref().unwrap_or(&paths.morality),
            args.output.as_deref().unwrap_or(&paths.alignment),
        ),
        Command::Report(args) => report::handle_report(
            &config.report,
            args.input.as_deref().unwrap_or(&paths.alignment),
            args.output.as_deref().unwrap_or(&paths.report),
            args.sentiment_output.as_deref().unwrap_or(&paths.sentiment),
        ),
        Command::Run => run_all(&config),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("moralign: {e}");
            ExitCode::from(1)
        }
    }
}
