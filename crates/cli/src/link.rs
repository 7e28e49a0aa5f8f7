//! `carrierlink run` and `carrierlink validate`.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use log::info;

use carrierlink_linkage::pipeline::{DEFAULT_MATCHED_OUTPUT, DEFAULT_UNMATCHED_OUTPUT};
use carrierlink_linkage::{LinkConfig, LinkPaths};

use crate::exit_codes::{EXIT_INVALID_CONFIG, EXIT_RUNTIME};
use crate::CliError;

#[derive(Subcommand)]
pub enum LinkCommand {
    /// Link the carrier registry against the insurance feed
    #[command(after_help = "\
Examples:
  carrierlink run census.json insurance.txt
  carrierlink run census.json insurance.txt --config link.toml --workers 4
  carrierlink run census.json insurance.txt --limit 10000 --json > summary.json
  carrierlink run census.json insurance.txt -m out/matched.csv -u out/unmatched.csv")]
    Run(Box<RunArgs>),

    /// Validate a link config without running
    #[command(after_help = "\
Examples:
  carrierlink validate link.toml")]
    Validate {
        /// Path to the link.toml config file
        config: PathBuf,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Carrier registry file (array of JSON objects, framing may be broken)
    pub carriers: PathBuf,

    /// Insurance policy feed (delimited rows, MC and DOT first)
    pub insurance: PathBuf,

    /// Matched output file
    #[arg(long, short = 'm', default_value = DEFAULT_MATCHED_OUTPUT)]
    pub matched: PathBuf,

    /// Unmatched insurance records output file
    #[arg(long, short = 'u', default_value = DEFAULT_UNMATCHED_OUTPUT)]
    pub unmatched: PathBuf,

    /// TOML config file; every setting has a default
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Matcher worker threads (overrides [pipeline] workers)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub workers: Option<u32>,

    /// Stop after this many carrier records (overrides [carriers] limit)
    #[arg(long)]
    pub limit: Option<u64>,

    /// Print the run summary as JSON on stdout instead of text on stderr
    #[arg(long)]
    pub json: bool,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => LinkConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.pipeline.workers = workers as usize;
    }
    if args.limit.is_some() {
        config.carriers.limit = args.limit;
    }

    let paths = LinkPaths {
        carriers: args.carriers,
        insurance: args.insurance,
        matched: args.matched,
        unmatched: args.unmatched,
    };
    let summary = carrierlink_linkage::run(&config, &paths)?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("cannot serialize summary: {e}")))?;
        println!("{json}");
    } else {
        eprintln!("{summary}");
        eprintln!("matched:   {}", paths.matched.display());
        eprintln!("unmatched: {}", paths.unmatched.display());
    }
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let strategies: Vec<&str> = config.matching.strategies.iter().map(|s| s.as_str()).collect();
    eprintln!(
        "valid: {} strategy(ies) [{}], {} worker(s), collision policy {}",
        strategies.len(),
        strategies.join(", "),
        config.pipeline.workers,
        config.insurance.collision,
    );
    Ok(())
}

fn load_config(path: &Path) -> Result<LinkConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CliError::new(EXIT_INVALID_CONFIG, format!("cannot read config '{}': {e}", path.display()))
            .with_hint("omit --config to run with the built-in defaults")
    })?;
    let config = LinkConfig::from_toml(&text)?;
    info!("using config {}", path.display());
    Ok(config)
}
