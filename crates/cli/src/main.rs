// carrierlink - carrier registry / insurance feed record linkage

mod exit_codes;
mod link;

use std::process::ExitCode;

use clap::Parser;

use exit_codes::{link_exit_code, EXIT_SUCCESS};
use link::LinkCommand;

#[derive(Parser)]
#[command(name = "carrierlink")]
#[command(about = "Link a carrier registry to an insurance policy feed")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: LinkCommand,

    /// Only log warnings and errors (RUST_LOG still overrides)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("CARRIERLINK_GIT_REV"), ")",
        "\nlinkage: carrierlink-linkage ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("CARRIERLINK_TARGET"),
    )
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let result = match cli.command {
        LinkCommand::Run(args) => link::cmd_run(*args),
        LinkCommand::Validate { config } => link::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<carrierlink_linkage::LinkError> for CliError {
    fn from(err: carrierlink_linkage::LinkError) -> Self {
        use carrierlink_linkage::LinkError;

        let code = link_exit_code(&err);
        let hint = match &err {
            LinkError::MissingFile { .. } => {
                Some("both input files must exist before a run starts; nothing was written")
            }
            LinkError::Csv { .. } => Some("check [insurance] delimiter in the config file"),
            LinkError::ConfigParse(_) | LinkError::ConfigValidation(_) => {
                Some("run `carrierlink validate <config>` to check a config on its own")
            }
            _ => None,
        };
        let mut cli = CliError::new(code, err.to_string());
        cli.hint = hint.map(str::to_string);
        cli
    }
}
