use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use stepwise_qm::QmError;

use crate::cmd::{self, answer::AnswerArgs, check::CheckArgs};
use crate::config::Config;
use crate::logging;

/// Exit status used when the traversal was canceled.
pub const EXIT_CANCELED: u8 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "stepwise",
    about = "Resolve question trees from preset answers and defaults",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    #[arg(long, value_name = "stepwise.toml", global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question tree and print the answers as JSON
    Answer(AnswerArgs),
    /// Parse a question tree and check that question names are unique
    Check(CheckArgs),
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    logging::init(config.log_filter.as_deref(), cli.verbose);
    tracing::debug!(config = ?cli.config, "configuration loaded");

    match cli.command {
        Commands::Answer(args) => cmd::answer::run(args, &config).await,
        Commands::Check(args) => cmd::check::run(args),
    }
}

/// Whether `err` stems from the user canceling the traversal.
pub fn is_canceled(err: &anyhow::Error) -> bool {
    err.downcast_ref::<QmError>().is_some_and(QmError::is_cancel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_answer_subcommand() {
        let cli = Cli::try_parse_from([
            "stepwise",
            "answer",
            "--tree",
            "tree.json",
            "--answers",
            "seed.json",
            "--accept-defaults",
            "-v",
        ])
        .expect("expected CLI to parse");
        assert!(cli.verbose);
        match cli.command {
            Commands::Answer(args) => {
                assert_eq!(args.tree, PathBuf::from("tree.json"));
                assert_eq!(args.answers, Some(PathBuf::from("seed.json")));
                assert!(args.accept_defaults);
                assert!(args.out.is_none());
            }
            _ => panic!("expected answer args"),
        }
    }

    #[test]
    fn parses_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stepwise",
            "check",
            "--tree",
            "tree.json",
            "--config",
            "custom.toml",
        ])
        .expect("expected CLI to parse");
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Check(_)));
    }

    #[test]
    fn cancellation_is_recognized_through_context() {
        let err = anyhow::Error::new(QmError::UserCancel).context("answering tree.json");
        assert!(is_canceled(&err));
        assert!(!is_canceled(&anyhow::anyhow!("boom")));
    }
}
