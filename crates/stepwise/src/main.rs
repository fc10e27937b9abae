use std::process::ExitCode;

use clap::Parser;
use stepwise::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if cli::is_canceled(&err) => {
            eprintln!("canceled");
            ExitCode::from(cli::EXIT_CANCELED)
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
