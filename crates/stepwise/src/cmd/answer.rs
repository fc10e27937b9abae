use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use stepwise_qm::{AnswerStore, InputResult, PresetGateway, QmError, traverse};

use super::load_tree;
use crate::config::Config;

#[derive(Args, Debug, Clone)]
pub struct AnswerArgs {
    #[arg(long, value_name = "tree.json")]
    pub tree: PathBuf,
    /// Answers used instead of asking; these questions are skipped
    #[arg(long, value_name = "answers.json")]
    pub answers: Option<PathBuf>,
    /// Write the answers here instead of stdout
    #[arg(long, value_name = "answers.json")]
    pub out: Option<PathBuf>,
    /// Answer remaining questions with their defaults
    #[arg(long)]
    pub accept_defaults: bool,
    #[arg(long)]
    pub pretty: bool,
}

pub async fn run(args: AnswerArgs, config: &Config) -> Result<()> {
    let tree = load_tree(&args.tree)?;
    let mut answers = match &args.answers {
        Some(path) => load_answers(path)?,
        None => AnswerStore::new(),
    };
    let seeded = answers.len();

    let gateway = PresetGateway::new(args.accept_defaults || config.accept_defaults);
    match traverse(&tree, &mut answers, &gateway, None).await {
        InputResult::Success(_) | InputResult::Skip(_) => {}
        InputResult::Back | InputResult::Cancel => {
            return Err(QmError::UserCancel)
                .with_context(|| format!("answering {}", args.tree.display()));
        }
        InputResult::Error(err) => {
            return Err(err).with_context(|| format!("answering {}", args.tree.display()));
        }
    }
    tracing::info!(seeded, answered = answers.len() - seeded, "tree answered");

    let payload = if args.pretty || config.pretty {
        serde_json::to_string_pretty(&answers)?
    } else {
        serde_json::to_string(&answers)?
    };
    match &args.out {
        Some(path) => write_answers(path, &payload),
        None => {
            println!("{payload}");
            Ok(())
        }
    }
}

fn load_answers(path: &Path) -> Result<AnswerStore> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read answers {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("answers {} must be valid JSON", path.display()))?;
    AnswerStore::from_json(&value).with_context(|| format!("invalid answers {}", path.display()))
}

fn write_answers(path: &Path, payload: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create out parent {}", parent.display()))?;
    }
    fs::write(path, payload).with_context(|| format!("failed to write answers {}", path.display()))
}
