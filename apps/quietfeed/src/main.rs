//! Command-line driver for the QuietFeed content pipeline.
//!
//! Loads a page snapshot, runs the content script against it, replays the
//! requested overlay clicks and client-side navigations, and prints what
//! every pass did.

mod replay;

use clap::Parser;
use qf_core::QfError;
use qf_core::QfResult;
use qf_policy::CONFIG_ENV_VAR;
use qf_policy::PipelineConfig;
use qf_policy::resolve_config_path;
use qf_storage::STORAGE_DIR_ENV_VAR;
use qf_storage::default_storage_root;
use replay::Replay;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quietfeed")]
#[command(about = "Hide short-form video content in a page snapshot")]
#[command(version)]
struct Cli {
    /// HTML snapshot to load
    #[arg(long)]
    html: PathBuf,

    /// Location the snapshot was taken at
    #[arg(long, default_value = "https://www.youtube.com/")]
    url: String,

    /// Client-side navigation to replay after the first pass (repeatable)
    #[arg(long = "navigate", value_name = "URL")]
    navigations: Vec<String>,

    /// Click the show/hide control of the n-th tracked item (repeatable)
    #[arg(long = "click-toggle", value_name = "N")]
    toggles: Vec<usize>,

    /// Click the save control of the n-th tracked item (repeatable)
    #[arg(long = "click-save", value_name = "N")]
    saves: Vec<usize>,

    /// Pipeline configuration file
    #[arg(long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Directory holding saved items and the enabled flag
    #[arg(long, env = STORAGE_DIR_ENV_VAR)]
    storage_dir: Option<PathBuf>,

    /// Keep saved items in memory only, ignoring any storage directory
    #[arg(long)]
    ephemeral: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(failure) => {
            error!(error = %failure, "quietfeed failed");
            eprintln!("quietfeed: {failure}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> QfResult<String> {
    let config = match resolve_config_path(cli.config) {
        Some(path) => PipelineConfig::load(&path)?,
        None => PipelineConfig::default(),
    };
    let html = fs::read_to_string(&cli.html).map_err(|error| {
        QfError::new(
            "cli.html_read_failed",
            format!("failed to read `{}`: {error}", cli.html.display()),
        )
    })?;
    let storage_root = if cli.ephemeral {
        None
    } else {
        Some(cli.storage_dir.unwrap_or_else(default_storage_root))
    };

    let replay = Replay {
        html,
        url: cli.url,
        navigations: cli.navigations,
        toggles: cli.toggles,
        saves: cli.saves,
        config,
        storage_root,
    };
    let summary = replay.run()?;

    if cli.json {
        summary.to_json()
    } else {
        Ok(summary.to_text())
    }
}
