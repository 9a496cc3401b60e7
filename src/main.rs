use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use multiway::config::{TreeConfig, Variant};
use multiway::event::Retention;
use multiway::repl::{Flow, Session};

/// Explore B-tree and B+ tree rebalancing one command at a time
#[derive(Debug, Parser)]
#[command(name = "multiway", version)]
struct Cli {
    /// JSON file with `variant`, `fanout` and optional `retention`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tree variant, overrides the config file
    #[arg(long, value_enum)]
    variant: Option<Variant>,

    /// Minimum degree (btree) or order (bplus)
    #[arg(long)]
    fanout: Option<usize>,

    /// Keep only this many events (0 keeps everything)
    #[arg(long)]
    retention: Option<usize>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "multiway=warn")]
    log_level: String,

    /// Run the commands in this file instead of prompting
    #[arg(long)]
    script: Option<PathBuf>,
}

impl Cli {
    fn tree_config(&self) -> Result<TreeConfig, String> {
        let mut config = match &self.config {
            Some(path) => TreeConfig::from_json_file(path).map_err(|e| e.to_string())?,
            None => TreeConfig::new(self.variant.unwrap_or(Variant::BPlus)),
        };

        if let Some(variant) = self.variant {
            config = config.with_variant(variant);
        }
        if let Some(fanout) = self.fanout {
            config = config.with_fanout(fanout);
        }
        match self.retention {
            Some(0) => config = config.with_retention(Retention::Unbounded),
            Some(n) => config = config.with_retention(Retention::Latest(n)),
            None => {}
        }

        Ok(config)
    }
}

fn run_script(session: &mut Session, path: &Path) -> Result<(), String> {
    let script = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    for entry in session.replay(&script) {
        println!("{entry}");
    }
    Ok(())
}

fn run_interactive(session: &mut Session) -> Result<(), ReadlineError> {
    let mut editor = DefaultEditor::new()?;
    let config = session.config();
    println!(
        "multiway: {:?} with fanout {}, type 'help' for commands",
        config.variant, config.fanout
    );

    loop {
        match editor.readline(">> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                editor.add_history_entry(line.as_str())?;
                match session.execute(&line) {
                    Flow::Continue(output) => println!("{output}"),
                    Flow::Quit => break,
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match cli.tree_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut session = match Session::new(config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(config = ?session.config(), "session started");

    let outcome = match &cli.script {
        Some(path) => run_script(&mut session, path),
        None => run_interactive(&mut session).map_err(|e| e.to_string()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
