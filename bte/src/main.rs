//! Behavior-tree execution engine CLI.
//!
//! Loads a `<bt>` document, ticks it to completion and exits with the integer
//! value of the final status (success 0, failure 1, running 2, error 3).

use std::path::PathBuf;

use anyhow::Result;
use bte::core::types::Status;
use bte::engine::Engine;
use bte::exit_codes;
use bte::io::config::{EngineConfig, load_config};
use bte::io::document::load_document;
use bte::logging;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "bte", version, about = "Behavior-tree execution engine")]
struct Cli {
    /// Behavior tree document (XML with a `<bt>` root element).
    path: PathBuf,

    /// Enable verbose tracing of every node evaluation.
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Engine configuration (TOML). Defaults apply when omitted or missing.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    logging::init(cli.debug);

    let status = match run(&cli) {
        Ok(status) => status,
        Err(err) => {
            eprintln!("{:#}", err);
            Status::Error
        }
    };
    std::process::exit(status.code());
}

fn run(cli: &Cli) -> Result<Status> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    let mut tree = load_document(&cli.path)?;
    let mut engine = Engine::new(config, cli.debug);
    let outcome = engine.run(&mut tree);
    Ok(outcome.status)
}
