//! puppet: agent-stream avatar animation runtime binary.
//! Tails the agent's stream file and drives the animation core headless;
//! a renderer embeds `puppet-core` directly and reads poses per frame.

use std::fs::File;
use std::io::{BufRead, BufReader};

use clap::Parser;

use puppet_core::classify::classify;
use puppet_source_stream::parse_line;

mod cli;
mod run_loop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Run(opts) => {
            let filter = std::env::var("PUPPET_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .init();

            run_loop::run(opts).await?;
        }
        cli::Command::Classify(opts) => {
            cmd_classify(&opts)?;
        }
    }

    Ok(())
}

/// Debug tooling: print the classifier's view of each stream line.
fn cmd_classify(opts: &cli::ClassifyOpts) -> anyhow::Result<()> {
    let reader: Box<dyn BufRead> = match &opts.file {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(envelope) => {
                let event = classify(&envelope.event);
                println!("{}", serde_json::to_string(&event)?);
            }
            Err(e) => eprintln!("skipped: {e}"),
        }
    }

    Ok(())
}
