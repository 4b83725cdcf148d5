//! CLI definition using clap derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "puppet", about = "agent-stream avatar animation daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Tail a stream file and drive the avatar (headless sinks)
    Run(RunOpts),
    /// Classify stream lines and print one JSON event per line
    Classify(ClassifyOpts),
}

#[derive(clap::Args)]
pub struct RunOpts {
    /// Stream file to tail (JSONL, one event envelope per line)
    #[arg(long, env = "PUPPET_STREAM", default_value = "stream.jsonl")]
    pub stream: PathBuf,

    /// Logic tick rate in Hz
    #[arg(long, default_value = "60")]
    pub tick_hz: u32,

    /// Replay the file from the beginning instead of tailing from the end
    #[arg(long)]
    pub from_start: bool,
}

#[derive(clap::Args)]
pub struct ClassifyOpts {
    /// Read from this file instead of stdin
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["puppet", "run"]);
        let Command::Run(opts) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(opts.tick_hz, 60);
        assert!(!opts.from_start);
        assert_eq!(opts.stream, PathBuf::from("stream.jsonl"));
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::parse_from([
            "puppet",
            "run",
            "--stream",
            "/tmp/s.jsonl",
            "--tick-hz",
            "30",
            "--from-start",
        ]);
        let Command::Run(opts) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(opts.tick_hz, 30);
        assert!(opts.from_start);
    }
}
