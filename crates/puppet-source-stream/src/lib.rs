//! Event-source boundary: the agent's `stream.jsonl` feed.
//!
//! The transport that writes the stream (auth, reconnection, framing) is
//! someone else's job; this crate only tails the file and turns each line
//! into the raw event value the core classifier consumes, plus a small
//! session-stats reducer for the monitor.

pub mod record;
pub mod stats;
pub mod watcher;

pub use record::{StreamEnvelope, StreamError, parse_line};
pub use stats::SessionStats;
pub use watcher::StreamWatcher;
