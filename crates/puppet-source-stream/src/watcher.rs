//! Tail-reading watcher for the stream file.
//!
//! Tracks a byte offset into the file and returns only complete new lines on
//! each poll. Three filesystem events need surviving:
//!
//! - **truncation**: the producer trims old events by rewriting the file; the
//!   size shrinks, so jump to the new end and skip the batch (re-reading
//!   would re-broadcast everything),
//! - **rotation**: the inode changes; reread the new file from the start,
//! - **partial writes**: a line without its trailing newline is buffered
//!   until the next poll completes it.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct StreamWatcher {
    path: PathBuf,
    /// Current byte offset into the file.
    seek_pos: u64,
    /// Inode number (rotation detection).
    inode: u64,
    /// Incomplete trailing line carried across polls.
    incomplete_buffer: String,
}

impl StreamWatcher {
    /// Watch `path`, starting at its current end (history is skipped).
    pub fn new(path: PathBuf) -> Self {
        let (seek_pos, inode) = file_metadata(&path).unwrap_or((0, 0));
        Self {
            path,
            seek_pos,
            inode,
            incomplete_buffer: String::new(),
        }
    }

    /// Watch `path` from the beginning (historical replay).
    pub fn from_start(path: PathBuf) -> Self {
        let inode = file_metadata(&path).map(|(_, ino)| ino).unwrap_or(0);
        Self {
            path,
            seek_pos: 0,
            inode,
            incomplete_buffer: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Complete new lines since the last poll, trailing newlines stripped.
    pub fn poll_new_lines(&mut self) -> Vec<String> {
        match file_metadata(&self.path) {
            Some((size, new_inode)) => {
                if self.inode != 0 && new_inode != self.inode {
                    debug!(path = %self.path.display(), "stream rotated, rereading");
                    self.seek_pos = 0;
                    self.incomplete_buffer.clear();
                } else if size < self.seek_pos {
                    // Trimmed in place: the whole file was rewritten. Skip to
                    // the end rather than re-reading everything.
                    debug!(
                        path = %self.path.display(),
                        was = self.seek_pos,
                        now = size,
                        "stream truncated, jumping to end"
                    );
                    self.seek_pos = size;
                    self.incomplete_buffer.clear();
                    self.inode = new_inode;
                    return Vec::new();
                }
                self.inode = new_inode;
            }
            None => return Vec::new(),
        }

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to open stream file");
                return Vec::new();
            }
        };

        let mut reader = BufReader::new(file);
        if let Err(e) = reader.seek(SeekFrom::Start(self.seek_pos)) {
            warn!(
                path = %self.path.display(),
                offset = self.seek_pos,
                error = %e,
                "failed to seek in stream file"
            );
            return Vec::new();
        }

        let mut lines = Vec::new();
        let mut buf = String::new();

        loop {
            buf.clear();
            match reader.read_line(&mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    if buf.ends_with('\n') {
                        let mut line = std::mem::take(&mut self.incomplete_buffer);
                        line.push_str(buf.trim_end_matches('\n'));
                        if !line.is_empty() {
                            lines.push(line);
                        }
                    } else {
                        // Partial line at EOF; complete it next poll.
                        self.incomplete_buffer.push_str(&buf);
                    }
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "error reading stream file");
                    break;
                }
            }
        }

        if let Ok(pos) = reader.stream_position() {
            self.seek_pos = pos;
        }

        lines
    }
}

fn file_metadata(path: &Path) -> Option<(u64, u64)> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        fs::metadata(path).ok().map(|m| (m.len(), m.ino()))
    }
    #[cfg(not(unix))]
    {
        fs::metadata(path).ok().map(|m| (m.len(), 0))
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_stream(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("puppet-test-watcher");
        fs::create_dir_all(&dir).expect("test");
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn append(path: &Path, line: &str) {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("test");
        writeln!(f, "{line}").expect("test");
    }

    #[test]
    fn reads_new_lines_once() {
        let path = temp_stream("read-once.jsonl");
        fs::write(&path, "").expect("test");
        let mut w = StreamWatcher::from_start(path.clone());

        append(&path, r#"{"type":"user"}"#);
        append(&path, r#"{"type":"assistant"}"#);

        let lines = w.poll_new_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("user"));
        assert!(w.poll_new_lines().is_empty(), "no re-delivery");

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn new_watcher_skips_history() {
        let path = temp_stream("skip-history.jsonl");
        fs::write(&path, "{\"type\":\"user\"}\n{\"type\":\"assistant\"}\n").expect("test");

        let mut w = StreamWatcher::new(path.clone());
        assert!(w.poll_new_lines().is_empty());

        append(&path, r#"{"type":"result"}"#);
        let lines = w.poll_new_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("result"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn partial_line_buffered_until_complete() {
        let path = temp_stream("partial.jsonl");
        fs::write(&path, "").expect("test");
        let mut w = StreamWatcher::from_start(path.clone());

        let mut f = fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .expect("test");
        write!(f, r#"{{"type":"us"#).expect("test");
        f.flush().expect("test");

        assert!(w.poll_new_lines().is_empty(), "partial line held back");

        writeln!(f, r#"er"}}"#).expect("test");
        let lines = w.poll_new_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], r#"{"type":"user"}"#);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn truncation_jumps_to_end_without_redelivery() {
        let path = temp_stream("truncate.jsonl");
        fs::write(&path, "").expect("test");
        let mut w = StreamWatcher::from_start(path.clone());

        for i in 0..5 {
            append(&path, &format!("{{\"type\":\"user\",\"n\":{i}}}"));
        }
        assert_eq!(w.poll_new_lines().len(), 5);

        // The producer trims the file in place: size shrinks.
        fs::write(&path, "{\"type\":\"user\",\"n\":4}\n").expect("test");
        assert!(
            w.poll_new_lines().is_empty(),
            "trim batch must be skipped, not re-broadcast"
        );

        // New appends after the trim flow normally.
        append(&path, r#"{"type":"result"}"#);
        let lines = w.poll_new_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("result"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_polls_empty_then_recovers() {
        let path = temp_stream("missing.jsonl");
        let mut w = StreamWatcher::from_start(path.clone());
        assert!(w.poll_new_lines().is_empty());

        append(&path, r#"{"type":"user"}"#);
        assert_eq!(w.poll_new_lines().len(), 1);

        let _ = fs::remove_file(&path);
    }
}
