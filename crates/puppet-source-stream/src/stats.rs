//! Session statistics folded out of the event stream.
//!
//! The monitor shows context load, session cost and how many subagent tasks
//! are in flight. All of it is derivable from the stream: usage blocks on
//! assistant messages, cost on result events, and Task tool_use/tool_result
//! pairing for the active count. Malformed events are ignored.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Context window used for the percentage readout.
pub const CONTEXT_WINDOW_TOKENS: u64 = 200_000;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionStats {
    pub context_tokens: u64,
    pub context_pct: f32,
    pub session_cost_usd: f64,
    pub last_activity: Option<DateTime<Utc>>,
    active_task_ids: HashSet<String>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_tasks(&self) -> usize {
        self.active_task_ids.len()
    }

    /// Fold one raw event into the stats.
    pub fn update(&mut self, ts: Option<DateTime<Utc>>, event: &Value) {
        if let Some(ts) = ts {
            self.last_activity = Some(ts);
        }

        match event.get("type").and_then(Value::as_str) {
            Some("assistant") => {
                self.update_context(event);
                self.track_task_starts(event);
            }
            Some("user") => self.track_task_completions(event),
            Some("result") => {
                if let Some(cost) = event.get("total_cost_usd").and_then(Value::as_f64) {
                    self.session_cost_usd = cost;
                }
            }
            _ => {}
        }
    }

    fn update_context(&mut self, event: &Value) {
        let Some(usage) = event.get("message").and_then(|m| m.get("usage")) else {
            return;
        };
        let read = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
        let total = read("cache_read_input_tokens") + read("input_tokens");
        if total > 0 {
            self.context_tokens = total;
            self.context_pct =
                (total as f32 / CONTEXT_WINDOW_TOKENS as f32 * 1000.0).round() / 10.0;
        }
    }

    fn track_task_starts(&mut self, event: &Value) {
        for block in content_blocks(event) {
            if block.get("type").and_then(Value::as_str) == Some("tool_use")
                && block.get("name").and_then(Value::as_str) == Some("Task")
                && let Some(id) = block.get("id").and_then(Value::as_str)
            {
                self.active_task_ids.insert(id.to_owned());
            }
        }
    }

    fn track_task_completions(&mut self, event: &Value) {
        for block in content_blocks(event) {
            if block.get("type").and_then(Value::as_str) == Some("tool_result")
                && let Some(id) = block.get("tool_use_id").and_then(Value::as_str)
            {
                self.active_task_ids.remove(id);
            }
        }
    }
}

fn content_blocks(event: &Value) -> impl Iterator<Item = &Value> {
    event
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid datetime")
    }

    #[test]
    fn context_tokens_from_usage() {
        let mut stats = SessionStats::new();
        stats.update(
            None,
            &json!({"type": "assistant", "message": {"usage": {
                "cache_read_input_tokens": 90_000, "input_tokens": 10_000
            }}}),
        );
        assert_eq!(stats.context_tokens, 100_000);
        assert!((stats.context_pct - 50.0).abs() < 0.01);
    }

    #[test]
    fn cost_from_result_event() {
        let mut stats = SessionStats::new();
        stats.update(None, &json!({"type": "result", "total_cost_usd": 1.2345}));
        assert!((stats.session_cost_usd - 1.2345).abs() < 1e-9);
    }

    #[test]
    fn task_pairing_tracks_active_count() {
        let mut stats = SessionStats::new();
        stats.update(
            None,
            &json!({"type": "assistant", "message": {"content": [
                {"type": "tool_use", "id": "task-1", "name": "Task", "input": {}},
                {"type": "tool_use", "id": "task-2", "name": "Task", "input": {}}
            ]}}),
        );
        assert_eq!(stats.active_tasks(), 2);

        stats.update(
            None,
            &json!({"type": "user", "message": {"content": [
                {"type": "tool_result", "tool_use_id": "task-1", "content": "done"}
            ]}}),
        );
        assert_eq!(stats.active_tasks(), 1);
    }

    #[test]
    fn non_task_tools_not_counted() {
        let mut stats = SessionStats::new();
        stats.update(
            None,
            &json!({"type": "assistant", "message": {"content": [
                {"type": "tool_use", "id": "b1", "name": "Bash", "input": {"command": "ls"}}
            ]}}),
        );
        assert_eq!(stats.active_tasks(), 0);
    }

    #[test]
    fn last_activity_tracks_latest_ts() {
        let mut stats = SessionStats::new();
        stats.update(Some(t0()), &json!({"type": "system"}));
        assert_eq!(stats.last_activity, Some(t0()));
    }

    #[test]
    fn malformed_events_ignored() {
        let mut stats = SessionStats::new();
        stats.update(None, &json!("just a string"));
        stats.update(None, &json!({"type": "assistant", "message": "no blocks"}));
        stats.update(None, &json!({"type": "result", "total_cost_usd": "free"}));
        assert_eq!(stats, SessionStats::new());
    }
}
