//! Chat state: per-channel message history and the single typing session.
//!
//! The manager owns at most one [`TypingSession`] at a time. A session walks
//! its text one character per inter-character delay, emitting [`ChatEvent`]s
//! the orchestrator forwards to the typing controller and overlay. On
//! natural completion the full text is committed to the current channel's
//! log; an aborted session commits nothing. **Rush** shortens the remaining
//! delays without skipping or truncating a single character.
//!
//! Channel logs deduplicate by message id and evict FIFO beyond the cap, so
//! replaying the same batch twice is a no-op.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::ChatMessage;

/// Messages kept per channel before FIFO eviction.
pub const CHANNEL_CAP: usize = 50;

/// Inter-character delay for an ordinary session.
pub const CHAR_DELAY_SECS: f32 = 0.18;

/// Inter-character delay once the session has been rushed.
pub const RUSH_CHAR_DELAY_SECS: f32 = 0.04;

/// Author attached to messages the avatar itself types.
pub const AGENT_AUTHOR: &str = "agent";

// ─── Channel log ──────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ChannelLog {
    messages: VecDeque<ChatMessage>,
}

impl ChannelLog {
    /// Append unless the id is already present. Returns whether it was added.
    pub fn push(&mut self, message: ChatMessage) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push_back(message);
        while self.messages.len() > CHANNEL_CAP {
            self.messages.pop_front();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn latest(&self) -> Option<&ChatMessage> {
        self.messages.back()
    }
}

// ─── Typing session ───────────────────────────────────────────────

#[derive(Debug)]
struct TypingSession {
    text: Vec<char>,
    index: usize,
    rushed: bool,
    delay_left: f32,
}

impl TypingSession {
    fn char_delay(&self) -> f32 {
        if self.rushed {
            RUSH_CHAR_DELAY_SECS
        } else {
            CHAR_DELAY_SECS
        }
    }
}

/// Observable chat activity, consumed by the orchestrator's dispatch loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    SessionStarted,
    CharTyped(char),
    /// `committed` is `None` when the session was aborted.
    SessionFinished { committed: Option<ChatMessage> },
}

// ─── Manager ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ChatManager {
    channels: HashMap<String, ChannelLog>,
    active_channel: Option<String>,
    session: Option<TypingSession>,
    completed_once: bool,
    commit_seq: u64,
}

impl ChatManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active_channel(&mut self, channel_id: &str) {
        self.active_channel = Some(channel_id.to_owned());
        self.channels.entry(channel_id.to_owned()).or_default();
    }

    pub fn active_channel(&self) -> Option<&str> {
        self.active_channel.as_deref()
    }

    pub fn channel(&self, channel_id: &str) -> Option<&ChannelLog> {
        self.channels.get(channel_id)
    }

    /// Messages of the active channel, oldest first.
    pub fn active_messages(&self) -> Vec<ChatMessage> {
        self.active_channel
            .as_deref()
            .and_then(|id| self.channels.get(id))
            .map(|log| log.messages().cloned().collect())
            .unwrap_or_default()
    }

    /// Merge a batch by id, evicting oldest beyond the cap. Returns the
    /// number actually added; replaying an identical batch adds zero.
    pub fn receive_messages(&mut self, channel_id: &str, messages: Vec<ChatMessage>) -> usize {
        let log = self.channels.entry(channel_id.to_owned()).or_default();
        messages.into_iter().filter(|m| log.push(m.clone())).count()
    }

    /// True until the very first typing session completes, so historical
    /// replay never falls back to animated typing.
    pub fn is_initial_load(&self) -> bool {
        !self.completed_once
    }

    pub fn session_active(&self) -> bool {
        self.session.is_some()
    }

    /// Begin typing `text`. Refuses (returns `None`) while a session is
    /// already active or when there is nothing to type.
    pub fn type_message(&mut self, text: &str) -> Option<ChatEvent> {
        if self.session.is_some() || text.is_empty() {
            return None;
        }
        self.session = Some(TypingSession {
            text: text.chars().collect(),
            index: 0,
            rushed: false,
            delay_left: CHAR_DELAY_SECS,
        });
        Some(ChatEvent::SessionStarted)
    }

    /// Cancel the active session without committing. Idempotent: a second
    /// abort, or an abort with no session, is a no-op returning `None`.
    pub fn abort_typing(&mut self) -> Option<ChatEvent> {
        self.session.take()?;
        Some(ChatEvent::SessionFinished { committed: None })
    }

    /// Shorten the remaining inter-character delays. The rendered text is
    /// never skipped or truncated.
    pub fn rush_typing(&mut self) {
        if let Some(session) = &mut self.session {
            session.rushed = true;
            session.delay_left = session.delay_left.min(RUSH_CHAR_DELAY_SECS);
        }
    }

    /// Advance the session by one logic tick, emitting typed characters and
    /// the commit once the trailing delay elapses.
    pub fn tick(&mut self, dt: f32, now: DateTime<Utc>) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        let mut finished_text: Option<String> = None;

        if let Some(session) = &mut self.session {
            session.delay_left -= dt;
            while session.delay_left <= 0.0 {
                if session.index < session.text.len() {
                    let ch = session.text[session.index];
                    session.index += 1;
                    events.push(ChatEvent::CharTyped(ch));
                    session.delay_left += session.char_delay();
                } else {
                    // Trailing delay elapsed: the session is complete.
                    finished_text = Some(session.text.iter().collect());
                    break;
                }
            }
        }

        if let Some(text) = finished_text {
            self.session = None;
            self.completed_once = true;
            let committed = self.commit(text, now);
            events.push(ChatEvent::SessionFinished {
                committed: Some(committed),
            });
        }

        events
    }

    fn commit(&mut self, text: String, now: DateTime<Utc>) -> ChatMessage {
        self.commit_seq += 1;
        let message = ChatMessage {
            id: format!("{AGENT_AUTHOR}-{}", self.commit_seq),
            author: AGENT_AUTHOR.to_owned(),
            content: text,
            timestamp: now,
        };
        let channel_id = self
            .active_channel
            .clone()
            .unwrap_or_else(|| "general".to_owned());
        self.channels
            .entry(channel_id)
            .or_default()
            .push(message.clone());
        message
    }
}

// ─── Incoming message parsing ─────────────────────────────────────

/// Decode a `check_messages` tool-result payload into chat messages.
///
/// The payload is either a JSON string or a list of text blocks wrapping
/// one; the body looks like `{"messages": [{"id", "author", "content",
/// "timestamp"}, ...]}`. Malformed nested JSON is "no data", not an error.
pub fn parse_incoming_messages(content: &Value, now: DateTime<Utc>) -> Vec<ChatMessage> {
    let body = match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => return Vec::new(),
    };

    let Ok(parsed) = serde_json::from_str::<Value>(&body) else {
        return Vec::new();
    };
    let Some(items) = parsed.get("messages").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let content = item.get("content").and_then(Value::as_str)?;
            let id = item
                .get("id")
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })?;
            let author = item
                .get("author")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let timestamp = item
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(now);
            Some(ChatMessage {
                id,
                author: author.to_owned(),
                content: content.to_owned(),
                timestamp,
            })
        })
        .collect()
}

// ─── Tests ────────────────────────────────────────────────────────
