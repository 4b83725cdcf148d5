use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Event classification ─────────────────────────────────────────

/// Top-level kind of one classified activity record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    System,
    Result,
    Thinking,
    ToolUse,
    ToolResult,
    #[default]
    Unknown,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Result => "result",
            Self::Thinking => "thinking",
            Self::ToolUse => "tool_use",
            Self::ToolResult => "tool_result",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-classification of a tool-use block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolAction {
    CheckMessages,
    SendMessage,
    Shell,
    Edit,
    ReadFile,
    ReadImage,
    Other,
}

impl ToolAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckMessages => "check_messages",
            Self::SendMessage => "send_message",
            Self::Shell => "shell",
            Self::Edit => "edit",
            Self::ReadFile => "read_file",
            Self::ReadImage => "read_image",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ToolAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized, tagged representation of one raw activity record.
/// Produced once per record by [`crate::classify::classify`]; immutable.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    /// Present only for `ToolUse` events.
    pub action: Option<ToolAction>,
    /// Tool-use id (or `tool_use_id` on results) for request/result pairing.
    pub tool_id: Option<String>,
    /// Kind-specific payload: tool input, result content, or text block.
    pub content: Option<serde_json::Value>,
    /// Extracted outgoing chat text for `send_message` invocations.
    pub message_content: Option<String>,
    pub is_error: bool,
}

impl ClassifiedEvent {
    /// The catch-all event for records nothing else matched.
    pub fn unknown() -> Self {
        Self::default()
    }
}

// ─── Activity ─────────────────────────────────────────────────────

/// The avatar's current high-level behavior mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    #[default]
    Idle,
    Waking,
    CheckMessages,
    Thinking,
    Terminal,
    Editing,
    ReadFile,
    ReadImage,
    SendMessage,
    Done,
}

impl ActivityState {
    pub const ALL: [Self; 10] = [
        Self::Idle,
        Self::Waking,
        Self::CheckMessages,
        Self::Thinking,
        Self::Terminal,
        Self::Editing,
        Self::ReadFile,
        Self::ReadImage,
        Self::SendMessage,
        Self::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Waking => "waking",
            Self::CheckMessages => "check_messages",
            Self::Thinking => "thinking",
            Self::Terminal => "terminal",
            Self::Editing => "editing",
            Self::ReadFile => "read_file",
            Self::ReadImage => "read_image",
            Self::SendMessage => "send_message",
            Self::Done => "done",
        }
    }

    /// States that keep a monitor overlay on screen. Leaving one of these
    /// for a non-overlay state clears the overlay; overlay→overlay does not
    /// (prevents flicker between consecutive overlay-producing actions).
    pub fn has_overlay(self) -> bool {
        matches!(
            self,
            Self::Editing | Self::ReadFile | Self::ReadImage | Self::Terminal
        )
    }

    /// States during which the avatar's hands idly work the keyboard.
    pub fn is_working(self) -> bool {
        matches!(self, Self::Thinking | Self::Editing | Self::Terminal)
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-state transition payload.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StateData {
    #[default]
    None,
    Command {
        command: String,
    },
    File {
        path: String,
    },
    Diff {
        path: String,
        old_text: String,
        new_text: String,
    },
    Message {
        text: String,
    },
}

// ─── Hands & typing ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const ALL: [Self; 2] = [Self::Left, Self::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three arm-trajectory phases of one simulated keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPhase {
    Hover,
    Press,
    Lift,
}

/// Mutual-exclusion flag: at most one animation driver owns the arms.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypingMode {
    #[default]
    None,
    /// Idle "busy hands" filler while a working state is active.
    Random,
    /// A choreographed interaction burst owns an arm.
    Burst,
    /// A chat typing session owns the arms.
    Message,
}

// ─── Chat ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub author: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_serde_roundtrip() {
        for kind in [
            EventKind::System,
            EventKind::Result,
            EventKind::Thinking,
            EventKind::ToolUse,
            EventKind::ToolResult,
            EventKind::Unknown,
        ] {
            let json = serde_json::to_string(&kind).expect("serialize");
            let back: EventKind = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn activity_state_serde_names() {
        let json = serde_json::to_string(&ActivityState::CheckMessages).expect("serialize");
        assert_eq!(json, "\"check_messages\"");
        let json = serde_json::to_string(&ActivityState::ReadImage).expect("serialize");
        assert_eq!(json, "\"read_image\"");
    }

    #[test]
    fn activity_state_display_matches_as_str() {
        for state in ActivityState::ALL {
            assert_eq!(state.to_string(), state.as_str());
        }
    }

    #[test]
    fn overlay_states() {
        assert!(ActivityState::Editing.has_overlay());
        assert!(ActivityState::ReadFile.has_overlay());
        assert!(ActivityState::ReadImage.has_overlay());
        assert!(ActivityState::Terminal.has_overlay());
        assert!(!ActivityState::Thinking.has_overlay());
        assert!(!ActivityState::SendMessage.has_overlay());
    }

    #[test]
    fn working_states() {
        assert!(ActivityState::Thinking.is_working());
        assert!(ActivityState::Editing.is_working());
        assert!(ActivityState::Terminal.is_working());
        assert!(!ActivityState::Idle.is_working());
        assert!(!ActivityState::CheckMessages.is_working());
    }

    #[test]
    fn typing_mode_default_is_none() {
        assert_eq!(TypingMode::default(), TypingMode::None);
    }

    #[test]
    fn classified_event_unknown_defaults() {
        let ev = ClassifiedEvent::unknown();
        assert_eq!(ev.kind, EventKind::Unknown);
        assert!(ev.action.is_none());
        assert!(ev.message_content.is_none());
        assert!(!ev.is_error);
    }

    #[test]
    fn state_data_serde_roundtrip() {
        let data = StateData::Diff {
            path: "src/main.rs".into(),
            old_text: "a".into(),
            new_text: "b".into(),
        };
        let json = serde_json::to_string(&data).expect("serialize");
        let back: StateData = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(data, back);
    }
}
