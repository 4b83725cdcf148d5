//! Event classification: one raw activity record → one [`ClassifiedEvent`].
//!
//! Raw records are the agent transcript's JSON lines (`system`, `assistant`,
//! `user`, `result`). Classification is pure and total: malformed or
//! unrecognized input yields `EventKind::Unknown`, never an error — this is a
//! presentation layer and the state machine simply ignores unknowns.

use serde_json::Value;

use crate::types::{ActivityState, ClassifiedEvent, EventKind, StateData, ToolAction};

/// File extensions rendered as images rather than text.
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Classify one raw record. First matching content block wins, priority:
/// text block > tool-use block > tool-result block.
pub fn classify(raw: &Value) -> ClassifiedEvent {
    match raw.get("type").and_then(Value::as_str) {
        Some("system") => ClassifiedEvent {
            kind: EventKind::System,
            content: raw.get("subtype").cloned(),
            ..ClassifiedEvent::default()
        },
        Some("result") => ClassifiedEvent {
            kind: EventKind::Result,
            is_error: raw
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            content: raw.get("result").cloned(),
            ..ClassifiedEvent::default()
        },
        Some("assistant") => classify_assistant(raw),
        Some("user") => classify_user(raw),
        _ => ClassifiedEvent::unknown(),
    }
}

fn message_blocks(raw: &Value) -> Option<&Vec<Value>> {
    raw.get("message")?.get("content")?.as_array()
}

fn classify_assistant(raw: &Value) -> ClassifiedEvent {
    let Some(blocks) = message_blocks(raw) else {
        return ClassifiedEvent::unknown();
    };

    // Text beats tool use: a visible thought is the stronger signal.
    for block in blocks {
        if block.get("type").and_then(Value::as_str) == Some("text")
            && let Some(text) = block.get("text").and_then(Value::as_str)
            && !text.trim().is_empty()
        {
            return ClassifiedEvent {
                kind: EventKind::Thinking,
                content: Some(Value::String(text.to_owned())),
                ..ClassifiedEvent::default()
            };
        }
    }

    for block in blocks {
        if block.get("type").and_then(Value::as_str) == Some("tool_use") {
            return classify_tool_use(block);
        }
    }

    ClassifiedEvent::unknown()
}

fn classify_user(raw: &Value) -> ClassifiedEvent {
    let Some(blocks) = message_blocks(raw) else {
        return ClassifiedEvent::unknown();
    };

    for block in blocks {
        if block.get("type").and_then(Value::as_str) == Some("tool_result") {
            return ClassifiedEvent {
                kind: EventKind::ToolResult,
                tool_id: block
                    .get("tool_use_id")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                content: block.get("content").cloned(),
                is_error: block
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                ..ClassifiedEvent::default()
            };
        }
    }

    ClassifiedEvent::unknown()
}

fn classify_tool_use(block: &Value) -> ClassifiedEvent {
    let name = block.get("name").and_then(Value::as_str).unwrap_or("");
    let input = block.get("input").cloned().unwrap_or(Value::Null);
    let tool_id = block.get("id").and_then(Value::as_str).map(str::to_owned);

    let (action, message_content) = match name {
        "Bash" => {
            let command = input.get("command").and_then(Value::as_str).unwrap_or("");
            if command.contains("check_messages") {
                (ToolAction::CheckMessages, None)
            } else if command.contains("send_message") {
                (ToolAction::SendMessage, extract_message_content(command))
            } else {
                (ToolAction::Shell, None)
            }
        }
        "Edit" | "Write" | "MultiEdit" | "NotebookEdit" => (ToolAction::Edit, None),
        "Read" => {
            let path = input
                .get("file_path")
                .and_then(Value::as_str)
                .unwrap_or("");
            if is_image_path(path) {
                (ToolAction::ReadImage, None)
            } else {
                (ToolAction::ReadFile, None)
            }
        }
        _ => (ToolAction::Other, None),
    };

    ClassifiedEvent {
        kind: EventKind::ToolUse,
        action: Some(action),
        tool_id,
        content: Some(input),
        message_content,
        ..ClassifiedEvent::default()
    }
}

fn is_image_path(path: &str) -> bool {
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

// ─── Message payload extraction ───────────────────────────────────

/// Pull the outgoing chat text out of a `send_message` shell command.
///
/// The command embeds a JSON body whose quoting varies with how the agent
/// wrote the invocation, so extraction tries three forms in order:
///
/// 1. a plain `"content":"..."` scan (handles `\"` escapes in the value),
/// 2. decoding the embedded JSON body (also after un-escaping `\"`),
/// 3. a single-quoted `'content': '...'` scan.
///
/// Failure is `None`, never an error.
pub fn extract_message_content(command: &str) -> Option<String> {
    if let Some(text) = scan_double_quoted(command) {
        return Some(text);
    }
    if let Some(text) = decode_json_body(command) {
        return Some(text);
    }
    scan_single_quoted(command)
}

fn scan_double_quoted(command: &str) -> Option<String> {
    let idx = command.find("\"content\"")?;
    let rest = command[idx + "\"content\"".len()..].trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    let rest = rest.strip_prefix('"')?;
    read_escaped_until_quote(rest)
}

/// Read up to an unescaped `"`, resolving `\"`, `\\`, `\n`, `\t`.
fn read_escaped_until_quote(s: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            other => out.push(other),
        }
    }
    None
}

/// Find the JSON body between the outermost braces and decode it, retrying
/// with `\"` → `"` when the body was written escape-quoted.
fn decode_json_body(command: &str) -> Option<String> {
    let start = command.find('{')?;
    let end = command.rfind('}')?;
    if end <= start {
        return None;
    }
    let body = &command[start..=end];

    for candidate in [body.to_owned(), body.replace("\\\"", "\"")] {
        if let Ok(value) = serde_json::from_str::<Value>(&candidate)
            && let Some(content) = value.get("content").and_then(Value::as_str)
        {
            return Some(content.to_owned());
        }
    }
    None
}

fn scan_single_quoted(command: &str) -> Option<String> {
    let idx = command.find("'content'")?;
    let rest = command[idx + "'content'".len()..].trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    let rest = rest.strip_prefix('\'')?;
    rest.find('\'').map(|end| rest[..end].to_owned())
}

/// Channel id from a `check_messages` invocation (trailing path segment).
pub fn extract_channel_id(command: &str) -> Option<String> {
    let idx = command.find("check_messages/")?;
    let rest = &command[idx + "check_messages/".len()..];
    let id: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if id.is_empty() { None } else { Some(id) }
}

// ─── Event → transition mapping ───────────────────────────────────

/// The transition request a classified event implies, if any.
///
/// Tool results never transition directly — they are correlated with the
/// tool use that produced them by the orchestrator. Unknown events are
/// ignored entirely.
pub fn transition_for(event: &ClassifiedEvent) -> Option<(ActivityState, StateData)> {
    match event.kind {
        EventKind::System => Some((ActivityState::Waking, StateData::None)),
        EventKind::Result => Some((ActivityState::Done, StateData::None)),
        EventKind::Thinking => Some((ActivityState::Thinking, StateData::None)),
        EventKind::ToolUse => {
            let input = event.content.as_ref();
            let str_field = |key: &str| -> String {
                input
                    .and_then(|v| v.get(key))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_owned()
            };
            match event.action {
                Some(ToolAction::CheckMessages) => {
                    Some((ActivityState::CheckMessages, StateData::None))
                }
                Some(ToolAction::SendMessage) => Some((
                    ActivityState::SendMessage,
                    StateData::Message {
                        text: event.message_content.clone().unwrap_or_default(),
                    },
                )),
                Some(ToolAction::Shell) => Some((
                    ActivityState::Terminal,
                    StateData::Command {
                        command: str_field("command"),
                    },
                )),
                Some(ToolAction::Edit) => Some((
                    ActivityState::Editing,
                    StateData::Diff {
                        path: str_field("file_path"),
                        old_text: str_field("old_string"),
                        new_text: if input.is_some_and(|v| v.get("new_string").is_some()) {
                            str_field("new_string")
                        } else {
                            // Write has no old/new pair, just the full body.
                            str_field("content")
                        },
                    },
                )),
                Some(ToolAction::ReadFile) => Some((
                    ActivityState::ReadFile,
                    StateData::File {
                        path: str_field("file_path"),
                    },
                )),
                Some(ToolAction::ReadImage) => Some((
                    ActivityState::ReadImage,
                    StateData::File {
                        path: str_field("file_path"),
                    },
                )),
                Some(ToolAction::Other) | None => Some((ActivityState::Thinking, StateData::None)),
            }
        }
        EventKind::ToolResult | EventKind::Unknown => None,
    }
}

// ─── Tests ────────────────────────────────────────────────────────
