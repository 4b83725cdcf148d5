//! Composition root: wires the classifier, state machine, chat manager,
//! typing controller and choreographer together behind two entry points —
//! [`Orchestrator::process_event`] for each raw record and
//! [`Orchestrator::tick`] once per logic frame.
//!
//! All animation-driver arbitration happens here through the single
//! [`TypingMode`] flag: chat typing, the idle busy-hands driver and
//! choreographed bursts each check-then-set the mode within one tick, so two
//! drivers never fight over the same arm. There is no hidden global state;
//! the orchestrator owns everything and collaborators are reached through
//! the sink traits below.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::chat::{ChatEvent, ChatManager, parse_incoming_messages};
use crate::choreo::{ChoreoEffect, Choreographer, mouse_script};
use crate::classify::{classify, extract_channel_id, transition_for};
use crate::ik::{self, ArmBones, IkFrame, IkSolution, Vec3};
use crate::machine::{ActivityMachine, MachineEffect};
use crate::types::{
    ActivityState, ClassifiedEvent, EventKind, Hand, StateData, ToolAction, TypingMode,
};
use crate::typing::{KeyboardMap, TypingController};

/// Channel used when no check_messages invocation named one yet.
pub const DEFAULT_CHANNEL: &str = "general";

/// Busy-hands queue cap; keeps filler keystrokes from piling up faster than
/// the hands can travel.
const BUSY_QUEUE_CAP: usize = 3;

// ─── Sink traits ──────────────────────────────────────────────────

/// The rig boundary. Read methods sample per-frame joint context for the IK
/// solve; write methods apply results and visual key depressions.
pub trait RigSink {
    fn shoulder_world(&self, hand: Hand) -> Vec3;
    fn parent_world_rot(&self, hand: Hand) -> ik::Quat;
    fn bones(&self, hand: Hand) -> ArmBones;
    fn pole(&self, hand: Hand) -> Vec3;
    fn rest_dir(&self, hand: Hand) -> Vec3;
    /// Current position of the shared desk prop (pointing device).
    fn prop_position(&self) -> Vec3;

    fn apply_arm(&mut self, hand: Hand, solution: &IkSolution);
    /// Trigger the rig's own key-depress visual, independent of IK.
    fn press_key(&mut self, ch: char);
    fn move_prop(&mut self, to: Vec3);
}

/// Monitor overlay; purely a sink, no return values are consumed.
pub trait OverlaySink {
    fn show_diff(&mut self, path: &str, old_text: &str, new_text: &str);
    fn show_file(&mut self, path: &str);
    fn show_terminal(&mut self, command: &str);
    fn clear_overlay(&mut self);
    fn set_messages(&mut self, messages: &[crate::types::ChatMessage]);
    fn start_typing(&mut self);
    fn type_char(&mut self, ch: char);
    fn finish_typing(&mut self);
}

pub trait CameraSink {
    /// Animate to preset `index`; no further contract.
    fn animate_to(&mut self, index: usize);
}

/// Everything the orchestrator talks to, borrowed for one call.
pub struct Sinks<'a> {
    pub rig: &'a mut dyn RigSink,
    pub overlay: &'a mut dyn OverlaySink,
    pub camera: &'a mut dyn CameraSink,
    pub keyboard: &'a dyn KeyboardMap,
}

/// Camera preset for each activity state.
pub fn camera_preset(state: ActivityState) -> usize {
    match state {
        ActivityState::Idle | ActivityState::Done => 0,
        ActivityState::Waking | ActivityState::Thinking => 1,
        ActivityState::CheckMessages | ActivityState::SendMessage => 2,
        ActivityState::Terminal
        | ActivityState::Editing
        | ActivityState::ReadFile
        | ActivityState::ReadImage => 3,
    }
}

// ─── Correlation records ──────────────────────────────────────────

#[derive(Debug, Clone)]
struct PendingSend {
    tool_id: Option<String>,
    text: String,
}

#[derive(Debug, Clone)]
struct PendingCheck {
    tool_id: Option<String>,
    channel_id: Option<String>,
}

fn ids_match(pending: &Option<String>, result: &Option<String>) -> bool {
    match (pending, result) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

// ─── Busy-hands driver ────────────────────────────────────────────

/// Types filler characters while a working state is on screen and nothing
/// else owns the arms. Deterministic LCG; no message is ever committed.
#[derive(Debug)]
struct BusyTyper {
    cooldown: f32,
    lcg: u64,
}

const BUSY_ALPHABET: &[u8] = b"asdfjkl;qweruiopghtynmcv  ";

impl BusyTyper {
    fn new() -> Self {
        Self {
            cooldown: 0.0,
            lcg: 0x2545_f491_4f6c_dd1d,
        }
    }

    fn next_u32(&mut self) -> u32 {
        self.lcg = self
            .lcg
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.lcg >> 33) as u32
    }

    fn next_char(&mut self) -> char {
        let idx = self.next_u32() as usize % BUSY_ALPHABET.len();
        BUSY_ALPHABET[idx] as char
    }

    fn next_interval(&mut self) -> f32 {
        0.12 + (self.next_u32() % 100) as f32 * 0.002
    }
}

// ─── Orchestrator ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct Orchestrator {
    machine: ActivityMachine,
    chat: ChatManager,
    typing: TypingController,
    choreo: Choreographer,
    mode: TypingMode,
    busy: BusyTyper,
    pending_send: Option<PendingSend>,
    pending_check: Option<PendingCheck>,
    right_rest: Vec3,
}

impl Orchestrator {
    pub fn new(left_rest: Vec3, right_rest: Vec3) -> Self {
        Self {
            machine: ActivityMachine::new(),
            chat: ChatManager::new(),
            typing: TypingController::new(left_rest, right_rest),
            choreo: Choreographer::new(),
            mode: TypingMode::None,
            busy: BusyTyper::new(),
            pending_send: None,
            pending_check: None,
            right_rest,
        }
    }

    pub fn state(&self) -> ActivityState {
        self.machine.current()
    }

    pub fn typing_mode(&self) -> TypingMode {
        self.mode
    }

    pub fn chat(&self) -> &ChatManager {
        &self.chat
    }

    pub fn typing(&self) -> &TypingController {
        &self.typing
    }

    /// Sole entry point for raw activity records, in delivery order.
    pub fn process_event(&mut self, raw: &Value, now: DateTime<Utc>, sinks: &mut Sinks<'_>) {
        let event = classify(raw);

        if event.kind == EventKind::ToolUse {
            self.note_tool_use(&event);
        }
        if event.kind == EventKind::ToolResult {
            self.handle_tool_result(&event, now, sinks);
        }
        if let Some((to, data)) = transition_for(&event) {
            let effects = self.machine.transition(to, data, self.chat.session_active());
            self.dispatch_machine(effects, sinks);
        }
    }

    /// Advance one logic frame. Render-side consumers read poses afterwards;
    /// they never mutate.
    pub fn tick(&mut self, dt: f32, now: DateTime<Utc>, sinks: &mut Sinks<'_>) {
        let effects = self.machine.tick(dt, self.chat.session_active());
        self.dispatch_machine(effects, sinks);

        let chat_events = self.chat.tick(dt, now);
        for event in chat_events {
            self.on_chat_event(event, sinks);
        }

        let choreo_effects = self.choreo.tick(dt, &mut self.mode);
        self.apply_choreo(choreo_effects, sinks);

        self.busy_tick(dt, sinks.keyboard);

        for press in self.typing.tick(dt) {
            sinks.rig.press_key(press.ch);
        }

        // The shoulder moves with the parent rig every frame; re-solve both
        // arms unconditionally.
        for hand in Hand::ALL {
            let frame = IkFrame {
                shoulder_world: sinks.rig.shoulder_world(hand),
                parent_world_rot: sinks.rig.parent_world_rot(hand),
                rest_dir: sinks.rig.rest_dir(hand),
            };
            let solution = ik::solve(
                &frame,
                sinks.rig.bones(hand),
                self.typing.hand_position(hand),
                sinks.rig.pole(hand),
            );
            sinks.rig.apply_arm(hand, &solution);
        }
    }

    // ── Correlation ────────────────────────────────────────────────

    fn note_tool_use(&mut self, event: &ClassifiedEvent) {
        match event.action {
            Some(ToolAction::SendMessage) => {
                if let Some(text) = event.message_content.clone()
                    && !text.is_empty()
                {
                    self.pending_send = Some(PendingSend {
                        tool_id: event.tool_id.clone(),
                        text,
                    });
                }
            }
            Some(ToolAction::CheckMessages) => {
                let channel_id = event
                    .content
                    .as_ref()
                    .and_then(|v| v.get("command"))
                    .and_then(Value::as_str)
                    .and_then(extract_channel_id);
                self.pending_check = Some(PendingCheck {
                    tool_id: event.tool_id.clone(),
                    channel_id,
                });
            }
            _ => {}
        }
    }

    fn handle_tool_result(
        &mut self,
        event: &ClassifiedEvent,
        now: DateTime<Utc>,
        sinks: &mut Sinks<'_>,
    ) {
        if let Some(pending) = self.pending_send.take() {
            if ids_match(&pending.tool_id, &event.tool_id) {
                // An error result means the message never went out; type
                // nothing.
                if !event.is_error {
                    self.begin_typing(&pending.text, sinks);
                }
            } else {
                self.pending_send = Some(pending);
            }
        }

        if let Some(pending) = self.pending_check.take() {
            if ids_match(&pending.tool_id, &event.tool_id) {
                if !event.is_error
                    && let Some(content) = &event.content
                {
                    let incoming = parse_incoming_messages(content, now);
                    if !incoming.is_empty() {
                        let channel = pending
                            .channel_id
                            .or_else(|| self.chat.active_channel().map(str::to_owned))
                            .unwrap_or_else(|| DEFAULT_CHANNEL.to_owned());
                        self.chat.set_active_channel(&channel);
                        self.chat.receive_messages(&channel, incoming);
                        sinks.overlay.set_messages(&self.chat.active_messages());
                    }
                }
            } else {
                self.pending_check = Some(pending);
            }
        }
    }

    // ── Typing session arbitration ─────────────────────────────────

    fn begin_typing(&mut self, text: &str, sinks: &mut Sinks<'_>) {
        if self.chat.session_active() {
            return;
        }
        match self.mode {
            TypingMode::Message => return,
            TypingMode::Burst => {
                // Message typing preempts an interaction burst.
                let effects = self.choreo.cancel(&mut self.mode);
                self.apply_choreo(effects, sinks);
            }
            TypingMode::Random => {
                self.typing.clear_queue();
                self.mode = TypingMode::None;
            }
            TypingMode::None => {}
        }
        if self.chat.type_message(text).is_some() {
            self.mode = TypingMode::Message;
            sinks.overlay.start_typing();
        }
    }

    fn on_chat_event(&mut self, event: ChatEvent, sinks: &mut Sinks<'_>) {
        match event {
            ChatEvent::SessionStarted => {}
            ChatEvent::CharTyped(ch) => {
                self.typing.enqueue(ch, sinks.keyboard);
                sinks.overlay.type_char(ch);
            }
            ChatEvent::SessionFinished { committed } => {
                sinks.overlay.finish_typing();
                if committed.is_some() {
                    sinks.overlay.set_messages(&self.chat.active_messages());
                } else {
                    // Aborted: whatever was queued must never land.
                    self.typing.clear_queue();
                }
                if self.mode == TypingMode::Message {
                    self.mode = TypingMode::None;
                }
            }
        }
    }

    // ── Effect dispatch ────────────────────────────────────────────

    fn dispatch_machine(&mut self, effects: Vec<MachineEffect>, sinks: &mut Sinks<'_>) {
        for effect in effects {
            match effect {
                MachineEffect::RushTyping => self.chat.rush_typing(),
                MachineEffect::AbortTyping => {
                    if let Some(event) = self.chat.abort_typing() {
                        self.on_chat_event(event, sinks);
                    }
                }
                MachineEffect::ClearOverlay => sinks.overlay.clear_overlay(),
                MachineEffect::EnterState { state, data } => {
                    self.enter_state(state, data, sinks);
                }
            }
        }
    }

    fn enter_state(&mut self, state: ActivityState, data: StateData, sinks: &mut Sinks<'_>) {
        sinks.camera.animate_to(camera_preset(state));
        match (state, data) {
            (ActivityState::Terminal, StateData::Command { command }) => {
                sinks.overlay.show_terminal(&command);
            }
            (
                ActivityState::Editing,
                StateData::Diff {
                    path,
                    old_text,
                    new_text,
                },
            ) => {
                sinks.overlay.show_diff(&path, &old_text, &new_text);
            }
            (ActivityState::ReadFile | ActivityState::ReadImage, StateData::File { path }) => {
                sinks.overlay.show_file(&path);
            }
            (ActivityState::CheckMessages, _) => {
                // Reading chat: reach for the pointing device to scroll.
                let script = mouse_script(sinks.rig.prop_position(), self.right_rest);
                let effects = self.choreo.try_start(Hand::Right, script, &mut self.mode);
                self.apply_choreo(effects, sinks);
            }
            _ => {}
        }
    }

    fn apply_choreo(&mut self, effects: Vec<ChoreoEffect>, sinks: &mut Sinks<'_>) {
        for effect in effects {
            match effect {
                ChoreoEffect::LockHand(hand) => self.typing.lock(hand),
                ChoreoEffect::UnlockHand(hand) => self.typing.unlock(hand),
                ChoreoEffect::SetArmGoal { hand, target } => {
                    self.typing.set_goal(hand, target);
                }
                ChoreoEffect::MoveObject { to } => sinks.rig.move_prop(to),
                ChoreoEffect::PressKey { ch } => sinks.rig.press_key(ch),
                ChoreoEffect::Finished => {}
            }
        }
    }

    // ── Busy hands ─────────────────────────────────────────────────

    fn busy_tick(&mut self, dt: f32, keyboard: &dyn KeyboardMap) {
        let working = self.machine.current().is_working();
        match self.mode {
            TypingMode::None if working => {
                self.mode = TypingMode::Random;
                self.busy.cooldown = 0.0;
            }
            TypingMode::Random if !working => {
                self.mode = TypingMode::None;
                self.typing.clear_queue();
                return;
            }
            TypingMode::Random => {}
            _ => return,
        }

        self.busy.cooldown -= dt;
        if self.busy.cooldown <= 0.0 {
            let backlog =
                self.typing.queued_len(Hand::Left) + self.typing.queued_len(Hand::Right);
            if backlog < BUSY_QUEUE_CAP {
                let ch = self.busy.next_char();
                self.typing.enqueue(ch, keyboard);
            }
            self.busy.cooldown = self.busy.next_interval();
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────
