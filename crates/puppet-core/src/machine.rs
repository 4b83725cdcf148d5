//! Activity state machine.
//!
//! Holds the avatar's current [`ActivityState`] and absorbs transition
//! requests that arrive mid-typing without snapping the animation:
//!
//! - While a typing session is active, transitions (other than
//!   `SendMessage`) are deferred to a FIFO list and the session is told to
//!   **rush** — accelerate, never truncate.
//! - `Waking` is the exception: a new agent session always wins. The pending
//!   list is flushed and in-flight typing is aborted.
//! - Once typing finishes, deferred transitions replay in original order,
//!   each held for a minimum dwell so the viewer can perceive each state.
//! - `Done` auto-falls to `Idle` after a fixed delay unless superseded.
//!
//! All timing is tick-relative (`tick(dt)`), never wall clock, so the
//! machine is deterministic under pause/resume.

use std::collections::VecDeque;

use crate::types::{ActivityState, StateData};

/// Minimum hold before the next deferred transition replays.
pub const REPLAY_DWELL_SECS: f32 = 0.8;

/// Thinking reads slower than a flashed overlay; hold it longer.
pub const REPLAY_DWELL_THINKING_SECS: f32 = 2.0;

/// Delay before `Done` falls back to `Idle`.
pub const DONE_IDLE_DELAY_SECS: f32 = 3.0;

/// Side effects the orchestrator must apply, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MachineEffect {
    /// The machine entered `state`; drive overlay/camera/chat accordingly.
    EnterState {
        state: ActivityState,
        data: StateData,
    },
    /// The previous state's overlay is stale; clear it before `EnterState`.
    ClearOverlay,
    /// Accelerate the active typing session's remaining characters.
    RushTyping,
    /// Cancel the active typing session without committing it.
    AbortTyping,
}

#[derive(Debug)]
pub struct ActivityMachine {
    current: ActivityState,
    pending: VecDeque<(ActivityState, StateData)>,
    /// Time left before the next pending transition may replay.
    replay_cooldown: f32,
    /// Time left on the done→idle fall-back, when armed.
    done_timer: Option<f32>,
}

impl Default for ActivityMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityMachine {
    pub fn new() -> Self {
        Self {
            current: ActivityState::Idle,
            pending: VecDeque::new(),
            replay_cooldown: 0.0,
            done_timer: None,
        }
    }

    pub fn current(&self) -> ActivityState {
        self.current
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Request a transition. `typing_active` is sampled by the caller in the
    /// same tick (cooperative check-then-set; single writer).
    pub fn transition(
        &mut self,
        to: ActivityState,
        data: StateData,
        typing_active: bool,
    ) -> Vec<MachineEffect> {
        // Any request supersedes a scheduled done→idle fall-back.
        self.done_timer = None;

        if to == ActivityState::Waking {
            // New session wins: drop the backlog, kill in-flight typing.
            self.pending.clear();
            self.replay_cooldown = 0.0;
            let mut effects = Vec::new();
            if typing_active {
                effects.push(MachineEffect::AbortTyping);
            }
            effects.extend(self.enter(to, data));
            return effects;
        }

        if typing_active {
            if to != ActivityState::SendMessage {
                self.pending.push_back((to, data));
                return vec![MachineEffect::RushTyping];
            }
            // SendMessage rides through a live session untouched.
            return self.enter(to, data);
        }

        if !self.pending.is_empty() {
            // A replay backlog exists; joining it keeps the observed order.
            self.pending.push_back((to, data));
            return Vec::new();
        }

        self.enter(to, data)
    }

    /// Advance replay and fall-back timers by one logic tick.
    pub fn tick(&mut self, dt: f32, typing_active: bool) -> Vec<MachineEffect> {
        let mut effects = Vec::new();

        if let Some(left) = self.done_timer {
            let left = left - dt;
            if left <= 0.0 {
                self.done_timer = None;
                effects.extend(self.enter(ActivityState::Idle, StateData::None));
            } else {
                self.done_timer = Some(left);
            }
        }

        if !typing_active && !self.pending.is_empty() {
            self.replay_cooldown -= dt;
            if self.replay_cooldown <= 0.0
                && let Some((to, data)) = self.pending.pop_front()
            {
                self.replay_cooldown = replay_dwell(to);
                effects.extend(self.enter(to, data));
            }
        }

        effects
    }

    fn enter(&mut self, to: ActivityState, data: StateData) -> Vec<MachineEffect> {
        let mut effects = Vec::new();
        if self.current.has_overlay() && !to.has_overlay() {
            effects.push(MachineEffect::ClearOverlay);
        }
        self.current = to;
        if to == ActivityState::Done {
            self.done_timer = Some(DONE_IDLE_DELAY_SECS);
        }
        effects.push(MachineEffect::EnterState { state: to, data });
        effects
    }
}

fn replay_dwell(state: ActivityState) -> f32 {
    if state == ActivityState::Thinking {
        REPLAY_DWELL_THINKING_SECS
    } else {
        REPLAY_DWELL_SECS
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn entered(effects: &[MachineEffect]) -> Vec<ActivityState> {
        effects
            .iter()
            .filter_map(|e| match e {
                MachineEffect::EnterState { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Run ticks until `secs` have elapsed, collecting effects.
    fn run_for(machine: &mut ActivityMachine, secs: f32, typing: bool) -> Vec<MachineEffect> {
        let mut effects = Vec::new();
        let steps = (secs / DT).ceil() as usize;
        for _ in 0..steps {
            effects.extend(machine.tick(DT, typing));
        }
        effects
    }

    // ── 1. Plain transitions apply immediately ──────────────────────

    #[test]
    fn transition_applies_when_not_typing() {
        let mut m = ActivityMachine::new();
        let fx = m.transition(ActivityState::Thinking, StateData::None, false);
        assert_eq!(entered(&fx), vec![ActivityState::Thinking]);
        assert_eq!(m.current(), ActivityState::Thinking);
    }

    // ── 2. Typing defers and rushes ─────────────────────────────────

    #[test]
    fn transition_deferred_while_typing() {
        let mut m = ActivityMachine::new();
        let fx = m.transition(ActivityState::Editing, StateData::None, true);
        assert_eq!(fx, vec![MachineEffect::RushTyping]);
        assert_eq!(m.current(), ActivityState::Idle, "state unchanged");
        assert_eq!(m.pending_len(), 1);
    }

    #[test]
    fn send_message_passes_through_while_typing() {
        let mut m = ActivityMachine::new();
        let fx = m.transition(
            ActivityState::SendMessage,
            StateData::Message { text: "x".into() },
            true,
        );
        assert_eq!(entered(&fx), vec![ActivityState::SendMessage]);
        assert_eq!(m.pending_len(), 0);
    }

    #[test]
    fn send_message_skips_an_existing_backlog() {
        let mut m = ActivityMachine::new();
        m.transition(ActivityState::Editing, StateData::None, true);
        let fx = m.transition(ActivityState::SendMessage, StateData::None, true);
        assert_eq!(entered(&fx), vec![ActivityState::SendMessage]);
        assert_eq!(m.pending_len(), 1, "backlog left intact");
    }

    // ── 3. Deferred replay preserves order and dwell ────────────────

    #[test]
    fn deferred_transitions_replay_in_order() {
        let mut m = ActivityMachine::new();
        m.transition(ActivityState::Editing, StateData::None, true);
        m.transition(ActivityState::Terminal, StateData::None, true);
        assert_eq!(m.pending_len(), 2);

        // Typing still active: nothing replays.
        let fx = run_for(&mut m, 1.0, true);
        assert!(entered(&fx).is_empty());

        // Typing done: first replays immediately.
        let fx = m.tick(DT, false);
        assert_eq!(entered(&fx), vec![ActivityState::Editing]);

        // Second held back for the dwell window, then fires.
        let fx = run_for(&mut m, REPLAY_DWELL_SECS - 0.1, false);
        assert!(entered(&fx).is_empty(), "dwell not yet elapsed");
        let fx = run_for(&mut m, 0.2, false);
        assert_eq!(entered(&fx), vec![ActivityState::Terminal]);
        assert_eq!(m.pending_len(), 0);
    }

    #[test]
    fn thinking_replay_holds_longer() {
        let mut m = ActivityMachine::new();
        m.transition(ActivityState::Thinking, StateData::None, true);
        m.transition(ActivityState::Terminal, StateData::None, true);

        let fx = m.tick(DT, false);
        assert_eq!(entered(&fx), vec![ActivityState::Thinking]);

        // The ordinary dwell is not enough after thinking.
        let fx = run_for(&mut m, REPLAY_DWELL_SECS + 0.1, false);
        assert!(entered(&fx).is_empty());
        let fx = run_for(&mut m, REPLAY_DWELL_THINKING_SECS, false);
        assert_eq!(entered(&fx), vec![ActivityState::Terminal]);
    }

    #[test]
    fn transition_during_replay_backlog_joins_queue() {
        let mut m = ActivityMachine::new();
        m.transition(ActivityState::Editing, StateData::None, true);
        m.transition(ActivityState::Terminal, StateData::None, true);

        // Typing finished; first replay fires.
        let fx = m.tick(DT, false);
        assert_eq!(entered(&fx), vec![ActivityState::Editing]);

        // A fresh transition while the backlog drains must not jump ahead.
        let fx = m.transition(ActivityState::ReadFile, StateData::None, false);
        assert!(entered(&fx).is_empty());

        let fx = run_for(&mut m, 2.0 * REPLAY_DWELL_SECS + 0.2, false);
        assert_eq!(
            entered(&fx),
            vec![ActivityState::Terminal, ActivityState::ReadFile]
        );
    }

    // ── 4. Waking overrides everything ──────────────────────────────

    #[test]
    fn waking_flushes_pending_and_aborts_typing() {
        let mut m = ActivityMachine::new();
        m.transition(ActivityState::Editing, StateData::None, true);
        m.transition(ActivityState::Terminal, StateData::None, true);

        let fx = m.transition(ActivityState::Waking, StateData::None, true);
        assert!(fx.contains(&MachineEffect::AbortTyping));
        assert_eq!(entered(&fx), vec![ActivityState::Waking]);
        assert_eq!(m.pending_len(), 0);
        assert_eq!(m.current(), ActivityState::Waking);
    }

    #[test]
    fn waking_without_typing_does_not_abort() {
        let mut m = ActivityMachine::new();
        let fx = m.transition(ActivityState::Waking, StateData::None, false);
        assert!(!fx.contains(&MachineEffect::AbortTyping));
        assert_eq!(entered(&fx), vec![ActivityState::Waking]);
    }

    // ── 5. Overlay clearing ─────────────────────────────────────────

    #[test]
    fn leaving_overlay_state_clears_overlay() {
        let mut m = ActivityMachine::new();
        m.transition(ActivityState::Editing, StateData::None, false);
        let fx = m.transition(ActivityState::Thinking, StateData::None, false);
        assert_eq!(fx[0], MachineEffect::ClearOverlay);
    }

    #[test]
    fn overlay_to_overlay_does_not_clear() {
        let mut m = ActivityMachine::new();
        m.transition(ActivityState::Editing, StateData::None, false);
        let fx = m.transition(ActivityState::Terminal, StateData::None, false);
        assert!(!fx.contains(&MachineEffect::ClearOverlay));

        let fx = m.transition(ActivityState::ReadImage, StateData::None, false);
        assert!(
            !fx.contains(&MachineEffect::ClearOverlay),
            "read_image keeps the overlay alive"
        );
    }

    #[test]
    fn non_overlay_to_non_overlay_never_clears() {
        let mut m = ActivityMachine::new();
        m.transition(ActivityState::Thinking, StateData::None, false);
        let fx = m.transition(ActivityState::CheckMessages, StateData::None, false);
        assert!(!fx.contains(&MachineEffect::ClearOverlay));
    }

    // ── 6. Done → idle fall-back ────────────────────────────────────

    #[test]
    fn done_falls_back_to_idle_after_delay() {
        let mut m = ActivityMachine::new();
        m.transition(ActivityState::Done, StateData::None, false);
        assert_eq!(m.current(), ActivityState::Done);

        let fx = run_for(&mut m, DONE_IDLE_DELAY_SECS - 0.1, false);
        assert!(entered(&fx).is_empty());
        assert_eq!(m.current(), ActivityState::Done);

        let fx = run_for(&mut m, 0.2, false);
        assert_eq!(entered(&fx), vec![ActivityState::Idle]);
    }

    #[test]
    fn done_timer_cancelled_by_new_transition() {
        let mut m = ActivityMachine::new();
        m.transition(ActivityState::Done, StateData::None, false);
        run_for(&mut m, DONE_IDLE_DELAY_SECS * 0.5, false);

        m.transition(ActivityState::Waking, StateData::None, false);
        let fx = run_for(&mut m, DONE_IDLE_DELAY_SECS, false);
        assert!(
            entered(&fx).is_empty(),
            "cancelled timer must not fire idle"
        );
        assert_eq!(m.current(), ActivityState::Waking);
    }

    #[test]
    fn done_timer_cancelled_even_by_deferred_transition() {
        let mut m = ActivityMachine::new();
        m.transition(ActivityState::Done, StateData::None, false);
        m.transition(ActivityState::Editing, StateData::None, true);

        // Timer is dead; only the deferred replay may change state.
        let fx = run_for(&mut m, DONE_IDLE_DELAY_SECS + 0.5, true);
        assert!(entered(&fx).is_empty());
        assert_eq!(m.current(), ActivityState::Done);
    }
}
