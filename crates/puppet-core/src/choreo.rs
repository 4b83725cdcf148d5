//! Scripted arm interactions outside of typing.
//!
//! A choreography is a short, explicitly time-boxed step list (reach the
//! pointing device, nudge it, a couple of incidental keystrokes, release).
//! It is an explicit step-indexed machine advanced by the logic tick, so a
//! paused view resumes deterministically — no timer chains.
//!
//! Mutual exclusion: a script claims [`TypingMode::Burst`] and refuses to
//! start unless the mode is `None`; on completion it returns the mode to
//! `None` and releases the arm lock it took.

use crate::ik::Vec3;
use crate::types::{Hand, TypingMode};

/// One time-boxed step. Durations are logic-tick seconds.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoreoStep {
    /// Send the arm toward `target` and wait out the box.
    MoveArm { target: Vec3, duration: f32 },
    /// Slide the shared prop to `to`, arm following.
    MoveObject { to: Vec3, duration: f32 },
    /// One incidental key tap (visual only, no queue involvement).
    PressKey { ch: char, duration: f32 },
    /// Dwell in place.
    Hold { duration: f32 },
}

impl ChoreoStep {
    fn duration(&self) -> f32 {
        match self {
            Self::MoveArm { duration, .. }
            | Self::MoveObject { duration, .. }
            | Self::PressKey { duration, .. }
            | Self::Hold { duration } => *duration,
        }
    }
}

/// Effects the orchestrator applies, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoreoEffect {
    LockHand(Hand),
    SetArmGoal { hand: Hand, target: Vec3 },
    MoveObject { to: Vec3 },
    PressKey { ch: char },
    UnlockHand(Hand),
    Finished,
}

#[derive(Debug, Default)]
pub struct Choreographer {
    script: Vec<ChoreoStep>,
    hand: Option<Hand>,
    step: usize,
    elapsed: f32,
}

impl Choreographer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.hand.is_some()
    }

    /// Claim the arms and begin `script`. Refuses (empty effect list) when
    /// any driver already owns the arms, a script is already running, or the
    /// script is empty.
    pub fn try_start(
        &mut self,
        hand: Hand,
        script: Vec<ChoreoStep>,
        mode: &mut TypingMode,
    ) -> Vec<ChoreoEffect> {
        if *mode != TypingMode::None || self.is_running() || script.is_empty() {
            return Vec::new();
        }
        *mode = TypingMode::Burst;
        self.script = script;
        self.hand = Some(hand);
        self.step = 0;
        self.elapsed = 0.0;

        let mut effects = vec![ChoreoEffect::LockHand(hand)];
        effects.extend(self.enter_step(hand));
        effects
    }

    /// Drop a script mid-flight (typing preempts a burst). Releases the
    /// lock and the mode; a second cancel is a no-op.
    pub fn cancel(&mut self, mode: &mut TypingMode) -> Vec<ChoreoEffect> {
        let Some(hand) = self.hand.take() else {
            return Vec::new();
        };
        self.script.clear();
        if *mode == TypingMode::Burst {
            *mode = TypingMode::None;
        }
        vec![ChoreoEffect::UnlockHand(hand)]
    }

    /// Advance the current step's time box; emits step-entry effects as
    /// boxes expire and the release/finish pair at the end.
    pub fn tick(&mut self, dt: f32, mode: &mut TypingMode) -> Vec<ChoreoEffect> {
        let Some(hand) = self.hand else {
            return Vec::new();
        };
        let mut effects = Vec::new();
        self.elapsed += dt;

        while let Some(step) = self.script.get(self.step) {
            let duration = step.duration();
            if self.elapsed < duration {
                break;
            }
            self.elapsed -= duration;
            self.step += 1;
            if self.step >= self.script.len() {
                self.hand = None;
                self.script.clear();
                *mode = TypingMode::None;
                effects.push(ChoreoEffect::UnlockHand(hand));
                effects.push(ChoreoEffect::Finished);
                return effects;
            }
            effects.extend(self.enter_step(hand));
        }
        effects
    }

    fn enter_step(&self, hand: Hand) -> Vec<ChoreoEffect> {
        match &self.script[self.step] {
            ChoreoStep::MoveArm { target, .. } => vec![ChoreoEffect::SetArmGoal {
                hand,
                target: *target,
            }],
            ChoreoStep::MoveObject { to, .. } => vec![
                ChoreoEffect::MoveObject { to: *to },
                ChoreoEffect::SetArmGoal { hand, target: *to },
            ],
            ChoreoStep::PressKey { ch, .. } => vec![ChoreoEffect::PressKey { ch: *ch }],
            ChoreoStep::Hold { .. } => Vec::new(),
        }
    }
}

/// Built-in pointing-device script: reach the prop, settle, nudge it, tap
/// two incidental keys, and drift back toward rest before release.
pub fn mouse_script(prop: Vec3, rest: Vec3) -> Vec<ChoreoStep> {
    let nudge = prop + Vec3::new(0.0, 0.0, -0.03);
    vec![
        ChoreoStep::MoveArm {
            target: prop,
            duration: 0.45,
        },
        ChoreoStep::Hold { duration: 0.15 },
        ChoreoStep::MoveObject {
            to: nudge,
            duration: 0.35,
        },
        ChoreoStep::PressKey {
            ch: ' ',
            duration: 0.12,
        },
        ChoreoStep::PressKey {
            ch: ' ',
            duration: 0.12,
        },
        ChoreoStep::MoveArm {
            target: rest,
            duration: 0.4,
        },
    ]
}

// ─── Tests ────────────────────────────────────────────────────────
