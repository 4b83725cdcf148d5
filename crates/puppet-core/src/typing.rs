//! Typing controller: turns queued characters into continuous arm motion.
//!
//! Each hand owns a FIFO keystroke queue and a goal position. Per logic tick
//! the hand linearly interpolates toward its goal at a fixed speed; when no
//! keypress is active and the queue is non-empty, the next character starts a
//! hover → press → lift cycle. Phase advancement is distance-threshold based,
//! not wall clock, so a keystroke always completes regardless of frame-rate
//! variance. The press callback fires exactly once per keystroke, at press
//! arrival — that is the single moment a keystroke becomes externally
//! visible.
//!
//! A locked hand keeps interpolating toward whatever goal its owner sets,
//! but its queue stalls as a whole: queued keystrokes never execute out of
//! order, only late. A hand that is never unlocked stalls its queue forever;
//! callers are responsible for eventually unlocking.

use std::collections::VecDeque;

use crate::ik::Vec3;
use crate::types::{Hand, KeyPhase};

/// Hand travel speed toward its goal, metres per second.
pub const HAND_SPEED: f32 = 2.4;

/// Arrival threshold for phase advancement, metres.
pub const ARRIVE_EPS: f32 = 0.012;

/// Hover height above a key.
pub const HOVER_OFFSET: Vec3 = Vec3::new(0.0, 0.05, 0.0);

/// Press depth: just above the keycap so the fingertip meets it.
pub const PRESS_OFFSET: Vec3 = Vec3::new(0.0, 0.005, 0.0);

// ─── Keyboard lookup ──────────────────────────────────────────────

/// World-space slot for one key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeySlot {
    pub position: Vec3,
    pub hand: Hand,
}

/// Rig-side keyboard: resolves characters to key slots.
pub trait KeyboardMap {
    /// Slot for `ch`, or `None` when the layout has no such key.
    fn key(&self, ch: char) -> Option<KeySlot>;

    /// Slot used for characters without a key of their own (the space bar).
    /// Falling back keeps hand motion continuous on encoding surprises
    /// instead of silently dropping the keystroke.
    fn fallback(&self) -> KeySlot;

    fn slot_or_fallback(&self, ch: char) -> KeySlot {
        self.key(ch).unwrap_or_else(|| self.fallback())
    }
}

// ─── Controller ───────────────────────────────────────────────────

/// Emitted when a keystroke reaches its press point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPress {
    pub ch: char,
    pub hand: Hand,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct QueuedKey {
    ch: char,
    key_pos: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveKey {
    ch: char,
    key_pos: Vec3,
    phase: KeyPhase,
}

#[derive(Debug)]
struct HandState {
    current: Vec3,
    goal: Vec3,
    rest: Vec3,
    locked: bool,
    active: Option<ActiveKey>,
    queue: VecDeque<QueuedKey>,
}

impl HandState {
    fn new(rest: Vec3) -> Self {
        Self {
            current: rest,
            goal: rest,
            rest,
            locked: false,
            active: None,
            queue: VecDeque::new(),
        }
    }
}

#[derive(Debug)]
pub struct TypingController {
    left: HandState,
    right: HandState,
    speed: f32,
}

impl TypingController {
    pub fn new(left_rest: Vec3, right_rest: Vec3) -> Self {
        Self {
            left: HandState::new(left_rest),
            right: HandState::new(right_rest),
            speed: HAND_SPEED,
        }
    }

    fn hand(&self, hand: Hand) -> &HandState {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    fn hand_mut(&mut self, hand: Hand) -> &mut HandState {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }

    /// Queue one character. The hand split comes from the key's world
    /// position (X sign) via the layout; unknown characters land on the
    /// fallback key.
    pub fn enqueue(&mut self, ch: char, layout: &dyn KeyboardMap) {
        let slot = layout.slot_or_fallback(ch);
        self.hand_mut(slot.hand).queue.push_back(QueuedKey {
            ch,
            key_pos: slot.position,
        });
    }

    /// Claim a hand for an external driver (mouse interaction). The queue
    /// stalls; interpolation continues toward externally-set goals.
    pub fn lock(&mut self, hand: Hand) {
        self.hand_mut(hand).locked = true;
    }

    pub fn unlock(&mut self, hand: Hand) {
        self.hand_mut(hand).locked = false;
    }

    pub fn is_locked(&self, hand: Hand) -> bool {
        self.hand(hand).locked
    }

    /// Discard every pending and in-flight keystroke without firing any
    /// press callback. Safe at any time; idempotent.
    pub fn clear_queue(&mut self) {
        for hand in [&mut self.left, &mut self.right] {
            hand.queue.clear();
            hand.active = None;
        }
    }

    /// Externally steer a hand (choreography). Meaningful for locked hands;
    /// an unlocked idle hand will drift back to rest.
    pub fn set_goal(&mut self, hand: Hand, goal: Vec3) {
        self.hand_mut(hand).goal = goal;
    }

    pub fn set_rest(&mut self, hand: Hand, rest: Vec3) {
        self.hand_mut(hand).rest = rest;
    }

    pub fn hand_position(&self, hand: Hand) -> Vec3 {
        self.hand(hand).current
    }

    pub fn hand_goal(&self, hand: Hand) -> Vec3 {
        self.hand(hand).goal
    }

    pub fn queued_len(&self, hand: Hand) -> usize {
        let h = self.hand(hand);
        h.queue.len() + usize::from(h.active.is_some())
    }

    pub fn is_idle(&self) -> bool {
        [&self.left, &self.right]
            .iter()
            .all(|h| h.active.is_none() && h.queue.is_empty())
    }

    /// Advance both hands by one logic tick. Returned presses are in
    /// per-hand enqueue order, each exactly once.
    pub fn tick(&mut self, dt: f32) -> Vec<KeyPress> {
        let mut presses = Vec::new();
        let speed = self.speed;
        for hand in Hand::ALL {
            tick_hand(self.hand_mut(hand), hand, dt, speed, &mut presses);
        }
        presses
    }
}

fn tick_hand(h: &mut HandState, hand: Hand, dt: f32, speed: f32, presses: &mut Vec<KeyPress>) {
    // (a) Interpolate toward the goal, clamping overshoot.
    let delta = h.goal - h.current;
    let dist = delta.length();
    let step = speed * dt;
    h.current = if dist <= step {
        h.goal
    } else {
        h.current + delta * (step / dist)
    };

    // (b) Start the next keystroke when free. Locked hands stall here.
    if h.active.is_none()
        && !h.locked
        && let Some(next) = h.queue.pop_front()
    {
        h.active = Some(ActiveKey {
            ch: next.ch,
            key_pos: next.key_pos,
            phase: KeyPhase::Hover,
        });
        h.goal = next.key_pos + HOVER_OFFSET;
    }

    // (c) Phase advancement on arrival.
    if let Some(active) = h.active
        && h.current.distance(h.goal) <= ARRIVE_EPS
    {
        match active.phase {
            KeyPhase::Hover => {
                h.goal = active.key_pos + PRESS_OFFSET;
                h.active = Some(ActiveKey {
                    phase: KeyPhase::Press,
                    ..active
                });
            }
            KeyPhase::Press => {
                presses.push(KeyPress {
                    ch: active.ch,
                    hand,
                });
                h.goal = active.key_pos + HOVER_OFFSET;
                h.active = Some(ActiveKey {
                    phase: KeyPhase::Lift,
                    ..active
                });
            }
            KeyPhase::Lift => {
                h.active = None;
            }
        }
    }

    // Idle hand drifts home.
    if h.active.is_none() && h.queue.is_empty() && !h.locked {
        h.goal = h.rest;
    }
}

// ─── Tests ────────────────────────────────────────────────────────
