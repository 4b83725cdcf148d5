//! Headless sink implementations.
//!
//! `Recording*` doubles capture every call for assertions; `Tracing*` sinks
//! log through `tracing` so the daemon can run without a renderer attached.
//! Both share one fixed humanoid geometry: shoulders at chest height, a
//! slightly longer forearm (hand included), poles pushed down-and-back so
//! elbows bend outward naturally.

use puppet_core::ik::{ArmBones, IkSolution, Quat, Vec3};
use puppet_core::orchestrator::{CameraSink, OverlaySink, RigSink};
use puppet_core::types::{ChatMessage, Hand};
use tracing::debug;

/// Shared humanoid arm geometry for the headless rigs.
#[derive(Debug, Clone, Copy)]
pub struct RigGeometry {
    pub left_shoulder: Vec3,
    pub right_shoulder: Vec3,
    pub bones: ArmBones,
}

impl Default for RigGeometry {
    fn default() -> Self {
        Self {
            left_shoulder: Vec3::new(-0.18, 1.42, 0.0),
            right_shoulder: Vec3::new(0.18, 1.42, 0.0),
            bones: ArmBones {
                upper_len: 0.30,
                forearm_len: 0.42,
            },
        }
    }
}

impl RigGeometry {
    fn shoulder(&self, hand: Hand) -> Vec3 {
        match hand {
            Hand::Left => self.left_shoulder,
            Hand::Right => self.right_shoulder,
        }
    }

    fn pole(&self, hand: Hand) -> Vec3 {
        // Down and behind, mirrored per side, so elbows flare outward.
        match hand {
            Hand::Left => Vec3::new(-0.4, -0.3, -1.0),
            Hand::Right => Vec3::new(0.4, -0.3, -1.0),
        }
    }
}

// ─── Recording doubles ────────────────────────────────────────────

/// Rig double that records applied poses and key presses.
#[derive(Debug)]
pub struct RecordingRig {
    pub geometry: RigGeometry,
    pub presses: Vec<char>,
    pub prop: Vec3,
    pub last_solution: Option<(Hand, IkSolution)>,
    pub arm_applies: usize,
}

impl Default for RecordingRig {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRig {
    pub fn new() -> Self {
        Self {
            geometry: RigGeometry::default(),
            presses: Vec::new(),
            prop: Vec3::new(0.3, 0.74, 0.1),
            last_solution: None,
            arm_applies: 0,
        }
    }
}

impl RigSink for RecordingRig {
    fn shoulder_world(&self, hand: Hand) -> Vec3 {
        self.geometry.shoulder(hand)
    }
    fn parent_world_rot(&self, _hand: Hand) -> Quat {
        Quat::IDENTITY
    }
    fn bones(&self, _hand: Hand) -> ArmBones {
        self.geometry.bones
    }
    fn pole(&self, hand: Hand) -> Vec3 {
        self.geometry.pole(hand)
    }
    fn rest_dir(&self, _hand: Hand) -> Vec3 {
        Vec3::DOWN
    }
    fn prop_position(&self) -> Vec3 {
        self.prop
    }
    fn apply_arm(&mut self, hand: Hand, solution: &IkSolution) {
        self.arm_applies += 1;
        self.last_solution = Some((hand, *solution));
    }
    fn press_key(&mut self, ch: char) {
        self.presses.push(ch);
    }
    fn move_prop(&mut self, to: Vec3) {
        self.prop = to;
    }
}

/// Every overlay call, stringified in arrival order.
#[derive(Debug, Default)]
pub struct RecordingOverlay {
    pub calls: Vec<String>,
}

impl OverlaySink for RecordingOverlay {
    fn show_diff(&mut self, path: &str, _old_text: &str, _new_text: &str) {
        self.calls.push(format!("diff:{path}"));
    }
    fn show_file(&mut self, path: &str) {
        self.calls.push(format!("file:{path}"));
    }
    fn show_terminal(&mut self, command: &str) {
        self.calls.push(format!("terminal:{command}"));
    }
    fn clear_overlay(&mut self) {
        self.calls.push("clear".to_owned());
    }
    fn set_messages(&mut self, messages: &[ChatMessage]) {
        self.calls.push(format!("messages:{}", messages.len()));
    }
    fn start_typing(&mut self) {
        self.calls.push("start_typing".to_owned());
    }
    fn type_char(&mut self, ch: char) {
        self.calls.push(format!("char:{ch}"));
    }
    fn finish_typing(&mut self) {
        self.calls.push("finish_typing".to_owned());
    }
}

#[derive(Debug, Default)]
pub struct RecordingCamera {
    pub presets: Vec<usize>,
}

impl CameraSink for RecordingCamera {
    fn animate_to(&mut self, index: usize) {
        self.presets.push(index);
    }
}

// ─── Tracing sinks ────────────────────────────────────────────────

/// Rig sink that logs what a renderer would consume.
#[derive(Debug)]
pub struct TracingRig {
    geometry: RigGeometry,
    prop: Vec3,
}

impl Default for TracingRig {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingRig {
    pub fn new() -> Self {
        Self {
            geometry: RigGeometry::default(),
            prop: Vec3::new(0.3, 0.74, 0.1),
        }
    }
}

impl RigSink for TracingRig {
    fn shoulder_world(&self, hand: Hand) -> Vec3 {
        self.geometry.shoulder(hand)
    }
    fn parent_world_rot(&self, _hand: Hand) -> Quat {
        Quat::IDENTITY
    }
    fn bones(&self, _hand: Hand) -> ArmBones {
        self.geometry.bones
    }
    fn pole(&self, hand: Hand) -> Vec3 {
        self.geometry.pole(hand)
    }
    fn rest_dir(&self, _hand: Hand) -> Vec3 {
        Vec3::DOWN
    }
    fn prop_position(&self) -> Vec3 {
        self.prop
    }
    fn apply_arm(&mut self, _hand: Hand, _solution: &IkSolution) {
        // Per-tick pose application is too chatty even for debug logs.
    }
    fn press_key(&mut self, ch: char) {
        debug!(key = %ch, "press");
    }
    fn move_prop(&mut self, to: Vec3) {
        debug!(x = to.x, y = to.y, z = to.z, "prop moved");
        self.prop = to;
    }
}

#[derive(Debug, Default)]
pub struct TracingOverlay;

impl OverlaySink for TracingOverlay {
    fn show_diff(&mut self, path: &str, _old_text: &str, _new_text: &str) {
        debug!(path, "overlay: diff");
    }
    fn show_file(&mut self, path: &str) {
        debug!(path, "overlay: file");
    }
    fn show_terminal(&mut self, command: &str) {
        debug!(command, "overlay: terminal");
    }
    fn clear_overlay(&mut self) {
        debug!("overlay: clear");
    }
    fn set_messages(&mut self, messages: &[ChatMessage]) {
        debug!(count = messages.len(), "overlay: messages");
    }
    fn start_typing(&mut self) {
        debug!("overlay: typing started");
    }
    fn type_char(&mut self, _ch: char) {}
    fn finish_typing(&mut self) {
        debug!("overlay: typing finished");
    }
}

#[derive(Debug, Default)]
pub struct TracingCamera;

impl CameraSink for TracingCamera {
    fn animate_to(&mut self, index: usize) {
        debug!(preset = index, "camera");
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_rig_captures_presses_and_prop() {
        let mut rig = RecordingRig::new();
        rig.press_key('a');
        rig.press_key('b');
        rig.move_prop(Vec3::new(0.25, 0.74, 0.05));
        assert_eq!(rig.presses, vec!['a', 'b']);
        assert_eq!(rig.prop_position(), Vec3::new(0.25, 0.74, 0.05));
    }

    #[test]
    fn geometry_is_reachable_from_rest_height() {
        let rig = RecordingRig::new();
        let bones = rig.bones(Hand::Right);
        let shoulder = rig.shoulder_world(Hand::Right);
        // The keyboard plane (~0.74m up, ~0.25m out) must be inside reach.
        let key = Vec3::new(0.05, 0.74, 0.25);
        let d = shoulder.distance(key);
        assert!(d > bones.min_reach() && d < bones.max_reach(), "d={d}");
    }

    #[test]
    fn poles_mirror_across_hands() {
        let rig = RecordingRig::new();
        let l = rig.pole(Hand::Left);
        let r = rig.pole(Hand::Right);
        assert_eq!(l.x, -r.x);
        assert_eq!(l.y, r.y);
        assert_eq!(l.z, r.z);
    }
}
