//! Rig boundary for the puppet core.
//!
//! The 3D scene, meshes and shaders live elsewhere; this crate provides what
//! the animation core needs from that world: a concrete keyboard layout
//! ([`layout::QwertyLayout`]) and headless sink implementations — recording
//! doubles for tests and tracing sinks for running the daemon without a
//! renderer attached.

pub mod layout;
pub mod sinks;

pub use layout::QwertyLayout;
pub use sinks::{RecordingCamera, RecordingOverlay, RecordingRig, TracingCamera, TracingOverlay, TracingRig};
