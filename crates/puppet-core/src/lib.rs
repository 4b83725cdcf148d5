//! Pure animation logic for the puppet avatar.
//!
//! This crate turns a stream of discrete agent activity events into
//! continuous, physically-plausible arm motion. Everything here is
//! side-effect free: time arrives as tick deltas, wall-clock timestamps are
//! supplied by the caller, and all output to the rig/overlay/camera goes
//! through the sink traits in [`orchestrator`].
//!
//! Pipeline: raw event → [`classify`] → [`machine`] → effects →
//! [`chat`] / [`choreo`] → [`typing`] → [`ik`] → rig.

pub mod chat;
pub mod choreo;
pub mod classify;
pub mod ik;
pub mod machine;
pub mod orchestrator;
pub mod scheduler;
pub mod types;
pub mod typing;
