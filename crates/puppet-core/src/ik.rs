//! Closed-form two-bone inverse kinematics.
//!
//! Given the shoulder's world position, a wrist target, a pole vector and the
//! two bone lengths, [`solve`] returns local rotations for the shoulder and
//! elbow joints. The solve is analytic (law of cosines + bend-plane basis):
//! no iteration, no convergence concerns. Unreachable targets are clamped to
//! the reachable annulus, never rejected.
//!
//! The shoulder's world position moves every frame with the parent rig
//! (breathing, idle sway), so callers re-solve every logic tick; nothing here
//! is cached.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// Margin kept inside the reachable annulus so the elbow never fully locks.
pub const REACH_EPS: f32 = 1e-3;

/// Below this squared length a direction is considered degenerate.
const DEGENERATE_SQ: f32 = 1e-8;

// ─── Vec3 ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };
    pub const UP: Self = Self { x: 0.0, y: 1.0, z: 0.0 };
    pub const DOWN: Self = Self { x: 0.0, y: -1.0, z: 0.0 };
    pub const RIGHT: Self = Self { x: 1.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length_sq(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Unit vector, or `fallback` when the input is degenerate.
    pub fn normalize_or(self, fallback: Self) -> Self {
        let len_sq = self.length_sq();
        if len_sq < DEGENERATE_SQ {
            return fallback;
        }
        self * (1.0 / len_sq.sqrt())
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    /// Component of `self` perpendicular to the unit vector `dir`.
    pub fn reject_from(self, dir: Self) -> Self {
        self - dir * self.dot(dir)
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ─── Quat ─────────────────────────────────────────────────────────

/// Unit quaternion. `w` is the scalar part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let axis = axis.normalize_or(Vec3::UP);
        let half = angle * 0.5;
        let s = half.sin();
        Self {
            x: axis.x * s,
            y: axis.y * s,
            z: axis.z * s,
            w: half.cos(),
        }
    }

    /// Shortest rotation mapping unit vector `from` onto unit vector `to`.
    pub fn from_rotation_arc(from: Vec3, to: Vec3) -> Self {
        let d = from.dot(to);
        if d > 1.0 - 1e-6 {
            return Self::IDENTITY;
        }
        if d < -1.0 + 1e-6 {
            // Antiparallel: 180 degrees about any perpendicular axis.
            let axis = from
                .cross(Vec3::UP)
                .normalize_or(from.cross(Vec3::RIGHT).normalize_or(Vec3::UP));
            return Self::from_axis_angle(axis, std::f32::consts::PI);
        }
        let axis = from.cross(to);
        Self {
            x: axis.x,
            y: axis.y,
            z: axis.z,
            w: 1.0 + d,
        }
        .normalize()
    }

    pub fn normalize(self) -> Self {
        let len =
            (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if len < 1e-10 {
            return Self::IDENTITY;
        }
        let inv = 1.0 / len;
        Self {
            x: self.x * inv,
            y: self.y * inv,
            z: self.z * inv,
            w: self.w * inv,
        }
    }

    /// Inverse of a unit quaternion.
    pub fn conjugate(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
            w: self.w,
        }
    }

    /// Hamilton product: `self.mul(rhs)` rotates by `rhs` first, then `self`.
    pub fn mul(self, rhs: Self) -> Self {
        Self {
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        }
    }

    pub fn rotate(self, v: Vec3) -> Vec3 {
        let q = Vec3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }
}

// ─── Two-bone solve ───────────────────────────────────────────────

/// Upper-arm and forearm lengths of one two-bone chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmBones {
    pub upper_len: f32,
    pub forearm_len: f32,
}

impl ArmBones {
    pub fn min_reach(self) -> f32 {
        (self.upper_len - self.forearm_len).abs() + REACH_EPS
    }

    pub fn max_reach(self) -> f32 {
        self.upper_len + self.forearm_len - REACH_EPS
    }
}

/// Per-frame joint context sampled from the rig before the solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkFrame {
    pub shoulder_world: Vec3,
    /// World rotation of the shoulder joint's parent (chest/clavicle).
    pub parent_world_rot: Quat,
    /// Bone rest direction in each joint's local space (typically -Y).
    pub rest_dir: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkSolution {
    pub shoulder_local: Quat,
    pub elbow_local: Quat,
    pub elbow_world: Vec3,
    /// The target actually reached after reachability clamping.
    pub wrist_world: Vec3,
}

/// Solve the two-bone chain for `target`, bending toward `pole`.
pub fn solve(frame: &IkFrame, bones: ArmBones, target: Vec3, pole: Vec3) -> IkSolution {
    let to_target = target - frame.shoulder_world;

    // Direction to the target; when the target sits on the shoulder the
    // direction is undefined, so fall back to the arm's current rest ray.
    let dir = to_target.normalize_or(frame.parent_world_rot.rotate(frame.rest_dir));

    // 1. Clamp the distance into the reachable annulus.
    let dist = to_target
        .length()
        .clamp(bones.min_reach(), bones.max_reach());
    let wrist_world = frame.shoulder_world + dir * dist;

    // 2. Interior angle at the shoulder, law of cosines over
    //    (upper, forearm, dist).
    let u = bones.upper_len;
    let f = bones.forearm_len;
    let cos_shoulder = ((u * u + dist * dist - f * f) / (2.0 * u * dist)).clamp(-1.0, 1.0);
    let shoulder_angle = cos_shoulder.acos();

    // 3. Bend-plane basis from the pole projected perpendicular to dir.
    //    Degenerate pole (parallel to dir): substitute world-up, or
    //    world-right when the target direction is itself vertical.
    let mut pole_dir = pole.reject_from(dir);
    if pole_dir.length_sq() < DEGENERATE_SQ {
        pole_dir = Vec3::UP.reject_from(dir);
    }
    if pole_dir.length_sq() < DEGENERATE_SQ {
        pole_dir = Vec3::RIGHT.reject_from(dir);
    }
    let pole_dir = pole_dir.normalize_or(Vec3::UP);
    let bend_axis = dir.cross(pole_dir).normalize_or(Vec3::UP);

    // 4. Elbow: rotate the target ray toward the pole side by the shoulder
    //    angle about the bend-plane normal.
    let elbow_dir = Quat::from_axis_angle(bend_axis, shoulder_angle).rotate(dir);
    let elbow_world = frame.shoulder_world + elbow_dir * u;
    let fore_dir = (wrist_world - elbow_world).normalize_or(dir);

    // 5. World directions into each joint's local space, dividing out the
    //    parent world rotation, then rest-direction → bone-direction arcs.
    let inv_parent = frame.parent_world_rot.conjugate();
    let shoulder_local = Quat::from_rotation_arc(frame.rest_dir, inv_parent.rotate(elbow_dir));
    let shoulder_world_rot = frame.parent_world_rot.mul(shoulder_local);
    let elbow_local =
        Quat::from_rotation_arc(frame.rest_dir, shoulder_world_rot.conjugate().rotate(fore_dir));

    IkSolution {
        shoulder_local,
        elbow_local,
        elbow_world,
        wrist_world,
    }
}

// ─── Tests ────────────────────────────────────────────────────────
