use super::types::Transform;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// One of the six degrees of freedom of a joint, in constraint-frame axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum D6Axis {
    X = 0,
    Y = 1,
    Z = 2,
    /// Rotation about X.
    Twist = 3,
    /// Rotation about Y.
    Swing1 = 4,
    /// Rotation about Z.
    Swing2 = 5,
}

impl D6Axis {
    pub const ALL: [D6Axis; 6] = [
        D6Axis::X,
        D6Axis::Y,
        D6Axis::Z,
        D6Axis::Twist,
        D6Axis::Swing1,
        D6Axis::Swing2,
    ];

    pub const fn bit(self) -> u8 {
        1 << self as u8
    }
}

pub const LINEAR_MASK: u8 = D6Axis::X.bit() | D6Axis::Y.bit() | D6Axis::Z.bit();
pub const ANGULAR_MASK: u8 = D6Axis::Twist.bit() | D6Axis::Swing1.bit() | D6Axis::Swing2.bit();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum D6Motion {
    Locked,
    Limited,
    #[default]
    Free,
}

/// Drive slots. `Slerp` replaces `Swing` and `Twist` when no angular axis is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum D6Drive {
    X = 0,
    Y = 1,
    Z = 2,
    Swing = 3,
    Twist = 4,
    Slerp = 5,
}

impl D6Drive {
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Spring parameters shared by limits. A positive stiffness makes the limit soft.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LimitSpring {
    pub stiffness: f32,
    pub damping: f32,
}

impl LimitSpring {
    pub fn is_soft(&self) -> bool {
        self.stiffness > 0.0
    }
}

/// Spherical limit on the anchor separation over the limited linear axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearLimit {
    pub value: f32,
    pub contact_distance: f32,
    pub spring: LimitSpring,
}

impl Default for LinearLimit {
    fn default() -> Self {
        Self {
            value: f32::MAX,
            contact_distance: 0.01,
            spring: LimitSpring::default(),
        }
    }
}

/// Twist range in radians, each bound within `(-2π, 2π)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngularLimitPair {
    pub lower: f32,
    pub upper: f32,
    pub contact_distance: f32,
    pub spring: LimitSpring,
}

impl Default for AngularLimitPair {
    fn default() -> Self {
        Self {
            lower: -std::f32::consts::FRAC_PI_2,
            upper: std::f32::consts::FRAC_PI_2,
            contact_distance: 0.05,
            spring: LimitSpring::default(),
        }
    }
}

/// Elliptical swing cone half-angles in radians, each within `(0, π)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConeLimit {
    pub y_angle: f32,
    pub z_angle: f32,
    pub contact_distance: f32,
    pub spring: LimitSpring,
}

impl Default for ConeLimit {
    fn default() -> Self {
        Self {
            y_angle: std::f32::consts::FRAC_PI_2,
            z_angle: std::f32::consts::FRAC_PI_2,
            contact_distance: 0.05,
            spring: LimitSpring::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointDrive {
    pub stiffness: f32,
    pub damping: f32,
    pub force_limit: f32,
    /// Spring acts on acceleration (mass independent) instead of force.
    pub is_acceleration: bool,
}

impl Default for JointDrive {
    fn default() -> Self {
        Self {
            stiffness: 0.0,
            damping: 0.0,
            force_limit: f32::MAX,
            is_acceleration: true,
        }
    }
}

impl JointDrive {
    pub fn new(stiffness: f32, damping: f32) -> Self {
        Self {
            stiffness,
            damping,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.stiffness > 0.0 || self.damping > 0.0
    }
}

/// Caller-supplied six-axis joint description.
///
/// `frame_a` is posed in the primary actor's space. `frame_b` is posed in the
/// secondary actor's space, or in world space when the joint has no secondary body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDesc {
    pub frame_a: Transform,
    pub frame_b: Transform,
    pub motion: [D6Motion; 6],
    pub linear_limit: LinearLimit,
    pub twist_limit: AngularLimitPair,
    pub swing_limit: ConeLimit,
    pub drives: [JointDrive; 6],
    /// Desired pose of frame B relative to frame A.
    pub drive_target: Transform,
    pub drive_linear_velocity: Vec3,
    pub drive_angular_velocity: Vec3,
}

impl Default for JointDesc {
    fn default() -> Self {
        Self {
            frame_a: Transform::IDENTITY,
            frame_b: Transform::IDENTITY,
            motion: [D6Motion::Free; 6],
            linear_limit: LinearLimit::default(),
            twist_limit: AngularLimitPair::default(),
            swing_limit: ConeLimit::default(),
            drives: [JointDrive::default(); 6],
            drive_target: Transform::IDENTITY,
            drive_linear_velocity: Vec3::ZERO,
            drive_angular_velocity: Vec3::ZERO,
        }
    }
}

impl JointDesc {
    pub fn new(frame_a: Transform, frame_b: Transform) -> Self {
        Self {
            frame_a,
            frame_b,
            ..Self::default()
        }
    }

    /// All six axes locked.
    pub fn fixed(frame_a: Transform, frame_b: Transform) -> Self {
        Self {
            motion: [D6Motion::Locked; 6],
            ..Self::new(frame_a, frame_b)
        }
    }

    /// Linear axes locked, angular axes free.
    pub fn spherical(frame_a: Transform, frame_b: Transform) -> Self {
        Self::new(frame_a, frame_b)
            .with_motion(D6Axis::X, D6Motion::Locked)
            .with_motion(D6Axis::Y, D6Motion::Locked)
            .with_motion(D6Axis::Z, D6Motion::Locked)
    }

    pub fn with_motion(mut self, axis: D6Axis, motion: D6Motion) -> Self {
        self.motion[axis as usize] = motion;
        self
    }

    pub fn with_drive(mut self, slot: D6Drive, drive: JointDrive) -> Self {
        self.drives[slot as usize] = drive;
        self
    }

    pub fn with_linear_limit(mut self, limit: LinearLimit) -> Self {
        self.linear_limit = limit;
        self
    }

    pub fn with_twist_limit(mut self, limit: AngularLimitPair) -> Self {
        self.twist_limit = limit;
        self
    }

    pub fn with_swing_limit(mut self, limit: ConeLimit) -> Self {
        self.swing_limit = limit;
        self
    }
}

/// Joint row stored in the joint table: body-space frames plus the lookup
/// values the six-axis derivation needs every step.
#[derive(Debug, Clone, PartialEq)]
pub struct JointData {
    /// Constraint frames relative to each body frame (B relative to world when unattached).
    pub c2b: [Transform; 2],
    pub motion: [D6Motion; 6],
    pub linear_limit: LinearLimit,
    pub twist_limit: AngularLimitPair,
    pub swing_limit: ConeLimit,
    pub drives: [JointDrive; 6],
    pub drive_target: Transform,
    pub drive_linear_velocity: Vec3,
    pub drive_angular_velocity: Vec3,

    pub th_swing_y: f32,
    pub th_swing_z: f32,
    pub th_swing_pad: f32,
    pub tq_swing_y: f32,
    pub tq_swing_z: f32,
    pub tq_swing_pad: f32,
    pub tq_twist_low: f32,
    pub tq_twist_high: f32,
    pub tq_twist_pad: f32,

    pub locked: u8,
    pub limited: u8,
    /// Bits of [`D6Drive`].
    pub driving: u8,
}

impl JointData {
    /// `actor_to_body_b` is `None` for joints anchored to the world.
    pub fn new(desc: &JointDesc, actor_to_body_a: &Transform, actor_to_body_b: Option<&Transform>) -> Self {
        let c2b_a = actor_to_body_a.inverse_combine(&desc.frame_a);
        let c2b_b = match actor_to_body_b {
            Some(actor_to_body) => actor_to_body.inverse_combine(&desc.frame_b),
            None => desc.frame_b,
        };

        let mut locked = 0;
        let mut limited = 0;
        for axis in D6Axis::ALL {
            match desc.motion[axis as usize] {
                D6Motion::Locked => locked |= axis.bit(),
                D6Motion::Limited => limited |= axis.bit(),
                D6Motion::Free => {}
            }
        }

        let mut driving = 0;
        for (slot, axis) in [(D6Drive::X, D6Axis::X), (D6Drive::Y, D6Axis::Y), (D6Drive::Z, D6Axis::Z)] {
            if desc.drives[slot as usize].is_active() && locked & axis.bit() == 0 {
                driving |= slot.bit();
            }
        }
        if locked & ANGULAR_MASK == 0 {
            if desc.drives[D6Drive::Slerp as usize].is_active() {
                driving |= D6Drive::Slerp.bit();
            }
        } else {
            if desc.drives[D6Drive::Twist as usize].is_active() && locked & D6Axis::Twist.bit() == 0 {
                driving |= D6Drive::Twist.bit();
            }
            let swing_bits = D6Axis::Swing1.bit() | D6Axis::Swing2.bit();
            if desc.drives[D6Drive::Swing as usize].is_active() && locked & swing_bits != swing_bits {
                driving |= D6Drive::Swing.bit();
            }
        }

        let swing = &desc.swing_limit;
        let twist = &desc.twist_limit;
        let swing_pad = if swing.spring.is_soft() { 0.0 } else { swing.contact_distance };
        let twist_pad = if twist.spring.is_soft() { 0.0 } else { twist.contact_distance };

        Self {
            c2b: [c2b_a, c2b_b],
            motion: desc.motion,
            linear_limit: desc.linear_limit,
            twist_limit: desc.twist_limit,
            swing_limit: desc.swing_limit,
            drives: desc.drives,
            drive_target: desc.drive_target,
            drive_linear_velocity: desc.drive_linear_velocity,
            drive_angular_velocity: desc.drive_angular_velocity,

            th_swing_y: (swing.y_angle * 0.5).tan(),
            th_swing_z: (swing.z_angle * 0.5).tan(),
            th_swing_pad: (swing_pad * 0.5).tan(),
            tq_swing_y: (swing.y_angle * 0.25).tan(),
            tq_swing_z: (swing.z_angle * 0.25).tan(),
            tq_swing_pad: (swing_pad * 0.25).tan(),
            tq_twist_low: (twist.lower * 0.25).tan(),
            tq_twist_high: (twist.upper * 0.25).tan(),
            tq_twist_pad: (twist_pad * 0.25).tan(),

            locked,
            limited,
            driving,
        }
    }

    /// A joint with nothing locked, limited or driven contributes no rows.
    pub fn has_active_constraints(&self) -> bool {
        self.locked != 0 || self.limited != 0 || self.driving != 0
    }

    pub fn is_locked(&self, axis: D6Axis) -> bool {
        self.locked & axis.bit() != 0
    }

    pub fn is_limited(&self, axis: D6Axis) -> bool {
        self.limited & axis.bit() != 0
    }

    pub fn is_driving(&self, drive: D6Drive) -> bool {
        self.driving & drive.bit() != 0
    }

    pub fn drive(&self, drive: D6Drive) -> &JointDrive {
        &self.drives[drive as usize]
    }

    pub fn set_drive_target(&mut self, target: Transform) {
        self.drive_target = target;
    }

    pub fn set_drive_velocity(&mut self, linear: Vec3, angular: Vec3) {
        self.drive_linear_velocity = linear;
        self.drive_angular_velocity = angular;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_joint_without_drives_has_no_constraints() {
        let data = JointData::new(&JointDesc::default(), &Transform::IDENTITY, Some(&Transform::IDENTITY));
        assert!(!data.has_active_constraints());
    }

    #[test]
    fn masks_follow_motion() {
        let desc = JointDesc::spherical(Transform::IDENTITY, Transform::IDENTITY)
            .with_motion(D6Axis::Twist, D6Motion::Limited);
        let data = JointData::new(&desc, &Transform::IDENTITY, None);
        assert_eq!(data.locked, LINEAR_MASK);
        assert_eq!(data.limited, D6Axis::Twist.bit());
        assert!(data.has_active_constraints());
    }

    #[test]
    fn slerp_drive_only_when_no_angular_axis_locked() {
        let slerp = JointDrive::new(100.0, 10.0);
        let free = JointDesc::spherical(Transform::IDENTITY, Transform::IDENTITY)
            .with_drive(D6Drive::Slerp, slerp)
            .with_drive(D6Drive::Twist, slerp);
        let data = JointData::new(&free, &Transform::IDENTITY, None);
        assert!(data.is_driving(D6Drive::Slerp));
        assert!(!data.is_driving(D6Drive::Twist));

        let twist_locked = free.clone().with_motion(D6Axis::Twist, D6Motion::Locked);
        let data = JointData::new(&twist_locked, &Transform::IDENTITY, None);
        assert!(!data.is_driving(D6Drive::Slerp));
        assert!(!data.is_driving(D6Drive::Twist));
    }

    #[test]
    fn tangent_cache_matches_limits() {
        let desc = JointDesc::default().with_swing_limit(ConeLimit {
            y_angle: 1.0,
            z_angle: 0.5,
            contact_distance: 0.1,
            spring: LimitSpring::default(),
        });
        let data = JointData::new(&desc, &Transform::IDENTITY, None);
        assert!((data.th_swing_y - 0.5f32.tan()).abs() < 1e-6);
        assert!((data.tq_swing_z - 0.125f32.tan()).abs() < 1e-6);
        assert!((data.th_swing_pad - 0.05f32.tan()).abs() < 1e-6);
    }

    #[test]
    fn soft_limits_drop_padding() {
        let desc = JointDesc::default().with_twist_limit(AngularLimitPair {
            spring: LimitSpring {
                stiffness: 50.0,
                damping: 1.0,
            },
            ..AngularLimitPair::default()
        });
        let data = JointData::new(&desc, &Transform::IDENTITY, None);
        assert_eq!(data.tq_twist_pad, 0.0);
    }
}
