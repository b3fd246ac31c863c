//! Six-axis joint row derivation.
//!
//! Rows are rebuilt every step from the current body poses. Frame A supplies the
//! constraint axes, frame B the anchor, and the relative rotation is kept in
//! the hemisphere where `qA⁻¹·qB` has a non-negative scalar part.

use glam::{Quat, Vec2, Vec3};

use super::backend::{ConstraintRow, RowKind};
use super::ellipse::clamp_to_ellipse;
use crate::core::constraints::{D6Axis, D6Drive, D6Motion, JointData, JointDrive, LimitSpring, ANGULAR_MASK};
use crate::core::types::Transform;
use crate::utils::math::{relative_rotation_jacobian, separate_swing_twist, tan_quarter};

/// Appends the rows of `joint` for body poses `pose_a` and `pose_b`
/// (identity when the joint is anchored to the world) and returns how many were added.
pub fn derive_rows(
    joint: &JointData,
    pose_a: &Transform,
    pose_b: &Transform,
    dt: f32,
    out: &mut Vec<ConstraintRow>,
) -> usize {
    let start = out.len();

    let c_a = pose_a.combine(&joint.c2b[0]);
    let mut c_b = pose_b.combine(&joint.c2b[1]);
    if c_a.rotation.dot(c_b.rotation) < 0.0 {
        c_b.rotation = -c_b.rotation;
    }
    let relative = c_a.inverse_combine(&c_b);
    let frame = Frame {
        c_a,
        c_b,
        ra: c_b.position - pose_a.position,
        rb: c_b.position - pose_b.position,
        separation: c_b.position - c_a.position,
    };

    linear_locks(joint, &frame, out);
    linear_limit(joint, &frame, out);
    linear_drives(joint, &frame, &relative, dt, out);

    angular_locks(joint, &frame, out);
    angular_limits(joint, &frame, relative.rotation, out);
    angular_drives(joint, &frame, relative.rotation, dt, out);

    out.len() - start
}

struct Frame {
    c_a: Transform,
    c_b: Transform,
    ra: Vec3,
    rb: Vec3,
    separation: Vec3,
}

impl Frame {
    fn axis_a(&self, index: usize) -> Vec3 {
        self.c_a.rotation * Vec3::AXES[index]
    }
}

fn limit_kind(spring: &LimitSpring) -> RowKind {
    if spring.is_soft() {
        RowKind::Spring {
            stiffness: spring.stiffness,
            damping: spring.damping,
            acceleration: false,
            min_impulse: 0.0,
            max_impulse: f32::MAX,
        }
    } else {
        RowKind::Inequality
    }
}

fn drive_kind(drive: &JointDrive, dt: f32) -> RowKind {
    let limit = drive.force_limit * dt;
    RowKind::Spring {
        stiffness: drive.stiffness,
        damping: drive.damping,
        acceleration: drive.is_acceleration,
        min_impulse: -limit,
        max_impulse: limit,
    }
}

fn linear_locks(joint: &JointData, frame: &Frame, out: &mut Vec<ConstraintRow>) {
    for (i, axis) in [D6Axis::X, D6Axis::Y, D6Axis::Z].into_iter().enumerate() {
        if joint.is_locked(axis) {
            let dir = frame.axis_a(i);
            out.push(ConstraintRow::linear(
                dir,
                frame.ra,
                frame.rb,
                frame.separation.dot(dir),
                RowKind::Equality,
            ));
        }
    }
}

fn linear_limit(joint: &JointData, frame: &Frame, out: &mut Vec<ConstraintRow>) {
    let mut projected = Vec3::ZERO;
    let mut any = false;
    for (i, axis) in [D6Axis::X, D6Axis::Y, D6Axis::Z].into_iter().enumerate() {
        if joint.is_limited(axis) {
            let dir = frame.axis_a(i);
            projected += dir * frame.separation.dot(dir);
            any = true;
        }
    }
    if !any {
        return;
    }

    let limit = &joint.linear_limit;
    let pad = if limit.spring.is_soft() { 0.0 } else { limit.contact_distance };
    let distance = projected.length();
    if distance > 1e-6 && distance > limit.value - pad {
        let dir = projected / distance;
        out.push(ConstraintRow::linear(
            -dir,
            frame.ra,
            frame.rb,
            limit.value - distance,
            limit_kind(&limit.spring),
        ));
    }
}

fn linear_drives(joint: &JointData, frame: &Frame, relative: &Transform, dt: f32, out: &mut Vec<ConstraintRow>) {
    for (i, slot) in [D6Drive::X, D6Drive::Y, D6Drive::Z].into_iter().enumerate() {
        if !joint.is_driving(slot) {
            continue;
        }
        let dir = frame.axis_a(i);
        let error = relative.position[i] - joint.drive_target.position[i];
        let mut row = ConstraintRow::linear(dir, frame.ra, frame.rb, error, drive_kind(joint.drive(slot), dt));
        row.velocity_target = joint.drive_linear_velocity[i];
        out.push(row);
    }
}

fn angular_locks(joint: &JointData, frame: &Frame, out: &mut Vec<ConstraintRow>) {
    let mut locked = joint.locked & ANGULAR_MASK;
    if locked == 0 {
        return;
    }

    let swing_y = joint.is_locked(D6Axis::Swing1);
    let swing_z = joint.is_locked(D6Axis::Swing2);
    if swing_y != swing_z {
        // One swing locked: pin frame B's X axis against the locked swing's
        // orthogonal axis in frame A.
        let x_b = frame.c_b.rotation * Vec3::X;
        let (reference, bit) = if swing_y {
            (frame.axis_a(2), D6Axis::Swing1.bit())
        } else {
            (frame.axis_a(1), D6Axis::Swing2.bit())
        };
        out.push(ConstraintRow::angular(
            x_b.cross(reference),
            x_b.dot(reference),
            RowKind::Equality,
        ));
        locked &= !bit;
    }

    if locked == 0 {
        return;
    }
    let jacobian = relative_rotation_jacobian(frame.c_a.rotation, frame.c_b.rotation);
    let error = frame.c_a.rotation.conjugate() * frame.c_b.rotation;
    let imaginary = Vec3::new(error.x, error.y, error.z);
    for (i, axis) in [D6Axis::Twist, D6Axis::Swing1, D6Axis::Swing2].into_iter().enumerate() {
        if locked & axis.bit() != 0 {
            out.push(ConstraintRow::angular(jacobian.col(i), imaginary[i], RowKind::Equality));
        }
    }
}

fn angular_limits(joint: &JointData, frame: &Frame, relative: Quat, out: &mut Vec<ConstraintRow>) {
    let twist_limited = joint.is_limited(D6Axis::Twist);
    let swing_y_limited = joint.is_limited(D6Axis::Swing1);
    let swing_z_limited = joint.is_limited(D6Axis::Swing2);
    if !(twist_limited || swing_y_limited || swing_z_limited) {
        return;
    }

    let (swing, twist) = separate_swing_twist(relative);

    if twist_limited {
        let axis = frame.c_b.rotation * Vec3::X;
        let tq = tan_quarter(twist.x, twist.w);
        let kind = limit_kind(&joint.twist_limit.spring);
        if tq < joint.tq_twist_low + joint.tq_twist_pad {
            let error = 4.0 * (tq.atan() - joint.tq_twist_low.atan());
            out.push(ConstraintRow::angular(axis, error, kind));
        }
        if tq > joint.tq_twist_high - joint.tq_twist_pad {
            let error = 4.0 * (joint.tq_twist_high.atan() - tq.atan());
            out.push(ConstraintRow::angular(-axis, error, kind));
        }
    }

    let kind = limit_kind(&joint.swing_limit.spring);
    if swing_y_limited && swing_z_limited {
        if swing.w <= 1e-6 {
            return;
        }
        let point = Vec2::new(swing.y, swing.z) / swing.w;
        let radii = Vec2::new(joint.th_swing_y, joint.th_swing_z);
        let padded = (radii - Vec2::splat(joint.th_swing_pad)).max(Vec2::splat(1e-6));
        let outside_padded = (point.x / padded.x).powi(2) + (point.y / padded.y).powi(2) > 1.0;
        if !outside_padded {
            return;
        }
        let clamp = clamp_to_ellipse(point, radii);
        let error = 2.0 * clamp.normal.dot(clamp.point - point) / (1.0 + point.length_squared());
        let axis = frame.c_a.rotation * Vec3::new(0.0, clamp.normal.x, clamp.normal.y);
        out.push(ConstraintRow::angular(-axis, error, kind));
        return;
    }

    for (limited, component, companion, axis_index) in [
        (swing_y_limited, swing.y, D6Axis::Swing2, 1),
        (swing_z_limited, swing.z, D6Axis::Swing1, 2),
    ] {
        if !limited {
            continue;
        }
        let (value, limit, pad, scale) = if joint.motion[companion as usize] == D6Motion::Locked {
            let limit = if axis_index == 1 { joint.tq_swing_y } else { joint.tq_swing_z };
            (tan_quarter(component, swing.w), limit, joint.tq_swing_pad, 4.0)
        } else {
            if swing.w <= 1e-6 {
                continue;
            }
            let limit = if axis_index == 1 { joint.th_swing_y } else { joint.th_swing_z };
            (component / swing.w, limit, joint.th_swing_pad, 2.0)
        };
        let axis = frame.axis_a(axis_index);
        if value > limit - pad {
            let error = scale * (limit.atan() - value.atan());
            out.push(ConstraintRow::angular(-axis, error, kind));
        }
        if value < -limit + pad {
            let error = scale * (value.atan() + limit.atan());
            out.push(ConstraintRow::angular(axis, error, kind));
        }
    }
}

fn angular_drives(joint: &JointData, frame: &Frame, relative: Quat, dt: f32, out: &mut Vec<ConstraintRow>) {
    let velocity = joint.drive_angular_velocity;

    if joint.is_driving(D6Drive::Slerp) {
        let kind = drive_kind(joint.drive(D6Drive::Slerp), dt);
        let mut target = frame.c_a.rotation * joint.drive_target.rotation;
        if target.dot(frame.c_b.rotation) < 0.0 {
            target = -target;
        }
        let jacobian = relative_rotation_jacobian(target, frame.c_b.rotation);
        let delta = target.conjugate() * frame.c_b.rotation;
        let imaginary = Vec3::new(delta.x, delta.y, delta.z);
        for i in 0..3 {
            let mut row = ConstraintRow::angular(jacobian.col(i) * 2.0, imaginary[i] * 2.0, kind);
            row.velocity_target = velocity[i];
            out.push(row);
        }
        return;
    }

    let (swing, twist) = separate_swing_twist(relative);
    let target_rotation = if joint.drive_target.rotation.w < 0.0 {
        -joint.drive_target.rotation
    } else {
        joint.drive_target.rotation
    };
    let (target_swing, target_twist) = separate_swing_twist(target_rotation);

    if joint.is_driving(D6Drive::Twist) {
        let angle = 4.0 * tan_quarter(twist.x, twist.w).atan();
        let target = 4.0 * tan_quarter(target_twist.x, target_twist.w).atan();
        let axis = frame.c_b.rotation * Vec3::X;
        let mut row = ConstraintRow::angular(axis, angle - target, drive_kind(joint.drive(D6Drive::Twist), dt));
        row.velocity_target = velocity.x;
        out.push(row);
    }

    if joint.is_driving(D6Drive::Swing) {
        let kind = drive_kind(joint.drive(D6Drive::Swing), dt);
        for (axis_index, motion, current, wanted) in [
            (1, joint.motion[D6Axis::Swing1 as usize], swing.y, target_swing.y),
            (2, joint.motion[D6Axis::Swing2 as usize], swing.z, target_swing.z),
        ] {
            if motion == D6Motion::Locked {
                continue;
            }
            let angle = 2.0 * current.atan2(swing.w);
            let target = 2.0 * wanted.atan2(target_swing.w);
            let mut row = ConstraintRow::angular(frame.axis_a(axis_index), angle - target, kind);
            row.velocity_target = velocity[axis_index];
            out.push(row);
        }
    }
}
