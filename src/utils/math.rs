//! Additional math helpers layered on top of `glam`.

use glam::{Mat3, Quat, Vec3};

/// Converts angular velocity vector (radians/sec) into a quaternion delta.
pub fn angular_velocity_to_quat(angular: Vec3, dt: f32) -> Quat {
    let angle = angular.length() * dt;
    if angle.abs() < 1e-6 {
        return Quat::IDENTITY;
    }
    let axis = angular.normalize();
    Quat::from_axis_angle(axis, angle)
}

/// Rotation vector (axis · angle) of `q`, taking the shorter path.
pub fn shortest_rotation_vector(q: Quat) -> Vec3 {
    let q = if q.w < 0.0 { -q } else { q };
    let (axis, angle) = q.to_axis_angle();
    if angle.abs() < 1e-6 {
        Vec3::ZERO
    } else {
        axis * angle
    }
}

/// Splits `q = swing · twist` where twist is about X.
pub fn separate_swing_twist(q: Quat) -> (Quat, Quat) {
    let len_sq = q.x * q.x + q.w * q.w;
    let twist = if len_sq > 1e-12 {
        let inv = len_sq.sqrt().recip();
        Quat::from_xyzw(q.x * inv, 0.0, 0.0, q.w * inv)
    } else {
        Quat::IDENTITY
    };
    let swing = q * twist.conjugate();
    (swing, twist)
}

/// Tangent of a quarter of the twist angle, in `[-1, 1]` when `twist.w ≥ 0`.
pub fn tan_quarter(x: f32, w: f32) -> f32 {
    x / (1.0 + w)
}

/// World-space angular Jacobian rows of the imaginary part of `qa⁻¹·qb`.
///
/// Row `i` satisfies `d/dt imag(qa⁻¹·qb)[i] = row[i]·(ω_b − ω_a)`.
pub fn relative_rotation_jacobian(qa: Quat, qb: Quat) -> Mat3 {
    let wa = qa.w;
    let wb = qb.w;
    let va = Vec3::new(qa.x, qa.y, qa.z);
    let vb = Vec3::new(qb.x, qb.y, qb.z);

    let c = vb * wa + va * wb;
    let d0 = wa * wb;
    let d1 = va.dot(vb);
    let d = if d0 + d1 == 0.0 { d0 - d1 + 1e-6 } else { d0 - d1 };

    let row0 = (va * va.x + vb * vb.x + Vec3::new(d, c.z, -c.y)) * 0.5;
    let row1 = (va * va.y + vb * vb.y + Vec3::new(-c.z, d, c.x)) * 0.5;
    let row2 = (va * va.z + vb * vb.z + Vec3::new(c.y, -c.x, d)) * 0.5;
    // Stored as columns so `col(i)` is row `i`.
    Mat3::from_cols(row0, row1, row2)
}

/// `R · diag(d) · Rᵀ` for a diagonal body-space tensor.
pub fn world_inertia(rotation: Quat, diagonal: Vec3) -> Mat3 {
    let r = Mat3::from_quat(rotation);
    r * Mat3::from_diagonal(diagonal) * r.transpose()
}

/// Two unit vectors completing `normal` to an orthonormal basis.
pub fn tangent_basis(normal: Vec3) -> (Vec3, Vec3) {
    normal.any_orthonormal_pair()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swing_twist_recompose() {
        let q = Quat::from_rotation_y(0.4) * Quat::from_rotation_x(0.9);
        let (swing, twist) = separate_swing_twist(q);
        assert!((swing * twist).abs_diff_eq(q, 1e-5));
        assert!(twist.y.abs() < 1e-6 && twist.z.abs() < 1e-6);
        assert!(swing.x.abs() < 1e-5);
    }

    #[test]
    fn jacobian_matches_finite_difference() {
        let qa = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -0.2, 0.5);
        let qb = Quat::from_euler(glam::EulerRot::XYZ, -0.1, 0.4, 0.2);
        let omega_b = Vec3::new(0.7, -0.3, 0.2);
        let h = 1e-3;

        let jac = relative_rotation_jacobian(qa, qb);
        let before = qa.conjugate() * qb;
        let qb_next = (angular_velocity_to_quat(omega_b, h) * qb).normalize();
        let after = qa.conjugate() * qb_next;

        for i in 0..3 {
            let fd = (Vec3::new(after.x, after.y, after.z)[i] - Vec3::new(before.x, before.y, before.z)[i]) / h;
            assert!((fd - jac.col(i).dot(omega_b)).abs() < 1e-2, "row {i}");
        }
    }

    #[test]
    fn shortest_rotation_flips_long_path() {
        let q = -Quat::from_rotation_z(0.5);
        let v = shortest_rotation_vector(q);
        assert!((v - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-5);
    }
}
