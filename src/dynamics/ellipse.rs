//! Closest point on an axis-aligned ellipse, used to clamp the swing cone.

use glam::Vec2;

pub const MAX_ITERATIONS: u32 = 20;
pub const TOLERANCE: f32 = 1e-4;
/// Components smaller than this are treated as lying on the other axis.
pub const DEGENERATE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseClamp {
    /// Closest point on the ellipse boundary.
    pub point: Vec2,
    /// Outward unit normal at `point`.
    pub normal: Vec2,
    /// Whether the query point was inside (or on) the ellipse.
    pub inside: bool,
    pub iterations: u32,
}

/// Projects `point` onto the ellipse `(x/rx)² + (y/ry)² = 1`.
///
/// Works in the first quadrant and restores signs at the end. The Lagrange
/// parameter `t` solves `Σ (rᵢ pᵢ / (t + rᵢ²))² = 1` by Newton iteration from
/// a start where the function is non-negative, so the iterates increase
/// monotonically towards the root.
pub fn clamp_to_ellipse(point: Vec2, radii: Vec2) -> EllipseClamp {
    let inside = (point.x / radii.x).powi(2) + (point.y / radii.y).powi(2) <= 1.0;

    let abs = point.abs();
    let active = [abs.x >= DEGENERATE_EPSILON, abs.y >= DEGENERATE_EPSILON];

    if !active[0] && !active[1] {
        // Centre of the ellipse: the nearest boundary point lies on the shorter axis.
        let (closest, normal) = if radii.x <= radii.y {
            (Vec2::new(radii.x, 0.0), Vec2::X)
        } else {
            (Vec2::new(0.0, radii.y), Vec2::Y)
        };
        return EllipseClamp {
            point: closest,
            normal,
            inside: true,
            iterations: 0,
        };
    }

    let e = [radii.x, radii.y];
    let p = [abs.x, abs.y];
    let e2 = [e[0] * e[0], e[1] * e[1]];

    let mut t = f32::MIN;
    for i in 0..2 {
        if active[i] {
            t = t.max(e[i] * p[i] - e2[i]);
        }
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < MAX_ITERATIONS {
        let mut f = -1.0;
        let mut df = 0.0;
        for i in 0..2 {
            if active[i] {
                let denom = t + e2[i];
                let r = e[i] * p[i] / denom;
                f += r * r;
                df -= 2.0 * r * r / denom;
            }
        }
        if f < TOLERANCE {
            converged = true;
            break;
        }
        iterations += 1;
        if df.abs() <= f32::EPSILON {
            break;
        }
        t -= f / df;
    }

    let mut closest = Vec2::ZERO;
    for i in 0..2 {
        if active[i] {
            closest[i] = e2[i] * p[i] / (t + e2[i]);
        }
    }
    if !converged {
        let scale = ((closest.x / e[0]).powi(2) + (closest.y / e[1]).powi(2)).sqrt();
        if scale > f32::EPSILON {
            closest /= scale;
        }
    }

    let closest = Vec2::new(closest.x.copysign(point.x), closest.y.copysign(point.y));
    let normal = Vec2::new(closest.x / e2[0], closest.y / e2[1]).normalize_or_zero();

    EllipseClamp {
        point: closest,
        normal,
        inside,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_ellipse(point: Vec2, radii: Vec2) -> f32 {
        ((point.x / radii.x).powi(2) + (point.y / radii.y).powi(2) - 1.0).abs()
    }

    #[test]
    fn outside_points_land_on_boundary() {
        let radii = Vec2::new(0.4, 1.2);
        for point in [
            Vec2::new(2.0, 0.5),
            Vec2::new(-0.9, 3.0),
            Vec2::new(0.41, -0.01),
            Vec2::new(-5.0, -5.0),
        ] {
            let result = clamp_to_ellipse(point, radii);
            assert!(!result.inside);
            assert!(result.iterations <= MAX_ITERATIONS);
            assert!(on_ellipse(result.point, radii) < 1e-3, "{point:?} -> {result:?}");
            assert!(result.normal.dot(point - result.point) > 0.0);
        }
    }

    #[test]
    fn circle_projection_is_radial() {
        let result = clamp_to_ellipse(Vec2::new(3.0, 4.0), Vec2::splat(1.0));
        assert!((result.point - Vec2::new(0.6, 0.8)).length() < 1e-3);
        assert!((result.normal - Vec2::new(0.6, 0.8)).length() < 1e-3);
    }

    #[test]
    fn inside_points_project_outwards() {
        let radii = Vec2::new(1.0, 0.5);
        let result = clamp_to_ellipse(Vec2::new(0.2, 0.1), radii);
        assert!(result.inside);
        assert!(on_ellipse(result.point, radii) < 1e-3);
    }

    #[test]
    fn degenerate_components_stay_on_axis() {
        let radii = Vec2::new(0.5, 0.8);
        let result = clamp_to_ellipse(Vec2::new(0.0, 2.0), radii);
        assert!((result.point - Vec2::new(0.0, 0.8)).length() < 1e-4);
        assert!((result.normal - Vec2::Y).length() < 1e-5);

        let centre = clamp_to_ellipse(Vec2::ZERO, radii);
        assert!(centre.inside);
        assert_eq!(centre.point, Vec2::new(0.5, 0.0));
    }
}
