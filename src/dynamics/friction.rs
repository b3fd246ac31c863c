use glam::Vec3;

use super::backend::SolverBody;
use crate::collision::contact::{ContactPoint, FrictionPatch};

/// World-space friction anchors for one contact patch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchAnchors {
    pub on_a: Vec3,
    pub on_b: Vec3,
    pub normal: Vec3,
    /// The previous step's anchors held, so static friction applies.
    pub sticking: bool,
}

impl PatchAnchors {
    pub fn to_patch(&self, body_a: &SolverBody, body_b: &SolverBody) -> FrictionPatch {
        FrictionPatch {
            anchor_a: body_a.transform.inverse_transform_point(self.on_a),
            anchor_b: body_b.transform.inverse_transform_point(self.on_b),
        }
    }
}

/// Reuses the cached anchors while they stay within `tolerance` of each other
/// in the contact plane; otherwise re-anchors both sides at the patch centroid.
pub fn patch_anchors(
    points: &[ContactPoint],
    cached: Option<&FrictionPatch>,
    body_a: &SolverBody,
    body_b: &SolverBody,
    tolerance: f32,
) -> Option<PatchAnchors> {
    if points.is_empty() {
        return None;
    }
    let count = points.len() as f32;
    let centroid = points.iter().map(|p| p.position).sum::<Vec3>() / count;
    let normal = points.iter().map(|p| p.normal).sum::<Vec3>().normalize_or_zero();
    if normal == Vec3::ZERO {
        return None;
    }

    if let Some(patch) = cached {
        let on_a = body_a.transform.transform_point(patch.anchor_a);
        let on_b = body_b.transform.transform_point(patch.anchor_b);
        let drift = on_b - on_a;
        let tangential = drift - normal * drift.dot(normal);
        if tangential.length_squared() <= tolerance * tolerance {
            return Some(PatchAnchors {
                on_a,
                on_b,
                normal,
                sticking: true,
            });
        }
    }

    Some(PatchAnchors {
        on_a: centroid,
        on_b: centroid,
        normal,
        sticking: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Transform;

    fn point(x: f32) -> ContactPoint {
        ContactPoint {
            position: Vec3::new(x, 0.0, 0.0),
            normal: Vec3::Z,
            separation: 0.0,
        }
    }

    #[test]
    fn fresh_patch_anchors_at_centroid() {
        let body = SolverBody::fixed(Transform::IDENTITY);
        let anchors = patch_anchors(&[point(-1.0), point(1.0)], None, &body, &body, 0.02).unwrap();
        assert_eq!(anchors.on_a, Vec3::ZERO);
        assert!(!anchors.sticking);
    }

    #[test]
    fn cached_patch_breaks_once_it_slides() {
        let a = SolverBody::fixed(Transform::IDENTITY);
        let b = SolverBody::fixed(Transform::from_position(Vec3::new(0.1, 0.0, 0.0)));
        let patch = FrictionPatch {
            anchor_a: Vec3::ZERO,
            anchor_b: Vec3::ZERO,
        };
        let anchors = patch_anchors(&[point(0.0)], Some(&patch), &a, &b, 0.02).unwrap();
        assert!(!anchors.sticking);

        let anchors = patch_anchors(&[point(0.0)], Some(&patch), &a, &b, 0.5).unwrap();
        assert!(anchors.sticking);
        assert_eq!(anchors.on_b, Vec3::new(0.1, 0.0, 0.0));
    }
}
