//! Built-in contact generation for spheres, capsules and boxes.
//!
//! Every routine reports normals pointing from shape A to shape B and a
//! signed separation (negative when penetrating). Pairs further apart than
//! `contact_distance` produce nothing.

use glam::Vec3;

use super::clipping::{clip_polygon, BoxFace};
use super::contact::ContactPoint;
use crate::core::collider::ColliderShape;
use crate::core::types::Transform;

const EPSILON: f32 = 1e-6;
/// Face axes win over edge axes unless the edge overlap is clearly smaller.
const EDGE_TOLERANCE_RELATIVE: f32 = 0.95;
const EDGE_TOLERANCE_ABSOLUTE: f32 = 1e-3;
const MAX_MANIFOLD_POINTS: usize = 4;

/// Dispatches on the shape pair and returns the number of points appended.
pub fn generate_contacts(
    shape_a: &ColliderShape,
    pose_a: &Transform,
    shape_b: &ColliderShape,
    pose_b: &Transform,
    contact_distance: f32,
    out: &mut Vec<ContactPoint>,
) -> usize {
    let start = out.len();
    match (shape_a, shape_b) {
        (ColliderShape::Sphere { radius: ra }, ColliderShape::Sphere { radius: rb }) => {
            sphere_sphere(pose_a.position, *ra, pose_b.position, *rb, contact_distance, out);
        }
        (ColliderShape::Sphere { radius }, ColliderShape::Capsule { radius: rc, half_height }) => {
            let (p0, p1) = capsule_segment(pose_b, *half_height);
            let closest = closest_point_on_segment(pose_a.position, p0, p1);
            sphere_sphere(pose_a.position, *radius, closest, *rc, contact_distance, out);
        }
        (ColliderShape::Capsule { .. }, ColliderShape::Sphere { .. }) => {
            flipped(shape_b, pose_b, shape_a, pose_a, contact_distance, out);
        }
        (
            ColliderShape::Capsule { radius: ra, half_height: ha },
            ColliderShape::Capsule { radius: rb, half_height: hb },
        ) => capsule_capsule(pose_a, *ra, *ha, pose_b, *rb, *hb, contact_distance, out),
        (ColliderShape::Sphere { radius }, ColliderShape::Box { half_extents }) => {
            sphere_box(pose_a.position, *radius, pose_b, *half_extents, contact_distance, out);
        }
        (ColliderShape::Box { .. }, ColliderShape::Sphere { .. }) => {
            flipped(shape_b, pose_b, shape_a, pose_a, contact_distance, out);
        }
        (ColliderShape::Capsule { radius, half_height }, ColliderShape::Box { half_extents }) => {
            capsule_box(pose_a, *radius, *half_height, pose_b, *half_extents, contact_distance, out);
        }
        (ColliderShape::Box { .. }, ColliderShape::Capsule { .. }) => {
            flipped(shape_b, pose_b, shape_a, pose_a, contact_distance, out);
        }
        (ColliderShape::Box { half_extents: ha }, ColliderShape::Box { half_extents: hb }) => {
            box_box(pose_a, *ha, pose_b, *hb, contact_distance, out);
        }
    }
    out.len() - start
}

/// Runs the pair with A and B exchanged and flips the resulting normals.
fn flipped(
    shape_a: &ColliderShape,
    pose_a: &Transform,
    shape_b: &ColliderShape,
    pose_b: &Transform,
    contact_distance: f32,
    out: &mut Vec<ContactPoint>,
) {
    let start = out.len();
    generate_contacts(shape_a, pose_a, shape_b, pose_b, contact_distance, out);
    for point in &mut out[start..] {
        point.normal = -point.normal;
    }
}

fn sphere_sphere(
    center_a: Vec3,
    radius_a: f32,
    center_b: Vec3,
    radius_b: f32,
    contact_distance: f32,
    out: &mut Vec<ContactPoint>,
) -> bool {
    let delta = center_b - center_a;
    let distance_sq = delta.length_squared();
    let reach = radius_a + radius_b + contact_distance;
    if distance_sq > reach * reach {
        return false;
    }
    let distance = distance_sq.sqrt();
    let normal = if distance > EPSILON { delta / distance } else { Vec3::X };
    let separation = distance - radius_a - radius_b;
    out.push(ContactPoint {
        position: center_a + normal * (radius_a + 0.5 * separation),
        normal,
        separation,
    });
    true
}

fn capsule_segment(pose: &Transform, half_height: f32) -> (Vec3, Vec3) {
    let axis = pose.rotation * Vec3::X * half_height;
    (pose.position - axis, pose.position + axis)
}

fn closest_point_on_segment(point: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= EPSILON {
        return a;
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest points between segments `p0-p1` and `q0-q1`.
fn closest_points_between_segments(p0: Vec3, p1: Vec3, q0: Vec3, q1: Vec3) -> (Vec3, Vec3) {
    let d1 = p1 - p0;
    let d2 = q1 - q0;
    let r = p0 - q0;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a <= EPSILON && e <= EPSILON {
        return (p0, q0);
    }
    let (s, t) = if a <= EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    (p0 + d1 * s, q0 + d2 * t)
}

#[allow(clippy::too_many_arguments)]
fn capsule_capsule(
    pose_a: &Transform,
    radius_a: f32,
    half_a: f32,
    pose_b: &Transform,
    radius_b: f32,
    half_b: f32,
    contact_distance: f32,
    out: &mut Vec<ContactPoint>,
) {
    let (a0, a1) = capsule_segment(pose_a, half_a);
    let (b0, b1) = capsule_segment(pose_b, half_b);

    let dir_a = (a1 - a0).normalize_or_zero();
    let dir_b = (b1 - b0).normalize_or_zero();
    let parallel = dir_a.cross(dir_b).length_squared() < 1e-4;
    if parallel && half_a > EPSILON && half_b > EPSILON {
        // Parallel segments: project B's ends onto A for a two point manifold.
        let start = out.len();
        for end in [b0, b1] {
            let on_a = closest_point_on_segment(end, a0, a1);
            let on_b = closest_point_on_segment(on_a, b0, b1);
            sphere_sphere(on_a, radius_a, on_b, radius_b, contact_distance, out);
        }
        if out.len() - start == 2 && out[start].position.distance_squared(out[start + 1].position) < 1e-6 {
            out.pop();
        }
        if out.len() > start {
            return;
        }
    }

    let (pa, pb) = closest_points_between_segments(a0, a1, b0, b1);
    sphere_sphere(pa, radius_a, pb, radius_b, contact_distance, out);
}

fn sphere_box(
    center: Vec3,
    radius: f32,
    pose_box: &Transform,
    half_extents: Vec3,
    contact_distance: f32,
    out: &mut Vec<ContactPoint>,
) -> bool {
    let local = pose_box.inverse_transform_point(center);
    let clamped = local.clamp(-half_extents, half_extents);
    let inside = clamped == local;

    let (surface_local, outward_local, distance) = if inside {
        // Push out through the nearest face.
        let gaps = half_extents - local.abs();
        let axis = if gaps.x <= gaps.y && gaps.x <= gaps.z {
            0
        } else if gaps.y <= gaps.z {
            1
        } else {
            2
        };
        let sign = if local[axis] >= 0.0 { 1.0 } else { -1.0 };
        let mut surface = local;
        surface[axis] = half_extents[axis] * sign;
        let mut outward = Vec3::ZERO;
        outward[axis] = sign;
        (surface, outward, -gaps[axis])
    } else {
        let delta = local - clamped;
        let distance = delta.length();
        (clamped, delta / distance, distance)
    };

    let separation = distance - radius;
    if separation > contact_distance {
        return false;
    }
    // Normal points from the sphere towards the box.
    let normal = -(pose_box.rotation * outward_local);
    let surface = pose_box.transform_point(surface_local);
    out.push(ContactPoint {
        position: surface + normal * (0.5 * separation),
        normal,
        separation,
    });
    true
}

#[allow(clippy::too_many_arguments)]
fn capsule_box(
    pose_capsule: &Transform,
    radius: f32,
    half_height: f32,
    pose_box: &Transform,
    half_extents: Vec3,
    contact_distance: f32,
    out: &mut Vec<ContactPoint>,
) {
    let (p0, p1) = capsule_segment(pose_capsule, half_height);
    let start = out.len();
    sphere_box(p0, radius, pose_box, half_extents, contact_distance, out);
    sphere_box(p1, radius, pose_box, half_extents, contact_distance, out);
    if out.len() > start {
        return;
    }
    // Neither end is close: the middle of the segment may still cross an edge.
    let middle = closest_point_on_segment(pose_box.position, p0, p1);
    sphere_box(middle, radius, pose_box, half_extents, contact_distance, out);
}

fn box_axes(pose: &Transform) -> [Vec3; 3] {
    [pose.rotation * Vec3::X, pose.rotation * Vec3::Y, pose.rotation * Vec3::Z]
}

fn projected_extent(axes: &[Vec3; 3], half_extents: Vec3, axis: Vec3) -> f32 {
    axes[0].dot(axis).abs() * half_extents.x
        + axes[1].dot(axis).abs() * half_extents.y
        + axes[2].dot(axis).abs() * half_extents.z
}

#[derive(Debug, Clone, Copy)]
enum SeparatingAxis {
    FaceA(usize),
    FaceB(usize),
    Edge(usize, usize),
}

fn box_box(
    pose_a: &Transform,
    half_a: Vec3,
    pose_b: &Transform,
    half_b: Vec3,
    contact_distance: f32,
    out: &mut Vec<ContactPoint>,
) {
    let axes_a = box_axes(pose_a);
    let axes_b = box_axes(pose_b);
    let relative = pose_b.position - pose_a.position;

    let mut best_face: Option<(f32, Vec3, SeparatingAxis)> = None;
    let mut best_edge: Option<(f32, Vec3, SeparatingAxis)> = None;

    let mut test = |axis: Vec3, feature: SeparatingAxis, edge: bool| -> bool {
        let projection = relative.dot(axis);
        let overlap = projected_extent(&axes_a, half_a, axis) + projected_extent(&axes_b, half_b, axis)
            - projection.abs();
        if overlap < -contact_distance {
            return false;
        }
        let normal = if projection < 0.0 { -axis } else { axis };
        let slot = if edge { &mut best_edge } else { &mut best_face };
        if slot.map_or(true, |(best, _, _)| overlap < best) {
            *slot = Some((overlap, normal, feature));
        }
        true
    };

    for i in 0..3 {
        if !test(axes_a[i], SeparatingAxis::FaceA(i), false) {
            return;
        }
    }
    for j in 0..3 {
        if !test(axes_b[j], SeparatingAxis::FaceB(j), false) {
            return;
        }
    }
    for i in 0..3 {
        for j in 0..3 {
            let axis = axes_a[i].cross(axes_b[j]);
            if axis.length_squared() > 1e-6 && !test(axis.normalize(), SeparatingAxis::Edge(i, j), true) {
                return;
            }
        }
    }

    let Some(face) = best_face else {
        return;
    };
    let chosen = match best_edge {
        Some(edge) if edge.0 < EDGE_TOLERANCE_RELATIVE * face.0 - EDGE_TOLERANCE_ABSOLUTE => edge,
        _ => face,
    };

    let (_, normal, feature) = chosen;
    match feature {
        SeparatingAxis::FaceA(i) => {
            face_contacts(pose_a, &axes_a, half_a, i, normal, pose_b, &axes_b, half_b, contact_distance, normal, out)
        }
        SeparatingAxis::FaceB(j) => {
            face_contacts(pose_b, &axes_b, half_b, j, -normal, pose_a, &axes_a, half_a, contact_distance, normal, out)
        }
        SeparatingAxis::Edge(i, j) => {
            let edge_a = support_edge(pose_a, &axes_a, half_a, i, normal);
            let edge_b = support_edge(pose_b, &axes_b, half_b, j, -normal);
            let (pa, pb) = closest_points_between_segments(edge_a.0, edge_a.1, edge_b.0, edge_b.1);
            let separation = (pb - pa).dot(normal);
            if separation <= contact_distance {
                out.push(ContactPoint {
                    position: (pa + pb) * 0.5,
                    normal,
                    separation,
                });
            }
        }
    }
}

/// Edge of the box parallel to `axes[axis]` that lies furthest along `direction`.
fn support_edge(pose: &Transform, axes: &[Vec3; 3], half: Vec3, axis: usize, direction: Vec3) -> (Vec3, Vec3) {
    let mut center = pose.position;
    for m in 0..3 {
        if m != axis {
            let sign = if axes[m].dot(direction) >= 0.0 { 1.0 } else { -1.0 };
            center += axes[m] * half[m] * sign;
        }
    }
    let along = axes[axis] * half[axis];
    (center - along, center + along)
}

fn face_of(pose: &Transform, axes: &[Vec3; 3], half: Vec3, axis: usize, outward: Vec3) -> BoxFace {
    let sign = if axes[axis].dot(outward) >= 0.0 { 1.0 } else { -1.0 };
    let u = (axis + 1) % 3;
    let v = (axis + 2) % 3;
    BoxFace {
        center: pose.position + axes[axis] * half[axis] * sign,
        normal: axes[axis] * sign,
        u: axes[u],
        v: axes[v],
        half_u: half[u],
        half_v: half[v],
    }
}

/// Clips the incident face of `incident` against the reference face of
/// `reference` whose outward normal is `reference_normal`.
#[allow(clippy::too_many_arguments)]
fn face_contacts(
    reference: &Transform,
    reference_axes: &[Vec3; 3],
    reference_half: Vec3,
    reference_axis: usize,
    reference_normal: Vec3,
    incident: &Transform,
    incident_axes: &[Vec3; 3],
    incident_half: Vec3,
    contact_distance: f32,
    normal: Vec3,
    out: &mut Vec<ContactPoint>,
) {
    let reference_face = face_of(reference, reference_axes, reference_half, reference_axis, reference_normal);

    let mut incident_axis = 0;
    let mut best = f32::MIN;
    for (k, axis) in incident_axes.iter().enumerate() {
        let alignment = axis.dot(reference_normal).abs();
        if alignment > best {
            best = alignment;
            incident_axis = k;
        }
    }
    let incident_face = face_of(incident, incident_axes, incident_half, incident_axis, -reference_normal);

    let clipped = clip_polygon(&incident_face.vertices(), &reference_face.side_planes());
    let mut points: Vec<ContactPoint> = clipped
        .into_iter()
        .filter_map(|p| {
            let separation = reference_face.height(p);
            (separation <= contact_distance).then(|| ContactPoint {
                position: p - reference_face.normal * (0.5 * separation),
                normal,
                separation,
            })
        })
        .collect();

    if points.len() > MAX_MANIFOLD_POINTS {
        reduce_manifold(&mut points);
    }
    out.extend(points);
}

/// Keeps the deepest point, the point furthest from it, and the two points
/// spanning the largest area with them.
fn reduce_manifold(points: &mut Vec<ContactPoint>) {
    let deepest = points
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.separation.total_cmp(&b.1.separation))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let anchor = points[deepest].position;
    let far = points
        .iter()
        .enumerate()
        .max_by(|a, b| {
            a.1.position
                .distance_squared(anchor)
                .total_cmp(&b.1.position.distance_squared(anchor))
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    let edge = points[far].position - anchor;
    let normal = points[deepest].normal;

    let mut left = None;
    let mut right = None;
    let mut left_area = 0.0;
    let mut right_area = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i == deepest || i == far {
            continue;
        }
        let area = edge.cross(p.position - anchor).dot(normal);
        if area > left_area {
            left_area = area;
            left = Some(i);
        } else if area < right_area {
            right_area = area;
            right = Some(i);
        }
    }

    let keep: Vec<usize> = [Some(deepest), Some(far), left, right].into_iter().flatten().collect();
    let reduced = keep.iter().map(|&i| points[i]).collect();
    *points = reduced;
}
