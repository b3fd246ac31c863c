//! Constraint batching and joint-table realignment.

use log::debug;

use super::backend::{ConstraintBatch, ConstraintDescriptor, ConstraintSource};
use crate::core::soa::JointsSoA;

/// Bodies can carry up to this many batch colours before constraints spill
/// into single-entry batches.
const MAX_COLORS: usize = 64;

/// Greedy colouring: each descriptor goes to the first batch in which neither of
/// its movable bodies (rows below `num_movable`) already appears. Appends to
/// `ordered` and `batches`.
pub fn color_batches(
    descriptors: &[ConstraintDescriptor],
    num_movable: usize,
    ordered: &mut Vec<ConstraintDescriptor>,
    batches: &mut Vec<ConstraintBatch>,
) {
    if descriptors.is_empty() {
        return;
    }

    let mut masks = vec![0u64; num_movable];
    let mut buckets: Vec<Vec<usize>> = Vec::new();
    let mut overflow = Vec::new();

    for (k, descriptor) in descriptors.iter().enumerate() {
        let mask_of = |body: Option<usize>| body.filter(|&b| b < num_movable).map_or(0, |b| masks[b]);
        let used = mask_of(descriptor.body_a) | mask_of(descriptor.body_b);
        let color = (!used).trailing_zeros() as usize;
        if color >= MAX_COLORS {
            overflow.push(k);
            continue;
        }
        if color == buckets.len() {
            buckets.push(Vec::new());
        }
        buckets[color].push(k);
        for body in [descriptor.body_a, descriptor.body_b].into_iter().flatten() {
            if body < num_movable {
                masks[body] |= 1 << color;
            }
        }
    }

    for bucket in buckets {
        let start = ordered.len();
        ordered.extend(bucket.into_iter().map(|k| descriptors[k]));
        batches.push(ConstraintBatch {
            range: start..ordered.len(),
        });
    }
    for k in overflow {
        single_batch(descriptors[k], ordered, batches);
    }
}

/// Batching disabled: every descriptor keeps its place in its own batch.
pub fn unbatched(
    descriptors: &[ConstraintDescriptor],
    ordered: &mut Vec<ConstraintDescriptor>,
    batches: &mut Vec<ConstraintBatch>,
) {
    for descriptor in descriptors {
        single_batch(*descriptor, ordered, batches);
    }
}

fn single_batch(
    descriptor: ConstraintDescriptor,
    ordered: &mut Vec<ConstraintDescriptor>,
    batches: &mut Vec<ConstraintBatch>,
) {
    let start = ordered.len();
    ordered.push(descriptor);
    batches.push(ConstraintBatch {
        range: start..start + 1,
    });
}

/// Swaps joint-table rows so the joint at ordered position `p` lives in row `p`.
/// Rewrites the descriptors to the new rows and returns the number of swaps.
pub fn realign_joint_rows(ordered: &mut [ConstraintDescriptor], joints: &mut JointsSoA) -> usize {
    // Row -> position in `ordered`, for rows that have a descriptor.
    let mut position_of_row = vec![None; joints.len()];
    for (position, descriptor) in ordered.iter().enumerate() {
        if let ConstraintSource::Joint(row) = descriptor.source {
            position_of_row[row] = Some(position);
        }
    }

    let mut swaps = 0;
    for position in 0..ordered.len() {
        let ConstraintSource::Joint(row) = ordered[position].source else {
            continue;
        };
        if row == position {
            continue;
        }
        joints.swap_rows(position, row);
        swaps += 1;
        // Whatever sat in row `position` now lives in `row`.
        if let Some(displaced) = position_of_row[position] {
            ordered[displaced].source = ConstraintSource::Joint(row);
            position_of_row[row] = Some(displaced);
        } else {
            position_of_row[row] = None;
        }
        ordered[position].source = ConstraintSource::Joint(position);
        position_of_row[position] = Some(position);
    }

    if swaps > 0 {
        debug!("realigned joint table with {swaps} row swaps");
    }
    swaps
}
