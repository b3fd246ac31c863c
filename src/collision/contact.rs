use std::collections::{HashMap, HashSet};
use std::ops::Range;

use glam::Vec3;
use log::debug;

use crate::core::collider::{BoundingSphere, Shape};
use crate::core::soa::BodiesSoA;
use crate::core::types::{MaterialPairProperties, Transform};
use crate::dynamics::backend::SolverBackend;

/// Single contact point. The normal points from shape A to shape B.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    pub position: Vec3,
    pub normal: Vec3,
    /// Negative when the shapes overlap.
    pub separation: f32,
}

/// Friction anchors in each body's frame, kept while the patch is not sliding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionPatch {
    pub anchor_a: Vec3,
    pub anchor_b: Vec3,
}

/// Stable identity of a shape pair across steps: body slots plus shape indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub body_a: u32,
    pub shape_a: u32,
    pub body_b: u32,
    pub shape_b: u32,
}

/// Per-pair slot handed to the narrow phase and to contact preparation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairCache {
    /// Step that last produced an overlap for this pair.
    pub last_step: u64,
    pub manifold: Vec<ContactPoint>,
    pub friction: Option<FrictionPatch>,
}

impl PairCache {
    pub fn reset(&mut self) {
        self.manifold.clear();
        self.friction = None;
    }
}

/// Pair that produced contact points this step.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactPair {
    pub key: PairKey,
    /// Flattened shape indices; `shape_a < shape_b`.
    pub shape_a: usize,
    pub shape_b: usize,
    /// Body rows.
    pub body_a: usize,
    pub body_b: usize,
    pub points: Range<usize>,
    pub material: MaterialPairProperties,
}

#[derive(Debug, Default, Clone)]
pub struct ContactBuffers {
    pub pairs: Vec<ContactPair>,
    pub points: Vec<ContactPoint>,
}

impl ContactBuffers {
    pub fn clear(&mut self) {
        self.pairs.clear();
        self.points.clear();
    }

    pub fn points_of(&self, pair: &ContactPair) -> &[ContactPoint] {
        &self.points[pair.points.clone()]
    }
}

/// Caller-supplied collision exclusions, keyed by body slot.
#[derive(Debug, Default, Clone)]
pub struct CollisionFilter {
    ignored_actors: HashSet<u32>,
    ignored_pairs: HashSet<(u32, u32)>,
}

impl CollisionFilter {
    pub fn set_ignored_actors(&mut self, slots: impl IntoIterator<Item = u32>) {
        self.ignored_actors = slots.into_iter().collect();
    }

    pub fn set_ignored_pairs(&mut self, pairs: impl IntoIterator<Item = (u32, u32)>) {
        self.ignored_pairs = pairs.into_iter().map(|(a, b)| (a.min(b), a.max(b))).collect();
    }

    pub fn is_actor_ignored(&self, slot: u32) -> bool {
        self.ignored_actors.contains(&slot)
    }

    pub fn is_pair_ignored(&self, a: u32, b: u32) -> bool {
        self.ignored_pairs.contains(&(a.min(b), a.max(b)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CatalogEntry {
    body: usize,
    body_slot: u32,
    shape: usize,
}

/// Broad-phase pruning cache plus the persistent per-pair slots.
#[derive(Debug, Default)]
pub struct ContactCache {
    entries: Vec<CatalogEntry>,
    /// Sorted canonical positions of shape pairs that are never tested.
    skip_list: Vec<u64>,
    world_poses: Vec<Transform>,
    pairs: HashMap<PairKey, PairCache>,
}

/// Position of `(i, j)`, `i < j`, in the row-major enumeration of pairs of `n` shapes.
pub fn pair_position(i: usize, j: usize, n: usize) -> u64 {
    let (i, j, n) = (i as u64, j as u64, n as u64);
    i * n - i * (i + 1) / 2 + (j - i - 1)
}

impl ContactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape_count(&self) -> usize {
        self.entries.len()
    }

    pub fn skip_count(&self) -> usize {
        self.skip_list.len()
    }

    /// Flattens the shapes of every non-ignored body and records the pairs to skip.
    pub fn rebuild(&mut self, bodies: &BodiesSoA, filter: &CollisionFilter) {
        self.entries.clear();
        self.skip_list.clear();

        for body in 0..bodies.len() {
            let slot = bodies.slots.slot_of_row(body);
            if filter.is_actor_ignored(slot) {
                continue;
            }
            for shape in 0..bodies.shapes[body].len() {
                self.entries.push(CatalogEntry {
                    body,
                    body_slot: slot,
                    shape,
                });
            }
        }

        let n = self.entries.len();
        for i in 0..n {
            let a = self.entries[i];
            for j in i + 1..n {
                let b = self.entries[j];
                if a.body == b.body || filter.is_pair_ignored(a.body_slot, b.body_slot) {
                    self.skip_list.push(pair_position(i, j, n));
                }
            }
        }

        debug!(
            "rebuilt pruning cache: {} shapes, {} skipped pairs",
            n,
            self.skip_list.len()
        );
    }

    /// Runs bounding-sphere pruning and the narrow phase for this step.
    ///
    /// With `persistent` set, pair slots survive into the next step and are
    /// cleared when a pair skipped a step.
    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        &mut self,
        bodies: &BodiesSoA,
        backend: &dyn SolverBackend,
        contact_distance: f32,
        step: u64,
        persistent: bool,
        out: &mut ContactBuffers,
    ) {
        self.world_poses.clear();
        self.world_poses.extend(
            self.entries
                .iter()
                .map(|e| bodies.transforms[e.body].combine(&bodies.shapes[e.body][e.shape].local_transform)),
        );

        let n = self.entries.len();
        let num_active = bodies.num_active_simulated();
        let mut cursor = 0;
        let mut scratch_slot = PairCache::default();

        for i in 0..n {
            let entry_a = self.entries[i];
            if entry_a.body >= num_active {
                break;
            }
            let shape_a: &Shape = &bodies.shapes[entry_a.body][entry_a.shape];
            let pose_a = self.world_poses[i];
            let center_a = bodies.transforms[entry_a.body].transform_point(shape_a.bounds.center);

            for j in i + 1..n {
                let position = pair_position(i, j, n);
                while cursor < self.skip_list.len() && self.skip_list[cursor] < position {
                    cursor += 1;
                }
                if cursor < self.skip_list.len() && self.skip_list[cursor] == position {
                    cursor += 1;
                    continue;
                }

                let entry_b = self.entries[j];
                let shape_b: &Shape = &bodies.shapes[entry_b.body][entry_b.shape];
                let center_b = bodies.transforms[entry_b.body].transform_point(shape_b.bounds.center);
                if !BoundingSphere::overlaps(center_a, shape_a.bounds.radius, center_b, shape_b.bounds.radius) {
                    continue;
                }

                let key = PairKey {
                    body_a: entry_a.body_slot,
                    shape_a: entry_a.shape as u32,
                    body_b: entry_b.body_slot,
                    shape_b: entry_b.shape as u32,
                };
                let slot = if persistent {
                    let slot = self.pairs.entry(key).or_default();
                    if slot.last_step + 1 != step {
                        slot.reset();
                    }
                    slot.last_step = step;
                    slot
                } else {
                    scratch_slot.reset();
                    &mut scratch_slot
                };

                let start = out.points.len();
                let count = backend.generate_contacts(
                    &shape_a.geometry,
                    &pose_a,
                    &shape_b.geometry,
                    &self.world_poses[j],
                    contact_distance,
                    slot,
                    &mut out.points,
                );
                if count == 0 {
                    continue;
                }
                out.pairs.push(ContactPair {
                    key,
                    shape_a: i,
                    shape_b: j,
                    body_a: entry_a.body,
                    body_b: entry_b.body,
                    points: start..start + count,
                    material: shape_a.material.combine_with(&shape_b.material),
                });
            }
        }

        if persistent {
            self.pairs.retain(|_, slot| slot.last_step == step);
        } else {
            self.pairs.clear();
        }
    }

    pub fn pair_cache(&self, key: &PairKey) -> Option<&PairCache> {
        self.pairs.get(key)
    }

    pub fn pair_cache_mut(&mut self, key: &PairKey) -> Option<&mut PairCache> {
        self.pairs.get_mut(key)
    }
}
