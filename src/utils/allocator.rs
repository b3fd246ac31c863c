use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::PhysicsError;

static NEXT_OWNER: AtomicU32 = AtomicU32::new(1);

/// Identifies the simulation instance that issued a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u32);

impl OwnerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Opaque reference to a body row. Only issued by the simulation's factory calls.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    owner: OwnerId,
    slot: u32,
}

/// Opaque reference to a joint row. Only issued by the simulation's factory calls.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct JointHandle {
    owner: OwnerId,
    slot: u32,
}

/// Common view over both handle kinds.
pub trait Handle {
    fn owner(&self) -> OwnerId;
    fn slot(&self) -> u32;
}

impl Handle for BodyHandle {
    fn owner(&self) -> OwnerId {
        self.owner
    }
    fn slot(&self) -> u32 {
        self.slot
    }
}

impl Handle for JointHandle {
    fn owner(&self) -> OwnerId {
        self.owner
    }
    fn slot(&self) -> u32 {
        self.slot
    }
}

/// Stable slot ↔ dense row mapping.
///
/// Handles keep their slot forever; reordering a table only rewrites the two
/// maps, so every outstanding handle follows its row without being touched.
#[derive(Debug)]
pub struct SlotIndex {
    owner: OwnerId,
    slot_to_row: Vec<usize>,
    row_to_slot: Vec<u32>,
}

impl SlotIndex {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            slot_to_row: Vec::new(),
            row_to_slot: Vec::new(),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Registers the row just appended at the end of the table.
    pub fn push_row(&mut self) -> u32 {
        let slot = self.slot_to_row.len() as u32;
        let row = self.row_to_slot.len();
        self.slot_to_row.push(row);
        self.row_to_slot.push(slot);
        slot
    }

    pub fn body_handle(&self, slot: u32) -> BodyHandle {
        BodyHandle {
            owner: self.owner,
            slot,
        }
    }

    pub fn joint_handle(&self, slot: u32) -> JointHandle {
        JointHandle {
            owner: self.owner,
            slot,
        }
    }

    pub fn row_of_slot(&self, slot: u32) -> Option<usize> {
        self.slot_to_row.get(slot as usize).copied()
    }

    pub fn resolve<H: Handle>(&self, handle: &H) -> Result<usize, PhysicsError> {
        if handle.owner() != self.owner {
            return Err(PhysicsError::ForeignHandle);
        }
        self.row_of_slot(handle.slot())
            .ok_or(PhysicsError::StaleHandle)
    }

    pub fn slot_of_row(&self, row: usize) -> u32 {
        self.row_to_slot[row]
    }

    /// Patches both directions after rows `a` and `b` traded places.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.row_to_slot.swap(a, b);
        let slot_a = self.row_to_slot[a] as usize;
        let slot_b = self.row_to_slot[b] as usize;
        self.slot_to_row[slot_a] = a;
        self.slot_to_row[slot_b] = b;
    }

    pub fn len(&self) -> usize {
        self.row_to_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_to_slot.is_empty()
    }
}
