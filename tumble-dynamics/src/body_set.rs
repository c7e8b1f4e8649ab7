//! Dense body storage with stable identifiers.

use hashbrown::HashMap;
use tumble_types::{BodyId, DynamicsError, Result};

use crate::body::RigidBody;

/// A set of rigid bodies stored contiguously for solver access.
///
/// Bodies live in a dense `Vec` so the solver can index them by slot; a side
/// map translates stable [`BodyId`]s to slots. Removal swaps the last body
/// into the vacated slot, so slot indices are only valid until the next
/// removal while IDs stay valid for the body's lifetime.
#[derive(Debug, Clone, Default)]
pub struct BodySet {
    bodies: Vec<RigidBody>,
    index: HashMap<BodyId, usize>,
    next_id: u64,
}

impl BodySet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh, never-used identifier.
    pub fn allocate_id(&mut self) -> BodyId {
        let id = BodyId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a body. Fails if its ID is already present.
    pub fn insert(&mut self, body: RigidBody) -> Result<()> {
        let id = body.id();
        if self.index.contains_key(&id) {
            return Err(DynamicsError::InvalidBodyId(id));
        }
        self.next_id = self.next_id.max(id.raw() + 1);
        self.index.insert(id, self.bodies.len());
        self.bodies.push(body);
        Ok(())
    }

    /// Remove a body and return it.
    pub fn remove(&mut self, id: BodyId) -> Result<RigidBody> {
        let slot = self
            .index
            .remove(&id)
            .ok_or(DynamicsError::InvalidBodyId(id))?;
        let body = self.bodies.swap_remove(slot);
        if let Some(moved) = self.bodies.get(slot) {
            self.index.insert(moved.id(), slot);
        }
        Ok(body)
    }

    /// Look up a body by ID.
    #[must_use]
    pub fn get(&self, id: BodyId) -> Option<&RigidBody> {
        self.index.get(&id).map(|&slot| &self.bodies[slot])
    }

    /// Look up a body by ID, mutably.
    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.index.get(&id).map(|&slot| &mut self.bodies[slot])
    }

    /// The current slot of a body, for building constraint rows against the
    /// dense slice. Invalidated by removals.
    #[must_use]
    pub fn slot_of(&self, id: BodyId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Number of bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// The bodies as a dense slice, indexable by slot.
    #[must_use]
    pub fn as_slice(&self) -> &[RigidBody] {
        &self.bodies
    }

    /// The bodies as a mutable dense slice.
    pub fn as_mut_slice(&mut self) -> &mut [RigidBody] {
        &mut self.bodies
    }

    /// Iterate over the bodies.
    pub fn iter(&self) -> impl Iterator<Item = &RigidBody> {
        self.bodies.iter()
    }

    /// Iterate over the bodies, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RigidBody> {
        self.bodies.iter_mut()
    }
}
