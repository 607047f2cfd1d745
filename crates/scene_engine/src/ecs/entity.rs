//! Entity identifiers

use std::fmt;

/// Permanent entity identifier
///
/// Ids are allocated monotonically starting at 1 and never reused within a
/// [`World`](super::World). The value doubles as the object id written by the
/// picking pass, where 0 means "nothing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    pub(super) fn new(id: u32) -> Self {
        debug_assert!(id != 0, "entity id 0 is reserved for \"no object\"");
        Self(id)
    }

    /// Raw id value
    pub fn get(&self) -> u32 {
        self.0
    }

    /// Interpret a decoded pick value; 0 maps to `None`
    pub fn from_object_id(object_id: u32) -> Option<Self> {
        (object_id != 0).then_some(Self(object_id))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out entity ids for one world
#[derive(Debug)]
pub struct EntityIdAllocator {
    next: Option<u32>,
    allocated: u32,
}

impl Default for EntityIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityIdAllocator {
    /// Allocator whose first id is 1
    pub fn new() -> Self {
        Self { next: Some(1), allocated: 0 }
    }

    /// Allocate the next id, or `None` once every `u32` id has been used
    pub fn allocate(&mut self) -> Option<EntityId> {
        let id = self.next?;
        self.next = id.checked_add(1);
        self.allocated += 1;
        Some(EntityId::new(id))
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: u32) -> Self {
        Self { next: Some(next), allocated: next.saturating_sub(1) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut ids = EntityIdAllocator::new();
        let a = ids.allocate().expect("id");
        let b = ids.allocate().expect("id");
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert!(a < b);
        assert_eq!(ids.allocated(), 2);
    }

    #[test]
    fn test_object_id_zero_is_none() {
        assert_eq!(EntityId::from_object_id(0), None);
        assert_eq!(EntityId::from_object_id(42).map(|id| id.get()), Some(42));
    }

    #[test]
    fn test_exhausted_allocator_never_repeats_an_id() {
        let mut ids = EntityIdAllocator::starting_at(u32::MAX);
        assert_eq!(ids.allocate().map(|id| id.get()), Some(u32::MAX));
        assert_eq!(ids.allocate(), None);
        assert_eq!(ids.allocate(), None);
        assert_eq!(ids.allocated(), u32::MAX);
    }
}
