//! Slot-map backed handle tables shared by the device implementations

use slotmap::{Key, KeyData, SlotMap};

use crate::render::{RenderError, RenderResult};

/// Maps raw handle values to backend resources
///
/// Keys are generational, so a handle to a destroyed resource never aliases
/// a newer one.
#[derive(Debug)]
pub(crate) struct ResourceTable<K: Key, V> {
    kind: &'static str,
    slots: SlotMap<K, V>,
}

impl<K: Key, V> ResourceTable<K, V> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self { kind, slots: SlotMap::with_key() }
    }

    pub(crate) fn insert(&mut self, value: V) -> u64 {
        self.slots.insert(value).data().as_ffi()
    }

    pub(crate) fn get(&self, id: u64) -> RenderResult<&V> {
        self.slots.get(Self::key(id)).ok_or(RenderError::InvalidHandle { kind: self.kind, id })
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> RenderResult<&mut V> {
        let kind = self.kind;
        self.slots.get_mut(Self::key(id)).ok_or(RenderError::InvalidHandle { kind, id })
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<V> {
        self.slots.remove(Self::key(id))
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = V> + '_ {
        self.slots.drain().map(|(_, value)| value)
    }

    fn key(id: u64) -> K {
        K::from(KeyData::from_ffi(id))
    }
}
