//! Slot-recycling vector with stable indices.
//!
//! Geometry records are referenced by long-lived [`crate::Geometry`] handles scattered
//! across the document tree. Erasing a record must not shift any other record, so
//! erased slots are kept in place and recycled through a free list instead of
//! compacting the storage.

use core::fmt;
use core::ops::{Index, IndexMut};
use serde::{Deserialize, Serialize};

/// Opaque index into a [`StableVec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StableIndex(u32);

impl StableIndex {
    /// Sentinel that never refers to a slot.
    pub const INVALID: Self = Self(u32::MAX);

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    #[inline]
    const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl Default for StableIndex {
    #[inline]
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for StableIndex {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(formatter, "#{}", self.0)
        } else {
            formatter.write_str("#invalid")
        }
    }
}

/// Vector whose indices survive unrelated insertions and erasures.
///
/// `insert` reuses the most recently freed slot before growing. An index is only
/// handed out again after it has been erased, so no two live values ever share one.
#[derive(Clone)]
pub struct StableVec<T> {
    slots: Vec<Option<T>>,
    free_slots: Vec<StableIndex>,
}

impl<T> StableVec<T> {
    #[inline]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
        }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_slots: Vec::new(),
        }
    }

    /// Store `value` and return its index.
    pub fn insert(&mut self, value: T) -> StableIndex {
        if let Some(index) = self.free_slots.pop() {
            debug_assert!(self.slots[index.slot()].is_none(), "free list points at a live slot");
            self.slots[index.slot()] = Some(value);
            return index;
        }

        let raw = u32::try_from(self.slots.len())
            .ok()
            .filter(|raw| *raw != u32::MAX);
        let Some(raw) = raw else {
            // 2^32 - 1 live slots; nothing sensible can follow.
            log::error!(target: "renderer", "StableVec exhausted its index space");
            return StableIndex::INVALID;
        };
        self.slots.push(Some(value));
        StableIndex(raw)
    }

    /// Remove the value at `index` and free its slot for reuse.
    ///
    /// Returns `None` and logs an error when `index` is out of range or already free;
    /// that means a handle was released twice. The free list is left untouched.
    pub fn erase(&mut self, index: StableIndex) -> Option<T> {
        let Some(value) = self.slots.get_mut(index.slot()).and_then(Option::take) else {
            log::error!(target: "renderer", "StableVec::erase on free or unknown index {index}");
            return None;
        };
        self.free_slots.push(index);
        Some(value)
    }

    #[inline]
    pub fn get(&self, index: StableIndex) -> Option<&T> {
        self.slots.get(index.slot()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, index: StableIndex) -> Option<&mut T> {
        self.slots.get_mut(index.slot()).and_then(Option::as_mut)
    }

    #[inline]
    pub fn contains(&self, index: StableIndex) -> bool {
        self.get(index).is_some()
    }

    /// Number of live values.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live values with their indices, skipping free slots.
    pub fn iter(&self) -> impl Iterator<Item = (StableIndex, &T)> {
        self.slots.iter().enumerate().filter_map(|(slot, value)| {
            value
                .as_ref()
                .map(|value| (StableIndex(slot as u32), value))
        })
    }

    /// Mutable access to every live value, skipping free slots.
    pub fn for_each<F>(&mut self, mut func: F)
    where
        F: FnMut(StableIndex, &mut T),
    {
        for (slot, value) in self.slots.iter_mut().enumerate() {
            if let Some(value) = value.as_mut() {
                func(StableIndex(slot as u32), value);
            }
        }
    }

    /// Drop every value and forget all slots.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_slots.clear();
    }

    /// Remove every live value, handing ownership to the caller.
    pub fn drain(&mut self) -> Vec<T> {
        self.free_slots.clear();
        self.slots.drain(..).flatten().collect()
    }
}

impl<T> Default for StableVec<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for StableVec<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_map()
            .entries(self.iter().map(|(index, value)| (index.0, value)))
            .finish()
    }
}

impl<T> Index<StableIndex> for StableVec<T> {
    type Output = T;

    /// # Panics
    /// Panics if `index` is out of range or refers to a freed slot.
    #[inline]
    fn index(&self, index: StableIndex) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic_on_free_slot(index),
        }
    }
}

impl<T> IndexMut<StableIndex> for StableVec<T> {
    #[inline]
    fn index_mut(&mut self, index: StableIndex) -> &mut T {
        match self.get_mut(index) {
            Some(value) => value,
            None => panic_on_free_slot(index),
        }
    }
}

#[cold]
#[allow(clippy::panic, reason = "indexing a freed slot is a contract violation, like Vec out-of-bounds")]
fn panic_on_free_slot(index: StableIndex) -> ! {
    panic!("StableVec: index {index} is out of range or refers to a freed slot")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn insert_and_lookup() {
        let mut vec = StableVec::new();
        let first = vec.insert("a");
        let second = vec.insert("b");
        assert_ne!(first, second);
        assert_eq!(vec[first], "a");
        assert_eq!(vec[second], "b");
        assert_eq!(vec.len(), 2);
    }

    #[test]
    fn erase_keeps_other_indices_stable() {
        let mut vec = StableVec::new();
        let first = vec.insert(1);
        let second = vec.insert(2);
        let third = vec.insert(3);

        assert_eq!(vec.erase(second), Some(2));
        assert_eq!(vec[first], 1);
        assert_eq!(vec[third], 3);
        assert!(!vec.contains(second));
        assert_eq!(vec.len(), 2);
    }

    #[test]
    fn freed_slot_is_recycled() {
        let mut vec = StableVec::new();
        let first = vec.insert(1);
        vec.insert(2);
        vec.erase(first);
        let reused = vec.insert(3);
        assert_eq!(reused, first);
        assert_eq!(vec[reused], 3);
    }

    #[test]
    fn double_erase_is_rejected() {
        let mut vec = StableVec::new();
        let index = vec.insert(1);
        assert_eq!(vec.erase(index), Some(1));
        assert_eq!(vec.erase(index), None);
        assert_eq!(vec.erase(StableIndex::INVALID), None);
        assert!(vec.is_empty());
    }

    #[test]
    fn rejected_erase_keeps_free_list_intact() {
        let mut vec = StableVec::new();
        let index = vec.insert(1);
        vec.erase(index);
        assert_eq!(vec.erase(index), None);
        assert_eq!(vec.erase(StableIndex(7)), None);

        let first = vec.insert(2);
        let second = vec.insert(3);
        assert_eq!(first, index);
        assert_ne!(first, second);
        assert_eq!(vec.len(), 2);
        assert_eq!(vec[first], 2);
        assert_eq!(vec[second], 3);
    }

    #[test]
    #[should_panic(expected = "freed slot")]
    fn indexing_freed_slot_panics() {
        let mut vec = StableVec::new();
        let index = vec.insert(1);
        vec.erase(index);
        let _value = vec[index];
    }

    #[test]
    fn iteration_skips_free_slots() {
        let mut vec = StableVec::new();
        let first = vec.insert(10);
        let second = vec.insert(20);
        vec.insert(30);
        vec.erase(second);

        let live: Vec<i32> = vec.iter().map(|(_, value)| *value).collect();
        assert_eq!(live, vec![10, 30]);

        vec.for_each(|_, value| *value += 1);
        assert_eq!(vec[first], 11);
    }

    /// Run a deterministic pseudo-random insert/erase sequence and check that no
    /// index is ever shared by two live values.
    #[test]
    fn live_indices_never_alias() {
        let mut vec = StableVec::new();
        let mut live: HashMap<StableIndex, u64> = HashMap::new();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;

        for step in 0..2_000_u64 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;

            if seed % 3 == 0 && !live.is_empty() {
                let victim = *live.keys().min().unwrap_or(&StableIndex::INVALID);
                let expected = live.remove(&victim);
                assert_eq!(vec.erase(victim), expected);
            } else {
                let index = vec.insert(step);
                assert!(live.insert(index, step).is_none(), "index {index} handed out twice");
            }

            assert_eq!(vec.len(), live.len());
        }

        for (index, value) in &live {
            assert_eq!(vec[*index], *value);
        }
    }

    #[test]
    fn drain_returns_live_values() {
        let mut vec = StableVec::new();
        let first = vec.insert(1);
        vec.insert(2);
        vec.erase(first);
        assert_eq!(vec.drain(), vec![2]);
        assert!(vec.is_empty());
    }
}
