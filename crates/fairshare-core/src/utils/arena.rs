// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! # Slot Arena
//!
//! A vector of optional slots with a free list. Inserting returns a stable
//! `TypedIndex<T>` handle that stays valid until the value is removed; freed
//! slots are recycled by later inserts. Iteration visits live values in
//! ascending slot order, which keeps solver passes deterministic.
//!
//! Handles are not generation-checked: a handle kept past `remove` may
//! address a recycled slot. Owners that hand out handles are expected to drop
//! them together with the value.

use crate::utils::index::TypedIndex;

/// A slot allocator addressed by `TypedIndex<T>`.
#[derive(Clone)]
pub struct Arena<T, V> {
    slots: Vec<Option<V>>,
    free: Vec<usize>,
    len: usize,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T, V> Default for Arena<T, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, V> Arena<T, V> {
    /// Creates an empty arena.
    #[inline]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _marker: std::marker::PhantomData,
        }
    }

    /// Creates an empty arena with room for `capacity` values.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
            _marker: std::marker::PhantomData,
        }
    }

    /// Returns the number of live values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the arena holds no live value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns one past the highest slot ever used. Useful to size side
    /// tables indexed by handle.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Stores `value` and returns its handle, recycling a freed slot if any.
    pub fn insert(&mut self, value: V) -> TypedIndex<T> {
        self.len += 1;
        match self.free.pop() {
            Some(slot) => {
                debug_assert!(self.slots[slot].is_none());
                self.slots[slot] = Some(value);
                TypedIndex::new(slot)
            }
            None => {
                self.slots.push(Some(value));
                TypedIndex::new(self.slots.len() - 1)
            }
        }
    }

    /// Removes and returns the value behind `index`, if live.
    pub fn remove(&mut self, index: TypedIndex<T>) -> Option<V> {
        let value = self.slots.get_mut(index.get())?.take()?;
        self.free.push(index.get());
        self.len -= 1;
        Some(value)
    }

    /// Returns `true` if `index` addresses a live value.
    #[inline]
    pub fn contains(&self, index: TypedIndex<T>) -> bool {
        matches!(self.slots.get(index.get()), Some(Some(_)))
    }

    /// Returns a reference to the value behind `index`, if live.
    #[inline]
    pub fn get(&self, index: TypedIndex<T>) -> Option<&V> {
        self.slots.get(index.get()).and_then(Option::as_ref)
    }

    /// Returns a mutable reference to the value behind `index`, if live.
    #[inline]
    pub fn get_mut(&mut self, index: TypedIndex<T>) -> Option<&mut V> {
        self.slots.get_mut(index.get()).and_then(Option::as_mut)
    }

    /// Iterates over live values together with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (TypedIndex<T>, &V)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (TypedIndex::new(i), v)))
    }

    /// Iterates mutably over live values together with their handles.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TypedIndex<T>, &mut V)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (TypedIndex::new(i), v)))
    }

    /// Iterates over the handles of live values.
    pub fn indices(&self) -> impl Iterator<Item = TypedIndex<T>> + '_ {
        self.iter().map(|(i, _)| i)
    }

    /// Removes every value.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }
}

impl<T, V> std::ops::Index<TypedIndex<T>> for Arena<T, V>
where
    T: crate::utils::index::TypedIndexTag,
{
    type Output = V;

    #[inline]
    fn index(&self, index: TypedIndex<T>) -> &Self::Output {
        match self.get(index) {
            Some(v) => v,
            None => panic!(
                "called `Arena::index` with a stale or unknown handle: {}",
                index
            ),
        }
    }
}

impl<T, V> std::ops::IndexMut<TypedIndex<T>> for Arena<T, V>
where
    T: crate::utils::index::TypedIndexTag,
{
    #[inline]
    fn index_mut(&mut self, index: TypedIndex<T>) -> &mut Self::Output {
        match self.get_mut(index) {
            Some(v) => v,
            None => panic!(
                "called `Arena::index_mut` with a stale or unknown handle: {}",
                index
            ),
        }
    }
}

impl<T, V> std::fmt::Debug for Arena<T, V>
where
    T: crate::utils::index::TypedIndexTag,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::index::TypedIndexTag;

    #[derive(Clone, Copy, Debug)]
    struct SlotTag;

    impl TypedIndexTag for SlotTag {
        const NAME: &'static str = "Slot";
    }

    type TestArena = Arena<SlotTag, &'static str>;

    #[test]
    fn test_insert_and_get() {
        let mut arena = TestArena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena[a], "a");
        assert_eq!(arena.get(b), Some(&"b"));
    }

    #[test]
    fn test_remove_recycles_slot() {
        let mut arena = TestArena::new();
        let a = arena.insert("a");
        let _b = arena.insert("b");
        assert_eq!(arena.remove(a), Some("a"));
        assert!(!arena.contains(a));
        assert_eq!(arena.remove(a), None);

        let c = arena.insert("c");
        assert_eq!(c.get(), a.get());
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.slot_count(), 2);
    }

    #[test]
    fn test_iteration_is_in_slot_order() {
        let mut arena = TestArena::with_capacity(4);
        let a = arena.insert("a");
        arena.insert("b");
        arena.insert("c");
        arena.remove(a);
        let values: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!["b", "c"]);
        let indices: Vec<usize> = arena.indices().map(|i| i.get()).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_iter_mut_updates_values() {
        let mut arena: Arena<SlotTag, u32> = Arena::new();
        arena.insert(1);
        arena.insert(2);
        for (_, v) in arena.iter_mut() {
            *v *= 10;
        }
        let values: Vec<u32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![10, 20]);
    }

    #[test]
    #[should_panic(expected = "stale or unknown handle")]
    fn test_index_panics_on_stale_handle() {
        let mut arena = TestArena::new();
        let a = arena.insert("a");
        arena.remove(a);
        let _ = arena[a];
    }

    #[test]
    fn test_clear() {
        let mut arena = TestArena::new();
        arena.insert("a");
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.slot_count(), 0);
    }
}
