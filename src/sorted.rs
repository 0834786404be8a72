use std::hash::Hash;

use crate::list::{Iter, LinkMap, NodeRef};

/// A [`LinkMap`] that keeps its entries sorted by key.
///
/// A parallel index of keys, kept sorted ascending, lets insertion find its
/// position with a binary search and splice in O(1); reads never re-sort.
/// Keys are immutable once inserted: `set` on an existing key updates the
/// value in place and leaves the position alone.
pub struct SortedLinkMap<K, V> {
    inner: LinkMap<K, V>,
    positions: Vec<K>,
}

impl<K: Ord + Eq + Hash + Clone, V> SortedLinkMap<K, V> {
    pub fn new() -> Self {
        SortedLinkMap { inner: LinkMap::new(), positions: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    /// Inserts at the key's sorted position, or updates an existing key's
    /// value in place. Returns the replaced value, if any.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        if self.inner.contains_key(&key) {
            return self.inner.set(key, value);
        }
        if self.positions.is_empty() || key <= self.positions[0] {
            self.inner.unshift(key.clone(), value);
            self.positions.insert(0, key);
        } else if key >= self.positions[self.positions.len() - 1] {
            self.inner.push(key.clone(), value);
            self.positions.push(key);
        } else {
            // nearest existing key not less than the new one
            let at = match self.positions.binary_search(&key) {
                Ok(at) | Err(at) => at,
            };
            if let Some(node) = self.inner.find(&self.positions[at]) {
                self.inner.insert_before(node, key.clone(), value);
                self.positions.insert(at, key);
            }
        }
        None
    }

    pub fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        if !self.inner.contains_key(&key) {
            self.set(key.clone(), default());
        }
        self.inner.get_mut(&key).expect("key was just inserted")
    }

    /// The data set is always sorted, so there is no tail distinct from the
    /// sorted position: this is [`set`](Self::set).
    pub fn push(&mut self, key: K, value: V) -> Option<V> {
        self.set(key, value)
    }

    /// See [`push`](Self::push).
    pub fn unshift(&mut self, key: K, value: V) -> Option<V> {
        self.set(key, value)
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        let value = self.inner.delete(key)?;
        if let Ok(at) = self.positions.binary_search(key) {
            self.positions.remove(at);
        }
        Some(value)
    }

    pub fn shift(&mut self) -> Option<(K, V)> {
        let entry = self.inner.shift()?;
        self.positions.remove(0);
        Some(entry)
    }

    pub fn pop(&mut self) -> Option<(K, V)> {
        let entry = self.inner.pop()?;
        self.positions.pop();
        Some(entry)
    }

    /// The minimum key, in O(1).
    pub fn first_key(&self) -> Option<&K> {
        self.positions.first()
    }

    pub fn first(&self) -> Option<&V> {
        self.inner.first()
    }

    pub fn last(&self) -> Option<&V> {
        self.inner.last()
    }

    pub fn first_node(&self) -> Option<NodeRef> {
        self.inner.first_node()
    }

    pub fn last_node(&self) -> Option<NodeRef> {
        self.inner.last_node()
    }

    pub fn find(&self, key: &K) -> Option<NodeRef> {
        self.inner.find(key)
    }

    pub fn node(&self, node: NodeRef) -> Option<(&K, &V)> {
        self.inner.node(node)
    }

    pub fn next(&self, node: NodeRef) -> Option<NodeRef> {
        self.inner.next(node)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.inner.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }
}

impl<K: Ord + Eq + Hash + Clone, V> Default for SortedLinkMap<K, V> {
    fn default() -> Self {
        SortedLinkMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_of(map: &SortedLinkMap<i32, &'static str>) -> Vec<i32> {
        map.keys().copied().collect()
    }

    #[test]
    fn insertion_keeps_keys_ascending() {
        let mut map = SortedLinkMap::new();
        map.set(30, "c");
        map.set(10, "a");
        map.set(20, "b");
        assert_eq!(keys_of(&map), [10, 20, 30]);
        assert_eq!(map.first(), Some(&"a"));
        assert_eq!(map.last(), Some(&"c"));
        assert_eq!(map.first_key(), Some(&10));
    }

    #[test]
    fn a_key_between_two_existing_keys_lands_between_them() {
        let mut map = SortedLinkMap::new();
        map.set(10, "a");
        map.set(30, "c");
        map.set(20, "b");
        assert_eq!(keys_of(&map), [10, 20, 30]);

        map.set(25, "x");
        map.set(15, "y");
        assert_eq!(keys_of(&map), [10, 15, 20, 25, 30]);
    }

    #[test]
    fn set_on_an_existing_key_updates_without_moving() {
        let mut map = SortedLinkMap::new();
        map.set(10, "a");
        map.set(20, "b");
        map.set(30, "c");

        assert_eq!(map.set(20, "B"), Some("b"));
        assert_eq!(keys_of(&map), [10, 20, 30]);
        assert_eq!(map.get(&20), Some(&"B"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn push_and_unshift_behave_as_sorted_insert() {
        let mut map = SortedLinkMap::new();
        map.push(20, "b");
        map.unshift(30, "c");
        map.push(10, "a");
        assert_eq!(keys_of(&map), [10, 20, 30]);
    }

    #[test]
    fn delete_keeps_the_index_in_step() {
        let mut map = SortedLinkMap::new();
        for key in [10, 20, 30, 40] {
            map.set(key, "v");
        }
        assert_eq!(map.delete(&20), Some("v"));
        assert_eq!(map.delete(&20), None);
        assert_eq!(keys_of(&map), [10, 30, 40]);

        map.set(25, "w");
        assert_eq!(keys_of(&map), [10, 25, 30, 40]);
    }

    #[test]
    fn shift_and_pop_take_the_extremes() {
        let mut map = SortedLinkMap::new();
        map.set(20, "b");
        map.set(10, "a");
        map.set(30, "c");

        assert_eq!(map.shift(), Some((10, "a")));
        assert_eq!(map.pop(), Some((30, "c")));
        assert_eq!(map.first_key(), Some(&20));
        assert_eq!(map.shift(), Some((20, "b")));
        assert_eq!(map.shift(), None);
        assert!(map.is_empty());
    }

    #[test]
    fn random_order_insertion_ends_up_sorted() {
        let mut map = SortedLinkMap::new();
        for key in [7, 2, 9, 4, 1, 8, 3, 6, 5] {
            map.set(key, "v");
        }
        assert_eq!(keys_of(&map), [1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }
}
