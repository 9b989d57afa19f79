//! Utility types.

use std::{collections::VecDeque, hash::Hash};

type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

/// Insertion-ordered hash map.
pub type Map<K, V> = indexmap::IndexMap<K, V, BuildHasher>;

/// Insertion-ordered hash set.
pub type Set<T> = indexmap::IndexSet<T, BuildHasher>;

/// A FIFO queue that holds each pending value at most once.
#[derive(Debug)]
pub struct Queue<T> {
    queue: VecDeque<T>,
    pending: Set<T>,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            pending: Set::default(),
        }
    }
}

impl<T> Queue<T>
where
    T: Clone + Eq + Hash,
{
    /// Enqueue `value` unless it is already waiting in the queue.
    pub fn push(&mut self, value: T) -> bool {
        if self.pending.insert(value.clone()) {
            self.queue.push_back(value);
            true
        } else {
            false
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        let value = self.queue.pop_front()?;
        self.pending.swap_remove(&value);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T> FromIterator<T> for Queue<T>
where
    T: Clone + Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Self::default();
        for value in iter {
            queue.push(value);
        }
        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_skips_pending_duplicates() {
        let mut queue: Queue<u32> = [1, 2, 1, 3].into_iter().collect();
        assert_eq!(queue.len(), 3);
        assert!(!queue.push(2));
        assert_eq!(queue.pop(), Some(1));
        // 1 is no longer pending, so it may be enqueued again.
        assert!(queue.push(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(1));
        assert!(queue.is_empty());
    }
}
