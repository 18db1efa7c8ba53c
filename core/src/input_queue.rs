//! Input Queue (C2, §4.2): batch queue of pending user inputs accumulated
//! while the agent is reasoning.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Unbounded, ordered queue. Every mutating operation is serialized under a
/// single mutex so `pop_all` is atomic with respect to concurrent `put`s.
#[derive(Default)]
pub struct InputQueue {
    items: Mutex<VecDeque<String>>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, item: impl Into<String>) {
        self.items
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(item.into());
    }

    pub fn peek_all(&self) -> Vec<String> {
        self.items
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Atomically takes every queued item, leaving the queue empty.
    pub fn pop_all(&self) -> Vec<String> {
        let mut guard = self.items.lock().unwrap_or_else(|p| p.into_inner());
        std::mem::take(&mut *guard).into_iter().collect()
    }

    /// Takes up to `n` items from the front of the queue.
    pub fn pop_batch(&self, n: usize) -> Vec<String> {
        let mut guard = self.items.lock().unwrap_or_else(|p| p.into_inner());
        let take = n.min(guard.len());
        guard.drain(..take).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap_or_else(|p| p.into_inner()).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_all_is_atomic_and_clears_the_queue() {
        let q = InputQueue::new();
        q.put("a");
        q.put("b");
        assert_eq!(q.pop_all(), vec!["a", "b"]);
        assert!(q.is_empty());
    }

    #[test]
    fn pop_batch_takes_a_prefix() {
        let q = InputQueue::new();
        q.put("a");
        q.put("b");
        q.put("c");
        assert_eq!(q.pop_batch(2), vec!["a", "b"]);
        assert_eq!(q.pop_all(), vec!["c"]);
    }

    #[test]
    fn peek_all_does_not_drain() {
        let q = InputQueue::new();
        q.put("a");
        assert_eq!(q.peek_all(), vec!["a"]);
        assert_eq!(q.peek_all(), vec!["a"]);
    }
}
