//! Recency-based eviction policy for bounded tiers

use std::collections::VecDeque;

use crate::cache::types::CacheKey;

/// Access order of a bounded tier's keys, least recently used first.
///
/// Holds each key at most once. The owner keeps it a permutation of its
/// entry keys by calling [`LruOrder::touch`] on every hit and insert and
/// [`LruOrder::remove`] on every removal.
#[derive(Debug, Clone, Default)]
pub struct LruOrder {
    queue: VecDeque<CacheKey>,
}

impl LruOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
        }
    }

    /// Mark `key` as most recently used, inserting it if absent
    pub fn touch(&mut self, key: &str) {
        if let Some(pos) = self.queue.iter().position(|k| k == key) {
            if pos + 1 == self.queue.len() {
                return;
            }
            if let Some(existing) = self.queue.remove(pos) {
                self.queue.push_back(existing);
            }
        } else {
            self.queue.push_back(key.to_string());
        }
    }

    /// Remove and return the least recently used key
    pub fn pop_victim(&mut self) -> Option<CacheKey> {
        self.queue.pop_front()
    }

    /// The key that would be evicted next
    pub fn peek_victim(&self) -> Option<&str> {
        self.queue.front().map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.queue.iter().position(|k| k == key) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Keys from least to most recently used
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }
}
