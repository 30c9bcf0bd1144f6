use std::collections::{HashMap, VecDeque};

/// Bounded map keyed by video id with least-recently-inserted eviction.
///
/// Overwriting an existing key keeps its original position; reads never
/// reorder entries.
#[derive(Debug, Clone)]
pub struct BoundedCache<V> {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, V>,
}

impl<V> BoundedCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            entries: HashMap::with_capacity(capacity + 1),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite `key`, evicting the oldest other entry once over capacity
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key.clone());
        }

        if self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.front().cloned() {
                if oldest != key {
                    self.order.pop_front();
                    self.entries.remove(&oldest);
                    tracing::trace!("Evicted cache entry for {}", oldest);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys from oldest to newest insertion
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}
