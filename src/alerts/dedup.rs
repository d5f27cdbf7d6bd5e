use std::collections::HashSet;

use crate::feed::models::AlertKey;

/// Keys of every alert already claimed in this process.
///
/// Grows without bound: the monitoring horizon is the process lifetime and
/// entries are never expired one by one. `clear` is the only way to forget.
#[derive(Debug, Default)]
pub struct SeenSet {
    keys: HashSet<AlertKey>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: AlertKey) -> bool {
        self.keys.insert(key)
    }

    pub fn contains(&self, key: &AlertKey) -> bool {
        self.keys.contains(key)
    }

    pub fn remove(&mut self, key: &AlertKey) -> bool {
        self.keys.remove(key)
    }

    /// Forget every key. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.keys.len();
        self.keys.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
