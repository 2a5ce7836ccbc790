//! Thread-safe shared stores — the concurrency primitive of the design.
//!
//! Every store is a `(lock, value)` pair. Writers hold the lock only for the
//! duration of the mutation; `get_all`/`get` return an owned copy so readers
//! release the lock immediately and process without holding it (section 4.10).
//! This mirrors every `stores/*.py` file in the original tool, which are all
//! a `threading.Lock` guarding a plain dict with the same four operations.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, RwLock};

/// A store holding a single optional value, e.g. the current formation
/// descriptor or the current frame detections. `Mutex`-backed: single-item
/// stores here see one writer and a handful of readers per cycle, not the
/// kind of reader contention that would justify an `RwLock`.
pub struct ValueStore<T: Clone> {
    inner: Mutex<Option<T>>,
}

impl<T: Clone> ValueStore<T> {
    pub fn new() -> Self {
        Self { inner: Mutex::new(None) }
    }

    pub fn update(&self, value: T) {
        *self.inner.lock().expect("store lock poisoned") = Some(value);
    }

    pub fn get(&self) -> Option<T> {
        self.inner.lock().expect("store lock poisoned").clone()
    }

    pub fn clear(&self) {
        *self.inner.lock().expect("store lock poisoned") = None;
    }
}

impl<T: Clone> Default for ValueStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A store mapping small integer/keyed ids to values, e.g. per-agent pose or
/// per-link pose. `RwLock`-backed: these stores are read by several stages
/// every cycle (APF, PathCrossingResolver, PositionUpdater all read the
/// agent pose store) and written by exactly one, so readers genuinely
/// contend with each other far more than with the single writer.
pub struct MapStore<K: Eq + Hash + Clone, V: Clone> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> MapStore<K, V> {
    pub fn new() -> Self {
        Self { inner: RwLock::new(HashMap::new()) }
    }

    pub fn update(&self, id: K, value: V) {
        self.inner.write().expect("store lock poisoned").insert(id, value);
    }

    pub fn update_batch(&self, values: HashMap<K, V>) {
        self.inner.write().expect("store lock poisoned").extend(values);
    }

    pub fn get(&self, id: &K) -> Option<V> {
        self.inner.read().expect("store lock poisoned").get(id).cloned()
    }

    pub fn get_all(&self) -> HashMap<K, V> {
        self.inner.read().expect("store lock poisoned").clone()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for MapStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
