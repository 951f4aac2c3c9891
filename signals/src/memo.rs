use std::sync::{Arc, Mutex};

/// A single-entry cache keyed by value.
///
/// `get_or_compute` returns the cached output when the supplied key equals the key it was computed
/// for, and recomputes otherwise. Clones share the cache, so a listener holding a clone can
/// [`invalidate`](Memo::invalidate) it when the data behind the key changes.
pub struct Memo<K, V> {
    state: Arc<Mutex<State<K, V>>>,
}

struct State<K, V> {
    entry: Option<(K, V)>,
    computations: usize,
}

impl<K, V> Clone for Memo<K, V> {
    fn clone(&self) -> Self { Self { state: self.state.clone() } }
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self { Self::new() }
}

impl<K, V> Memo<K, V> {
    pub fn new() -> Self { Self { state: Arc::new(Mutex::new(State { entry: None, computations: 0 })) } }

    /// Drop the cached entry so the next read recomputes
    pub fn invalidate(&self) { self.state.lock().unwrap().entry = None; }

    pub fn is_cached(&self) -> bool { self.state.lock().unwrap().entry.is_some() }

    /// How many times the compute closure has actually run
    pub fn computations(&self) -> usize { self.state.lock().unwrap().computations }
}

impl<K, V> Memo<K, V>
where
    K: PartialEq + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce(&K) -> V) -> V {
        {
            let state = self.state.lock().unwrap();
            if let Some((cached_key, value)) = &state.entry {
                if *cached_key == key {
                    return value.clone();
                }
            }
        }

        // compute without holding the lock so the closure may read other memos
        let value = compute(&key);

        let mut state = self.state.lock().unwrap();
        state.computations += 1;
        state.entry = Some((key, value.clone()));
        value
    }
}
