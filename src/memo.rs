use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::trace;

/// Read-through cache for pure computations.
///
/// The lock is only held to look up and insert, never while computing, so two
/// callers can race on the same key. Both compute; the first to insert wins
/// and every caller gets that value.
pub struct Memo<K, V> {
    entries: Mutex<HashMap<K, Arc<V>>>,
}

impl<K: Eq + Hash + Clone, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V> Memo<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<V>>> {
        // entries are only ever inserted whole, so a poisoned map is still valid
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.lock().get(key).cloned()
    }

    pub fn get_or_compute(&self, key: &K, compute: impl FnOnce() -> V) -> Arc<V> {
        if let Some(hit) = self.get(key) {
            trace!("memo hit");
            return hit;
        }
        let value = Arc::new(compute());
        Arc::clone(self.lock().entry(key.clone()).or_insert(value))
    }

    /// Like [`get_or_compute`](Self::get_or_compute) for fallible
    /// computations; failures are returned and not cached.
    pub fn try_get_or_compute<E>(
        &self,
        key: &K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some(hit) = self.get(key) {
            trace!("memo hit");
            return Ok(hit);
        }
        let value = Arc::new(compute()?);
        Ok(Arc::clone(self.lock().entry(key.clone()).or_insert(value)))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Barrier,
    };
    use std::thread;

    #[test]
    fn computes_once_per_key() {
        let memo = Memo::new();
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            "value".to_string()
        };

        assert_eq!(*memo.get_or_compute(&"k", compute), "value");
        assert_eq!(*memo.get_or_compute(&"k", compute), "value");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let memo: Memo<u8, u8> = Memo::new();
        let err: Result<Arc<u8>, &str> = memo.try_get_or_compute(&1, || Err("boom"));
        assert!(err.is_err());
        assert!(memo.is_empty());
        let ok: Result<Arc<u8>, &str> = memo.try_get_or_compute(&1, || Ok(7));
        assert_eq!(*ok.unwrap(), 7);
    }

    #[test]
    fn racing_writers_all_see_the_first_insert() {
        let memo = Arc::new(Memo::new());
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let memo = Arc::clone(&memo);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    memo.get_or_compute(&"shared", || {
                        barrier.wait();
                        i
                    })
                })
            })
            .collect();

        let results: Vec<Arc<i32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(memo.len(), 1);
    }
}
