//! In-memory cache of loaded models.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::model::Classifier;
use crate::registry::ModelSource;

#[derive(Default)]
struct CacheState {
    models: HashMap<String, Arc<dyn Classifier>>,
    // insertion order, oldest first
    order: VecDeque<String>,
}

/// Loaded models keyed by logical name.
///
/// Construct one at startup and share it by `Arc`. The lock is held across
/// check-then-load, so a name is loaded at most once even when several threads
/// ask for it first at the same time. Failed loads are not remembered.
pub struct ModelCache {
    capacity: usize,
    state: Mutex<CacheState>,
    metrics: MetricsCollector,
}

impl ModelCache {
    /// Cache holding at most `capacity` models (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
            metrics: MetricsCollector::default(),
        }
    }

    // the state is only mutated after a successful load, so a poisoned lock
    // still guards consistent data
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached model for `name`, loading it from `source` on first use
    pub fn get_or_load(&self, source: &dyn ModelSource, name: &str) -> Result<Arc<dyn Classifier>> {
        let mut state = self.lock();
        if let Some(model) = state.models.get(name) {
            debug!(model = name, "Model cache hit");
            return Ok(Arc::clone(model));
        }

        let loaded = source.load(name);
        self.metrics.record_model_load(name, loaded.is_ok());
        let model = loaded?;

        if state.models.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.models.remove(&oldest);
                info!(evicted = %oldest, "Evicted model from cache");
            }
        }
        state.models.insert(name.to_string(), Arc::clone(&model));
        state.order.push_back(name.to_string());
        self.metrics.update_model_cache_size(state.models.len());

        Ok(model)
    }

    /// True when `name` is currently loaded
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lock().models.contains_key(name)
    }

    /// Number of loaded models
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().models.len()
    }

    /// True when nothing is loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of loaded models
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every loaded model
    pub fn clear(&self) {
        let mut state = self.lock();
        state.models.clear();
        state.order.clear();
        self.metrics.update_model_cache_size(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WellbeingError;
    use crate::features::AlignedFeatures;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Constant;

    impl Classifier for Constant {
        fn predict(&self, _features: &AlignedFeatures) -> Result<usize> {
            Ok(1)
        }

        fn expected_columns(&self) -> Option<&[String]> {
            None
        }
    }

    #[derive(Default)]
    struct CountingSource {
        loads: AtomicUsize,
    }

    impl ModelSource for CountingSource {
        fn load(&self, name: &str) -> Result<Arc<dyn Classifier>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if name == "broken" {
                return Err(WellbeingError::ModelSource("unreachable".to_string()));
            }
            Ok(Arc::new(Constant))
        }
    }

    #[test]
    fn test_second_lookup_is_served_from_cache() {
        let cache = ModelCache::new(4);
        let source = CountingSource::default();
        let first = cache.get_or_load(&source, "mood").unwrap();
        let second = cache.get_or_load(&source, "mood").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_retried_next_time() {
        let cache = ModelCache::new(4);
        let source = CountingSource::default();
        assert!(cache.get_or_load(&source, "broken").is_err());
        assert!(cache.get_or_load(&source, "broken").is_err());
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oldest_entry_evicted_at_capacity() {
        let cache = ModelCache::new(2);
        let source = CountingSource::default();
        for name in ["a", "b", "c"] {
            cache.get_or_load(&source, name).unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b") && cache.contains("c"));
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let cache = Arc::new(ModelCache::new(4));
        let source = Arc::new(CountingSource::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let source = Arc::clone(&source);
                std::thread::spawn(move || cache.get_or_load(source.as_ref(), "energy").map(|_| ()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }
}
