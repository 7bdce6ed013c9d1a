//! Sequential ID allocation
//!
//! Hands out strictly increasing, collision-free, human-readable
//! identifiers per namespace. The counter is advanced by an atomic
//! read-modify-write in the store ([`crate::db::CounterStore`]); this
//! module owns the bounded retry loop, the formatting template, and the
//! error taxonomy.
//!
//! Allocation is not ordered by request arrival - two racing callers may
//! receive their values in either order - but no value is ever handed out
//! twice, and failed attempts commit no increment, so the committed
//! sequence for a namespace is gapless. An identifier stays allocated even
//! if the caller abandons the request after commit.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::CounterStore;
use crate::types::StoreError;

/// A logical bucket of sequential identifiers
#[derive(Debug, Clone, Copy)]
pub struct Namespace {
    /// Counter document key in the store
    pub counter_key: &'static str,
    /// String prefix of formatted identifiers
    pub prefix: &'static str,
    /// Fixed decimal width of the numeric part
    pub width: u32,
}

impl Namespace {
    /// Largest counter value representable at this width.
    ///
    /// Values beyond it would widen the field and break string-sort
    /// monotonicity, so allocation fails instead.
    pub fn max_value(&self) -> i64 {
        10i64.pow(self.width) - 1
    }

    /// Render a counter value as a public identifier
    pub fn format(&self, value: i64) -> String {
        format!("{}{:0width$}", self.prefix, value, width = self.width as usize)
    }
}

/// Namespace for prediction identifiers: PR001, PR002, ...
pub const PREDICTIONS: Namespace = Namespace {
    counter_key: "predictionCounter",
    prefix: "PR",
    width: 3,
};

/// A freshly allocated identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedId {
    /// Raw counter value
    pub value: i64,
    /// Formatted public identifier
    pub id: String,
}

/// Allocation failures; all terminal for the current request
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    /// The namespace key is empty
    #[error("namespace counter key must be non-empty")]
    EmptyNamespace,

    /// The transactional store cannot be reached
    #[error("counter store unavailable: {0}")]
    StoreUnavailable(String),

    /// Contention persisted through the retry budget; retryable by caller
    #[error("counter conflict persisted after {attempts} attempts")]
    ConflictExceeded { attempts: u32 },

    /// The fixed-width format cannot represent the next value
    #[error("namespace '{namespace}' exhausted at width {width}")]
    NamespaceExhausted { namespace: String, width: u32 },
}

/// Monotonic identifier allocator over a transactional counter store
pub struct SequentialIdAllocator {
    store: Arc<dyn CounterStore>,
    max_attempts: u32,
}

impl SequentialIdAllocator {
    pub fn new(store: Arc<dyn CounterStore>, max_attempts: u32) -> Self {
        debug_assert!(max_attempts >= 1);
        Self { store, max_attempts }
    }

    /// Allocate the next identifier for `namespace`.
    ///
    /// Exactly one durable counter increment per success, zero on any
    /// failure path: the width cap is enforced inside the atomic attempt,
    /// so an exhausted namespace commits nothing.
    pub async fn allocate(&self, namespace: &Namespace) -> Result<AllocatedId, AllocError> {
        if namespace.counter_key.is_empty() {
            return Err(AllocError::EmptyNamespace);
        }

        let cap = namespace.max_value();

        for attempt in 1..=self.max_attempts {
            match self.store.transact_increment(namespace.counter_key, cap).await {
                Ok(Some(value)) => {
                    return Ok(AllocatedId {
                        value,
                        id: namespace.format(value),
                    });
                }
                Ok(None) => {
                    warn!(
                        namespace = namespace.counter_key,
                        width = namespace.width,
                        "identifier namespace exhausted"
                    );
                    return Err(AllocError::NamespaceExhausted {
                        namespace: namespace.counter_key.to_string(),
                        width: namespace.width,
                    });
                }
                Err(StoreError::Conflict(reason)) => {
                    debug!(
                        namespace = namespace.counter_key,
                        attempt,
                        %reason,
                        "counter transaction conflict, retrying"
                    );
                }
                Err(StoreError::Unavailable(reason)) => {
                    return Err(AllocError::StoreUnavailable(reason));
                }
            }
        }

        Err(AllocError::ConflictExceeded {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// In-memory counter store mirroring the all-or-nothing contract
    #[derive(Default)]
    struct MemoryCounterStore {
        counters: Mutex<HashMap<String, i64>>,
    }

    #[async_trait]
    impl CounterStore for MemoryCounterStore {
        async fn transact_increment(&self, key: &str, cap: i64) -> Result<Option<i64>, StoreError> {
            let mut counters = self.counters.lock().unwrap();
            let last = counters.get(key).copied().unwrap_or(0);
            let next = last + 1;
            if next > cap {
                return Ok(None);
            }
            counters.insert(key.to_string(), next);
            Ok(Some(next))
        }
    }

    /// Store that conflicts a fixed number of times before succeeding
    struct FlakyCounterStore {
        inner: MemoryCounterStore,
        failures_left: AtomicU32,
    }

    impl FlakyCounterStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryCounterStore::default(),
                failures_left: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl CounterStore for FlakyCounterStore {
        async fn transact_increment(&self, key: &str, cap: i64) -> Result<Option<i64>, StoreError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                // A conflicted attempt never commits
                return Err(StoreError::Conflict("write conflict".to_string()));
            }
            self.inner.transact_increment(key, cap).await
        }
    }

    const TEST_NS: Namespace = Namespace {
        counter_key: "testCounter",
        prefix: "PR",
        width: 3,
    };

    #[tokio::test]
    async fn formats_with_prefix_and_padding() {
        let store = Arc::new(MemoryCounterStore::default());
        // Pre-position the counter at 6 so the next allocation is 7
        store
            .counters
            .lock()
            .unwrap()
            .insert("testCounter".to_string(), 6);

        let alloc = SequentialIdAllocator::new(store, 5);
        let id = alloc.allocate(&TEST_NS).await.unwrap();
        assert_eq!(id.value, 7);
        assert_eq!(id.id, "PR007");
    }

    #[tokio::test]
    async fn fresh_namespace_starts_at_one() {
        let alloc = SequentialIdAllocator::new(Arc::new(MemoryCounterStore::default()), 5);
        let id = alloc.allocate(&TEST_NS).await.unwrap();
        assert_eq!(id.value, 1);
        assert_eq!(id.id, "PR001");
    }

    #[tokio::test]
    async fn concurrent_allocations_are_dense_and_unique() {
        let store = Arc::new(MemoryCounterStore::default());
        let alloc = Arc::new(SequentialIdAllocator::new(store, 5));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let alloc = Arc::clone(&alloc);
            handles.push(tokio::spawn(async move {
                alloc.allocate(&TEST_NS).await.unwrap()
            }));
        }

        let mut values: Vec<i64> = Vec::new();
        for h in handles {
            values.push(h.await.unwrap().value);
        }

        values.sort_unstable();
        let expected: Vec<i64> = (1..=50).collect();
        assert_eq!(values, expected, "no gaps, no duplicates");
    }

    #[tokio::test]
    async fn retries_through_transient_conflicts() {
        let store = Arc::new(FlakyCounterStore::new(3));
        let alloc = SequentialIdAllocator::new(store, 5);

        let id = alloc.allocate(&TEST_NS).await.unwrap();
        assert_eq!(id.id, "PR001");
    }

    #[tokio::test]
    async fn surfaces_conflict_exceeded_after_budget() {
        // More failures than the retry budget
        let store = Arc::new(FlakyCounterStore::new(10));
        let alloc = SequentialIdAllocator::new(Arc::clone(&store) as Arc<dyn CounterStore>, 5);

        let err = alloc.allocate(&TEST_NS).await.unwrap_err();
        assert!(matches!(err, AllocError::ConflictExceeded { attempts: 5 }));
        // Failed attempts must not have advanced the counter
        assert!(store.inner.counters.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_namespace_fails_without_increment() {
        let store = Arc::new(MemoryCounterStore::default());
        store
            .counters
            .lock()
            .unwrap()
            .insert("testCounter".to_string(), 999);

        let alloc = SequentialIdAllocator::new(Arc::clone(&store) as Arc<dyn CounterStore>, 5);
        let err = alloc.allocate(&TEST_NS).await.unwrap_err();
        assert!(matches!(err, AllocError::NamespaceExhausted { .. }));
        // The counter stays at 999 - never truncated, never widened
        assert_eq!(
            store.counters.lock().unwrap().get("testCounter").copied(),
            Some(999)
        );
    }

    #[tokio::test]
    async fn store_outage_propagates_without_retry_loop_masking() {
        struct DownStore;

        #[async_trait]
        impl CounterStore for DownStore {
            async fn transact_increment(&self, _: &str, _: i64) -> Result<Option<i64>, StoreError> {
                Err(StoreError::Unavailable("connection refused".to_string()))
            }
        }

        let alloc = SequentialIdAllocator::new(Arc::new(DownStore), 5);
        let err = alloc.allocate(&TEST_NS).await.unwrap_err();
        assert!(matches!(err, AllocError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn empty_namespace_key_is_rejected() {
        const EMPTY: Namespace = Namespace {
            counter_key: "",
            prefix: "PR",
            width: 3,
        };
        let alloc = SequentialIdAllocator::new(Arc::new(MemoryCounterStore::default()), 5);
        assert!(matches!(
            alloc.allocate(&EMPTY).await.unwrap_err(),
            AllocError::EmptyNamespace
        ));
    }

    #[test]
    fn formatted_ids_sort_with_their_values() {
        // String order matches numeric order across the whole width
        assert!(TEST_NS.format(1) < TEST_NS.format(2));
        assert!(TEST_NS.format(99) < TEST_NS.format(100));
        assert!(TEST_NS.format(999) > TEST_NS.format(998));
        assert_eq!(TEST_NS.max_value(), 999);
    }
}
