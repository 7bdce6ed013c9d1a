//! Counter document schema
//!
//! One document per identifier namespace, keyed by the namespace counter
//! key. `last_value` is non-decreasing for the counter's lifetime; it
//! changes only inside the allocator's transaction and is never cached in
//! process. Counters are never soft-deleted and carry no metadata.

use serde::{Deserialize, Serialize};

/// Collection name for counters
pub const COUNTER_COLLECTION: &str = "counters";

/// Counter document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CounterDoc {
    /// Namespace counter key (e.g. "predictionCounter")
    pub _id: String,

    /// Last value handed out; absent document means 0
    pub last_value: i64,
}
