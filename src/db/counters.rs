//! Transactional counter store
//!
//! Backs the sequential-ID allocator. A single attempt reads the counter
//! document, computes the successor, and writes it back inside one MongoDB
//! session transaction, so two racing callers are either serialized by the
//! server or one of them aborts with a transient error and retries with
//! fresh state. The read and the write never happen outside the same
//! transaction - doing so would reintroduce the lost-update race the store
//! exists to prevent.
//!
//! MongoDB requires a replica set (or sharded cluster) for multi-document
//! transactions; standalone servers reject `startTransaction`.

use async_trait::async_trait;
use bson::doc;
use mongodb::error::{Error as MongoError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};
use mongodb::Collection;
use tracing::debug;

use crate::db::mongo::MongoClient;
use crate::db::schemas::{CounterDoc, COUNTER_COLLECTION};
use crate::types::StoreError;

/// One atomic read-modify-write attempt against a namespace counter.
///
/// Implementations must be all-or-nothing: a returned error or a
/// cap-reached outcome leaves the stored counter untouched.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Advance the counter for `key` by one, treating an absent document as
    /// zero. `cap` bounds the committed value: when the successor would
    /// exceed it the attempt aborts without writing and returns `Ok(None)`.
    ///
    /// `Err(StoreError::Conflict)` marks a failed attempt that is safe to
    /// retry; `Err(StoreError::Unavailable)` is terminal.
    async fn transact_increment(&self, key: &str, cap: i64) -> Result<Option<i64>, StoreError>;
}

/// MongoDB-backed counter store using session transactions
pub struct MongoCounterStore {
    mongo: MongoClient,
}

impl MongoCounterStore {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }

    fn collection(&self) -> Collection<CounterDoc> {
        self.mongo
            .inner()
            .database(self.mongo.db_name())
            .collection::<CounterDoc>(COUNTER_COLLECTION)
    }
}

/// Classify a MongoDB error from inside the transaction: transient errors
/// and unknown commit outcomes are retryable conflicts, everything else is
/// an unavailable store.
fn classify(e: MongoError) -> StoreError {
    if e.contains_label(TRANSIENT_TRANSACTION_ERROR)
        || e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
    {
        StoreError::Conflict(e.to_string())
    } else {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl CounterStore for MongoCounterStore {
    async fn transact_increment(&self, key: &str, cap: i64) -> Result<Option<i64>, StoreError> {
        let coll = self.collection();

        let mut session = self
            .mongo
            .inner()
            .start_session()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        session
            .start_transaction()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let result: Result<Option<i64>, MongoError> = async {
            let current = coll
                .find_one(doc! { "_id": key })
                .session(&mut session)
                .await?;

            let last = current.map(|c| c.last_value).unwrap_or(0);
            let next = last + 1;

            if next > cap {
                return Ok(None);
            }

            coll.update_one(doc! { "_id": key }, doc! { "$set": { "last_value": next } })
                .upsert(true)
                .session(&mut session)
                .await?;

            Ok(Some(next))
        }
        .await;

        match result {
            Ok(Some(next)) => match session.commit_transaction().await {
                Ok(()) => {
                    debug!(key, next, "counter advanced");
                    Ok(Some(next))
                }
                Err(e) => Err(classify(e)),
            },
            Ok(None) => {
                // Cap reached: nothing was written, abort to release the txn
                let _ = session.abort_transaction().await;
                Ok(None)
            }
            Err(e) => {
                let _ = session.abort_transaction().await;
                Err(classify(e))
            }
        }
    }
}
