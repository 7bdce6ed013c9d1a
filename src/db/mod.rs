//! MongoDB access layer
//!
//! Typed collection wrapper, document schemas, and the transactional
//! counter store backing the sequential-ID allocator.

pub mod counters;
pub mod directory;
pub mod mongo;
pub mod schemas;

pub use counters::{CounterStore, MongoCounterStore};
pub use directory::MongoRoleDirectory;
pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
