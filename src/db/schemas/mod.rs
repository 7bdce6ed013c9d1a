//! Document schemas
//!
//! MongoDB document structures for users, medical records, predictions,
//! notifications, and the per-namespace ID counters.

mod counter;
mod metadata;
mod notification;
mod prediction;
mod record;
mod user;

pub use counter::{CounterDoc, COUNTER_COLLECTION};
pub use metadata::Metadata;
pub use notification::{NotificationDoc, NOTIFICATION_COLLECTION};
pub use prediction::{PredictionDoc, PREDICTION_COLLECTION};
pub use record::{MedicalRecordDoc, RECORD_COLLECTION};
pub use user::{Role, UserDoc, USER_COLLECTION};
