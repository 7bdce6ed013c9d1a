//! Medical record document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for medical records
pub const RECORD_COLLECTION: &str = "medical_records";

/// Medical record document stored in MongoDB
///
/// `user_id` is the record owner and is always stamped from the verified
/// credential at creation - client-supplied owners are ignored.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MedicalRecordDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Public record identifier (UUID)
    pub med_id: String,

    /// Subject identity of the owning user
    pub user_id: String,

    /// Diagnosis label (e.g. "Dengue", "Chikungunya")
    pub diagnosis: String,

    /// Risk classification
    pub risk_status: String,

    /// Record date as supplied by the client
    pub date: String,

    /// Reported symptoms
    pub symptoms: String,

    /// Model score attached to this record
    pub pred_score: f64,
}

impl MedicalRecordDoc {
    pub fn new(
        med_id: String,
        user_id: String,
        diagnosis: String,
        risk_status: String,
        date: String,
        symptoms: String,
        pred_score: f64,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            med_id,
            user_id,
            diagnosis,
            risk_status,
            date,
            symptoms,
            pred_score,
        }
    }
}

impl IntoIndexes for MedicalRecordDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "med_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("med_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("record_owner_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "diagnosis": 1 },
                Some(
                    IndexOptions::builder()
                        .name("diagnosis_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for MedicalRecordDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
