//! Prediction document schema
//!
//! Predictions carry the public sequential identifier handed out by the
//! allocator (`PR001`, `PR002`, ...).

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for predictions
pub const PREDICTION_COLLECTION: &str = "predictions";

/// Prediction document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PredictionDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Allocator-issued public identifier; never reused
    pub pred_id: String,

    /// Model confidence score
    pub pred_score: f64,

    /// Date the prediction was made
    pub pred_date: String,

    /// Predicted disease
    pub pred_disease: String,
}

impl IntoIndexes for PredictionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "pred_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("pred_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for PredictionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
