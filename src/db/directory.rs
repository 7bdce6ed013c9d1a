//! MongoDB-backed role directory
//!
//! Resolves a verified subject identity to the stored user role for the
//! authorization gate. Reads go to the store on every call - roles are
//! never cached in process, so a role change is visible on the next
//! request.

use async_trait::async_trait;
use bson::doc;

use crate::auth::RoleDirectory;
use crate::db::mongo::MongoClient;
use crate::db::schemas::{Role, UserDoc, USER_COLLECTION};
use crate::types::StoreError;

pub struct MongoRoleDirectory {
    mongo: MongoClient,
}

impl MongoRoleDirectory {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }
}

#[async_trait]
impl RoleDirectory for MongoRoleDirectory {
    async fn role_of(&self, subject_id: &str) -> Result<Option<Role>, StoreError> {
        let collection = self
            .mongo
            .collection::<UserDoc>(USER_COLLECTION)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let user = collection
            .find_one(doc! { "user_id": subject_id })
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(user.map(|u| u.role))
    }
}
