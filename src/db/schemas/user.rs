//! User document schema
//!
//! Stores the user profile and role. `user_id` equals the subject identity
//! of the credential that created the record and is immutable afterwards.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Closed set of user roles.
///
/// Unknown role strings are rejected at the write boundary (signup) rather
/// than compared loosely at every read site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Patient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Patient => write!(f, "PATIENT"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    /// Case-insensitive at the boundary, but only the two known roles parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "PATIENT" => Ok(Role::Patient),
            other => Err(format!("Invalid role '{other}'. Must be either ADMIN or PATIENT.")),
        }
    }
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Subject identity from the identity provider; immutable once assigned
    pub user_id: String,

    /// Display name
    pub name: String,

    /// National identity card number
    pub nic: String,

    /// Email address as asserted by the identity provider
    pub email: String,

    /// Home city
    pub city: String,

    /// Contact number
    pub contact: String,

    /// User role (closed enum, validated at signup)
    pub role: Role,
}

impl UserDoc {
    pub fn new(
        user_id: String,
        name: String,
        nic: String,
        email: String,
        city: String,
        contact: String,
        role: Role,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            name,
            nic,
            email,
            city,
            contact,
            role,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(IndexOptions::builder().name("email_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Patient".parse::<Role>().unwrap(), Role::Patient);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn unknown_roles_are_rejected() {
        assert!("doctor".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
        assert!("superadmin".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
        assert_eq!(serde_json::to_string(&Role::Patient).unwrap(), "\"PATIENT\"");
        // Stored strings outside the closed set fail to deserialize
        assert!(serde_json::from_str::<Role>("\"GUEST\"").is_err());
    }
}
