//! Per-request authorization gate
//!
//! Every protected endpoint passes through [`AuthGate::authorize`] before
//! touching shared state: verify the bearer credential, resolve the
//! caller's stored role, then apply the action's policy. The role is read
//! fresh from the store on every call - nothing is cached in process, so a
//! role change takes effect on the next request.
//!
//! Verification and lookup failures are typed errors (mapped to 401 by the
//! routes); a policy denial is a regular [`Decision`] with `allowed = false`
//! (mapped to 403). The owner used for `SelfOrAdmin` comparisons must be the
//! one read from the stored resource, never a client-supplied field.
//!
//! The credential verification and the role fetch are two independent reads
//! with no transactional link; a role change landing between them may or may
//! not be observed. That window is one request long and accepted.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::auth::token::{IdentityClaim, TokenVerifier};
use crate::db::schemas::Role;
use crate::types::StoreError;

/// Named permission check required by an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Allowed only for `ADMIN` callers
    AdminOnly,
    /// Allowed for `ADMIN` callers or the owner of the resource
    SelfOrAdmin,
    /// Allowed for any verified caller with a user record
    AuthenticatedOnly,
}

/// Why a decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    Granted,
    PolicyDenied,
}

/// Outcome of an authorization check for a caller that authenticated
/// successfully. Carries the verified identity and stored role so handlers
/// can stamp ownership without re-verifying.
#[derive(Debug, Clone)]
pub struct Decision {
    pub allowed: bool,
    pub reason: DecisionReason,
    pub identity: IdentityClaim,
    pub role: Role,
}

/// Authentication failures - distinct from policy denial
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The credential did not verify (expired, malformed, bad signature,
    /// provider unreachable). Never treated as anonymous.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The credential verified but no user record exists for the subject.
    #[error("no user record for subject {0}")]
    UnknownSubject(String),

    /// The role lookup could not be served.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stored user-role lookup, read fresh per request
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Role of the user record for `subject_id`, or `None` when absent.
    async fn role_of(&self, subject_id: &str) -> Result<Option<Role>, StoreError>;
}

/// Stateless per-request authorization decision function
pub struct AuthGate {
    verifier: Arc<dyn TokenVerifier>,
    directory: Arc<dyn RoleDirectory>,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>, directory: Arc<dyn RoleDirectory>) -> Self {
        Self { verifier, directory }
    }

    /// Decide whether `credential` may perform `action`.
    ///
    /// `resource_owner` is required for [`PolicyAction::SelfOrAdmin`] and
    /// must come from the stored resource.
    pub async fn authorize(
        &self,
        credential: &str,
        action: PolicyAction,
        resource_owner: Option<&str>,
    ) -> Result<Decision, GateError> {
        let identity = self
            .verifier
            .verify(credential)
            .await
            .map_err(|e| GateError::InvalidCredential(e.to_string()))?;

        let role = self
            .directory
            .role_of(&identity.subject_id)
            .await?
            .ok_or_else(|| GateError::UnknownSubject(identity.subject_id.clone()))?;

        let allowed = match action {
            PolicyAction::AdminOnly => role == Role::Admin,
            PolicyAction::SelfOrAdmin => {
                role == Role::Admin
                    || resource_owner.is_some_and(|owner| owner == identity.subject_id)
            }
            PolicyAction::AuthenticatedOnly => true,
        };

        if !allowed {
            debug!(
                subject = %identity.subject_id,
                role = %role,
                ?action,
                "policy denied"
            );
        }

        Ok(Decision {
            allowed,
            reason: if allowed {
                DecisionReason::Granted
            } else {
                DecisionReason::PolicyDenied
            },
            identity,
            role,
        })
    }

    /// Verify a credential without a policy check.
    ///
    /// Used by signup, where no user record exists yet.
    pub async fn verify_credential(&self, credential: &str) -> Result<IdentityClaim, GateError> {
        self.verifier
            .verify(credential)
            .await
            .map_err(|e| GateError::InvalidCredential(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::VerifyError;
    use std::collections::HashMap;

    /// Verifier that accepts `tok:<subject>` and rejects everything else
    struct FakeVerifier;

    #[async_trait]
    impl TokenVerifier for FakeVerifier {
        async fn verify(&self, credential: &str) -> Result<IdentityClaim, VerifyError> {
            match credential.strip_prefix("tok:") {
                Some(sub) => Ok(IdentityClaim {
                    subject_id: sub.to_string(),
                    email: format!("{sub}@example.com"),
                    claims: HashMap::new(),
                }),
                None => Err(VerifyError("bad token".to_string())),
            }
        }
    }

    struct FakeDirectory {
        roles: HashMap<String, Role>,
    }

    #[async_trait]
    impl RoleDirectory for FakeDirectory {
        async fn role_of(&self, subject_id: &str) -> Result<Option<Role>, StoreError> {
            Ok(self.roles.get(subject_id).copied())
        }
    }

    fn gate() -> AuthGate {
        let mut roles = HashMap::new();
        roles.insert("u1".to_string(), Role::Patient);
        roles.insert("u2".to_string(), Role::Patient);
        roles.insert("admin".to_string(), Role::Admin);
        AuthGate::new(Arc::new(FakeVerifier), Arc::new(FakeDirectory { roles }))
    }

    #[tokio::test]
    async fn admin_only_requires_admin_role() {
        let gate = gate();

        let d = gate.authorize("tok:admin", PolicyAction::AdminOnly, None).await.unwrap();
        assert!(d.allowed);
        assert_eq!(d.reason, DecisionReason::Granted);

        let d = gate.authorize("tok:u1", PolicyAction::AdminOnly, None).await.unwrap();
        assert!(!d.allowed);
        assert_eq!(d.reason, DecisionReason::PolicyDenied);
    }

    #[tokio::test]
    async fn self_or_admin_enforces_ownership() {
        let gate = gate();

        // Patient acting on someone else's resource
        let d = gate
            .authorize("tok:u1", PolicyAction::SelfOrAdmin, Some("u2"))
            .await
            .unwrap();
        assert!(!d.allowed);
        assert_eq!(d.reason, DecisionReason::PolicyDenied);

        // Same patient acting on their own resource
        let d = gate
            .authorize("tok:u1", PolicyAction::SelfOrAdmin, Some("u1"))
            .await
            .unwrap();
        assert!(d.allowed);

        // Admin may act on anyone's resource
        let d = gate
            .authorize("tok:admin", PolicyAction::SelfOrAdmin, Some("u2"))
            .await
            .unwrap();
        assert!(d.allowed);
    }

    #[tokio::test]
    async fn self_or_admin_without_owner_denies_non_admin() {
        let gate = gate();
        let d = gate
            .authorize("tok:u1", PolicyAction::SelfOrAdmin, None)
            .await
            .unwrap();
        assert!(!d.allowed);
    }

    #[tokio::test]
    async fn invalid_credential_takes_precedence() {
        let gate = gate();
        // Even an action that any authenticated caller could perform
        let err = gate
            .authorize("garbage", PolicyAction::AuthenticatedOnly, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidCredential(_)));
    }

    #[tokio::test]
    async fn verified_subject_without_record_is_rejected() {
        let gate = gate();
        let err = gate
            .authorize("tok:ghost", PolicyAction::AuthenticatedOnly, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::UnknownSubject(s) if s == "ghost"));
    }

    #[tokio::test]
    async fn decision_is_stable_for_identical_inputs() {
        let gate = gate();
        let a = gate
            .authorize("tok:u1", PolicyAction::SelfOrAdmin, Some("u2"))
            .await
            .unwrap();
        let b = gate
            .authorize("tok:u1", PolicyAction::SelfOrAdmin, Some("u2"))
            .await
            .unwrap();
        assert_eq!(a.allowed, b.allowed);
        assert_eq!(a.reason, b.reason);
    }
}
