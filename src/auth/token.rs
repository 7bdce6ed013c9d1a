//! Bearer-token verification
//!
//! Wraps the external identity provider behind the `TokenVerifier` trait.
//! The production implementation validates HS256 JWTs; tests substitute
//! in-memory fakes. Verification failure is never downgraded to anonymous
//! access - callers treat any `VerifyError` as an authentication failure.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;

/// Verified subject identity extracted from a credential.
///
/// Produced per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaim {
    /// Unique principal identifier asserted by the provider (`sub`)
    pub subject_id: String,
    /// Email address carried by the credential, empty if absent
    pub email: String,
    /// Remaining scalar claims, stringified
    pub claims: HashMap<String, String>,
}

/// Verification failure (expired, malformed, bad signature, provider error)
#[derive(Debug, Clone, thiserror::Error)]
#[error("credential verification failed: {0}")]
pub struct VerifyError(pub String);

/// Opaque credential verifier
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a bearer credential and return the subject identity it asserts.
    async fn verify(&self, credential: &str) -> Result<IdentityClaim, VerifyError>;
}

/// Raw JWT claim set as decoded from the wire
#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[allow(dead_code)]
    exp: u64,
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

/// HS256 JWT verifier backed by a shared secret
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verifier with the well-known dev-mode secret
    pub fn new_dev() -> Self {
        Self::new("dev-only-insecure-secret")
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> Result<IdentityClaim, VerifyError> {
        let data = jsonwebtoken::decode::<RawClaims>(credential, &self.decoding_key, &self.validation)
            .map_err(|e| VerifyError(e.to_string()))?;

        if data.claims.sub.is_empty() {
            return Err(VerifyError("token has empty subject".to_string()));
        }

        let claims = data
            .claims
            .extra
            .iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k.clone(), s.clone())),
                serde_json::Value::Number(n) => Some((k.clone(), n.to_string())),
                serde_json::Value::Bool(b) => Some((k.clone(), b.to_string())),
                _ => None,
            })
            .collect();

        Ok(IdentityClaim {
            subject_id: data.claims.sub,
            email: data.claims.email.unwrap_or_default(),
            claims,
        })
    }
}

/// Extract the bearer token from an `Authorization` header value
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn make_token(secret: &str, sub: &str, exp_offset_secs: i64) -> String {
        let exp = chrono::Utc::now().timestamp() + exp_offset_secs;
        let claims = json!({
            "sub": sub,
            "email": "pat@example.com",
            "exp": exp,
            "device": "android",
        });
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn verifies_valid_token() {
        let verifier = JwtVerifier::new("s3cret");
        let token = make_token("s3cret", "user-1", 3600);

        let claim = verifier.verify(&token).await.unwrap();
        assert_eq!(claim.subject_id, "user-1");
        assert_eq!(claim.email, "pat@example.com");
        assert_eq!(claim.claims.get("device").map(String::as_str), Some("android"));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let verifier = JwtVerifier::new("s3cret");
        let token = make_token("s3cret", "user-1", -3600);

        assert!(verifier.verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn rejects_wrong_secret() {
        let verifier = JwtVerifier::new("s3cret");
        let token = make_token("other", "user-1", 3600);

        assert!(verifier.verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let verifier = JwtVerifier::new("s3cret");
        assert!(verifier.verify("not-a-jwt").await.is_err());
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_token_from_header(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc")), None);
        assert_eq!(extract_token_from_header(None), None);
    }
}
