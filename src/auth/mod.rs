//! Authentication and authorization
//!
//! Provides:
//! - Bearer-token verification against the identity provider (JWT)
//! - The per-request authorization gate (role and ownership policy)

pub mod gate;
pub mod token;

pub use gate::{AuthGate, Decision, DecisionReason, GateError, PolicyAction, RoleDirectory};
pub use token::{extract_token_from_header, IdentityClaim, JwtVerifier, TokenVerifier, VerifyError};
