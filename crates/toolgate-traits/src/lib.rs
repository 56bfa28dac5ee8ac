//! Toolgate Traits - Shared authorization abstractions.
//!
//! Tools depend on this crate only:
//! - `Authorizer`, the capability set every policy variant implements
//! - `CodeUnit`, the narrower boundary a code-unit authorizer is jailed to
//! - `AuthError` and the `Result` alias

pub mod error;
pub mod security;

// ── Top-level re-exports ─────────────────────────────────────────────

pub use error::{AuthError, Result};
pub use security::{Authorizer, CodeUnit, same_authorizer};
