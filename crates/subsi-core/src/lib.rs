//! # subsi-core — Foundational Types for SubsiGenie
//!
//! The leaf of the workspace dependency graph. Every other `subsi-*` crate
//! depends on it; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `ApplicationId`, `CredentialId`,
//!    `RequirementId` and `FieldId` cannot be confused with each other or
//!    with free text.
//!
//! 2. **`CanonicalBytes` newtype.** Attestation identifiers and signing
//!    inputs flow through `CanonicalBytes::new()`, so the same logical
//!    payload always hashes and signs to the same bytes.
//!
//! 3. **UTC-only timestamps.** `Timestamp` is UTC with seconds precision.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `subsi-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, CryptoError, SubsiError};
pub use identity::{ApplicationId, CredentialId, FieldId, RequirementId};
pub use temporal::Timestamp;
