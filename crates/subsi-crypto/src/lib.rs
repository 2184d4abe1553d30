//! # subsi-crypto — Cryptographic Primitives
//!
//! - **Ed25519** key pairs for the local attestation signer.
//! - **Compact JWS** (`alg: EdDSA`) whose payload is always canonical JSON,
//!   used as the attestation `proof.jwt`.
//!
//! ## Crate Policy
//!
//! - Depends only on `subsi-core` internally.
//! - Private key material is never serialized or logged.
//! - Tests use real Ed25519; nothing is mocked.

pub mod ed25519;
pub mod jws;

pub use ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use jws::{sign_jws, verify_jws, JwsClaims, JwsHeader};
