//! # subsi-vc — Credentials, Requirements and Attestations
//!
//! The data model shared by the application lifecycle:
//!
//! - **Wallet credentials** (`credential.rs`): a closed sum type keyed by
//!   the `type` tag, one typed subject per kind.
//! - **Credential store** (`store.rs`): the per-session read-only set.
//! - **Requirements** (`requirements.rs`, `catalog.rs`): what a scheme asks
//!   for and how each identifier maps onto a credential type and fields.
//! - **Evaluator** (`evaluator.rs`): satisfied/missing partition.
//! - **Attestations** (`attestation.rs`): the signed application statement
//!   and the `SigningCapability` seam.
//! - **Confirmation** (`confirmation.rs`): the applicant's consent to an
//!   attestation, behind the `ApplicantVerifier` seam.
//! - **Submissions** (`submission.rs`): gateway records and their status.
//! - **Wallet export import** (`wallet_import.rs`).

pub mod attestation;
pub mod catalog;
pub mod confirmation;
pub mod credential;
pub mod evaluator;
pub mod requirements;
pub mod store;
pub mod submission;
pub mod wallet_import;

pub use attestation::{
    Attestation, AttestationError, AttestationProof, AttestationSubject, Ed25519JwsSigner,
    SigningCapability, SigningRequest, ATTESTATION_TYPE, DEFAULT_ISSUER, PROOF_TYPE,
};
pub use catalog::{CredentialRequirement, RequirementCatalog};
pub use confirmation::{
    ApplicantVerifier, AttestationConfirmation, ConfirmationError, ConfirmationProof, PinVerifier,
    DEMO_CONFIRMATION_PIN,
};
pub use credential::{CredentialError, CredentialSubject, CredentialType, WalletCredential};
pub use evaluator::{Evaluation, RequirementEvaluator};
pub use requirements::{RequirementsError, RvoRequirements, SchemeAnalysis};
pub use store::CredentialStore;
pub use submission::{RvoSubmission, StatusChangeError, SubmissionDocument, SubmissionStatus};
pub use wallet_import::import_wallet_export;
