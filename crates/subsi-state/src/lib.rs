//! # subsi-state — Application Lifecycle
//!
//! - [`draft`]: the application draft and the manager that applies every
//!   mutation to it, recomputing what is missing.
//! - [`builder`]: turns a complete draft into a signed attestation.
//! - [`plan`]: project plan and budget documents.
//! - [`flow`]: the stage machine a session walks through.
//!
//! Everything here is synchronous and pure except
//! [`builder::AttestationBuilder::build`], which awaits the signing
//! capability. Remote calls, retries and cancellation live in the session
//! layer above.

pub mod builder;
pub mod draft;
pub mod flow;
pub mod plan;

pub use builder::AttestationBuilder;
pub use draft::{ApplicationDraft, DraftError, DraftManager, DraftStatus, MissingField};
pub use flow::{
    FlowError, FlowFacts, FlowMachine, OperationKind, OperationTicket, Outcome, PendingOperation,
    Stage, StageFailure, StageTransitionRecord, TRANSITIONS,
};
pub use plan::{Budget, BudgetLine, PlanError, ProjectPlan};
