//! # Application Flow State Machine
//!
//! Drives one applicant through the application stages.
//!
//! ## Stages
//!
//! ```text
//! Landing ──▶ Authorization ──▶ WalletRetrieval ──▶ ChatIntake ──▶ ChatConfirm
//!                                                                      │
//!        ┌─────────────────────────────────────────────────────────────┘
//!        ▼
//! SubsidyInfo ──▶ BusinessWalletCheck ──▶ Success ──┬──▶ ProjectPlan ──┐
//!                                                   │        ▲  │      │
//!                                                   │        │  ▼      ▼
//!                                                   └──────▶ Budget ──▶ FinalConfirm
//!                                                              ▲            │
//!                                                              └─CheckAgain─┤
//!                                                                           ▼
//!                                         ApplicationSuccess ◀── Submitting
//! ```
//!
//! Every stage has an entry precondition over [`FlowFacts`], a single user
//! exit trigger ([`FlowMachine::confirm`]) and a deterministic next stage
//! for each valid [`Outcome`]. The machine refuses to advance while a
//! remote operation is in flight; operations are tracked by ticket so that
//! a late completion of a cancelled or superseded call can be recognised
//! and dropped.
//!
//! Failures are recorded against the current stage. The machine never
//! discards facts or moves backwards on failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use subsi_core::Timestamp;

// ─── Stage ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Landing,
    Authorization,
    WalletRetrieval,
    ChatIntake,
    ChatConfirm,
    SubsidyInfo,
    BusinessWalletCheck,
    Success,
    ProjectPlan,
    Budget,
    FinalConfirm,
    Submitting,
    ApplicationSuccess,
}

impl Stage {
    pub const ALL: [Stage; 13] = [
        Self::Landing,
        Self::Authorization,
        Self::WalletRetrieval,
        Self::ChatIntake,
        Self::ChatConfirm,
        Self::SubsidyInfo,
        Self::BusinessWalletCheck,
        Self::Success,
        Self::ProjectPlan,
        Self::Budget,
        Self::FinalConfirm,
        Self::Submitting,
        Self::ApplicationSuccess,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ApplicationSuccess)
    }

    /// Condition on the facts that must hold to enter this stage.
    fn entry_precondition(&self, facts: &FlowFacts) -> Result<(), &'static str> {
        let (ok, requirement) = match self {
            Self::Landing | Self::Authorization => (true, ""),
            Self::WalletRetrieval => (facts.authorized, "applicant authorized"),
            Self::ChatIntake => (facts.credentials_loaded, "wallet credentials loaded"),
            Self::ChatConfirm => (facts.intake_provided, "intake answers provided"),
            Self::SubsidyInfo => (facts.requirements_known, "scheme requirements retrieved"),
            Self::BusinessWalletCheck => (
                facts.credentials_loaded && facts.requirements_known,
                "credentials loaded and requirements retrieved",
            ),
            Self::Success | Self::ProjectPlan | Self::Budget => {
                (facts.credentials_satisfied, "requested credentials satisfied")
            }
            Self::FinalConfirm => (facts.draft_complete, "application draft complete"),
            Self::Submitting => (
                facts.attestation_built && facts.attestation_confirmed,
                "attestation built and confirmed by the applicant",
            ),
            Self::ApplicationSuccess => (facts.submitted, "submission accepted by RVO"),
        };
        if ok {
            Ok(())
        } else {
            Err(requirement)
        }
    }

    /// Condition that must hold to leave this stage with `outcome`.
    fn exit_precondition(&self, outcome: Outcome, facts: &FlowFacts) -> Result<(), &'static str> {
        match (self, outcome) {
            (Self::ProjectPlan, Outcome::Continue) if !facts.project_plan_done => {
                Err("project plan complete")
            }
            (Self::Budget, Outcome::Continue) if !facts.budget_done => Err("budget ready"),
            _ => Ok(()),
        }
    }

    /// The next stage for `outcome`, or `None` if the outcome is not valid here.
    pub fn next(&self, outcome: Outcome, facts: &FlowFacts) -> Option<Stage> {
        use Outcome::*;
        let next = match (self, outcome) {
            (Self::Landing, Continue) => Self::Authorization,
            (Self::Authorization, Continue) => Self::WalletRetrieval,
            (Self::WalletRetrieval, Continue) => Self::ChatIntake,
            (Self::ChatIntake, Continue) => Self::ChatConfirm,
            (Self::ChatConfirm, Continue) => Self::SubsidyInfo,
            (Self::SubsidyInfo, Continue) => Self::BusinessWalletCheck,
            (Self::BusinessWalletCheck, Continue) => Self::Success,
            (Self::Success, ChooseProjectPlan) => Self::ProjectPlan,
            (Self::Success, ChooseBudget) => Self::Budget,
            (Self::ProjectPlan, Continue) if facts.budget_done => Self::FinalConfirm,
            (Self::ProjectPlan, Continue) => Self::Budget,
            (Self::Budget, Continue) => Self::FinalConfirm,
            (Self::Budget, ChooseProjectPlan) => Self::ProjectPlan,
            (Self::FinalConfirm, Continue) => Self::Submitting,
            (Self::FinalConfirm, CheckAgain) => Self::Budget,
            (Self::Submitting, Continue) => Self::ApplicationSuccess,
            _ => return None,
        };
        Some(next)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Landing => "LANDING",
            Self::Authorization => "AUTHORIZATION",
            Self::WalletRetrieval => "WALLET_RETRIEVAL",
            Self::ChatIntake => "CHAT_INTAKE",
            Self::ChatConfirm => "CHAT_CONFIRM",
            Self::SubsidyInfo => "SUBSIDY_INFO",
            Self::BusinessWalletCheck => "BUSINESS_WALLET_CHECK",
            Self::Success => "SUCCESS",
            Self::ProjectPlan => "PROJECT_PLAN",
            Self::Budget => "BUDGET",
            Self::FinalConfirm => "FINAL_CONFIRM",
            Self::Submitting => "SUBMITTING",
            Self::ApplicationSuccess => "APPLICATION_SUCCESS",
        };
        f.write_str(s)
    }
}

/// The user's choice when leaving a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Continue,
    ChooseProjectPlan,
    ChooseBudget,
    /// "Check something again" from the final confirmation.
    CheckAgain,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Continue => "CONTINUE",
            Self::ChooseProjectPlan => "CHOOSE_PROJECT_PLAN",
            Self::ChooseBudget => "CHOOSE_BUDGET",
            Self::CheckAgain => "CHECK_AGAIN",
        };
        f.write_str(s)
    }
}

/// Every edge of the stage graph, for documentation and the CLI.
pub const TRANSITIONS: &[(Stage, Outcome, Stage, &str)] = &[
    (Stage::Landing, Outcome::Continue, Stage::Authorization, ""),
    (Stage::Authorization, Outcome::Continue, Stage::WalletRetrieval, "authorized"),
    (Stage::WalletRetrieval, Outcome::Continue, Stage::ChatIntake, "credentials loaded"),
    (Stage::ChatIntake, Outcome::Continue, Stage::ChatConfirm, "intake provided"),
    (Stage::ChatConfirm, Outcome::Continue, Stage::SubsidyInfo, "requirements known"),
    (Stage::SubsidyInfo, Outcome::Continue, Stage::BusinessWalletCheck, ""),
    (Stage::BusinessWalletCheck, Outcome::Continue, Stage::Success, "credentials satisfied"),
    (Stage::Success, Outcome::ChooseProjectPlan, Stage::ProjectPlan, ""),
    (Stage::Success, Outcome::ChooseBudget, Stage::Budget, ""),
    (Stage::ProjectPlan, Outcome::Continue, Stage::Budget, "plan complete, budget not ready"),
    (Stage::ProjectPlan, Outcome::Continue, Stage::FinalConfirm, "plan complete, budget ready"),
    (Stage::Budget, Outcome::Continue, Stage::FinalConfirm, "budget ready, draft complete"),
    (Stage::Budget, Outcome::ChooseProjectPlan, Stage::ProjectPlan, ""),
    (Stage::FinalConfirm, Outcome::Continue, Stage::Submitting, "attestation built and confirmed"),
    (Stage::FinalConfirm, Outcome::CheckAgain, Stage::Budget, ""),
    (Stage::Submitting, Outcome::Continue, Stage::ApplicationSuccess, "submission accepted"),
];

// ─── Facts ───────────────────────────────────────────────────────────

/// What the session has established so far. Stage preconditions read these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowFacts {
    pub authorized: bool,
    pub credentials_loaded: bool,
    pub intake_provided: bool,
    pub requirements_known: bool,
    pub credentials_satisfied: bool,
    pub project_plan_done: bool,
    pub budget_done: bool,
    pub draft_complete: bool,
    pub attestation_built: bool,
    pub attestation_confirmed: bool,
    pub submitted: bool,
}

// ─── Operations ──────────────────────────────────────────────────────

/// Remote or slow operations the session performs on behalf of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    WalletRetrieval,
    RequirementsAnalysis,
    BusinessWalletCheck,
    AttestationSigning,
    AttestationConfirmation,
    Submission,
    StatusPoll,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::WalletRetrieval => "WALLET_RETRIEVAL",
            Self::RequirementsAnalysis => "REQUIREMENTS_ANALYSIS",
            Self::BusinessWalletCheck => "BUSINESS_WALLET_CHECK",
            Self::AttestationSigning => "ATTESTATION_SIGNING",
            Self::AttestationConfirmation => "ATTESTATION_CONFIRMATION",
            Self::Submission => "SUBMISSION",
            Self::StatusPoll => "STATUS_POLL",
        };
        f.write_str(s)
    }
}

/// Identifies one started operation. Tickets are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationTicket(u64);

impl std::fmt::Display for OperationTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub ticket: OperationTicket,
    pub started_at: Timestamp,
}

// ─── Errors and Records ──────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The outcome is not valid here, or the exit trigger has not fired,
    /// or an operation is still in flight.
    #[error("illegal transition from {stage} on {outcome}: {reason}")]
    IllegalTransition {
        stage: Stage,
        outcome: Outcome,
        reason: String,
    },

    #[error("cannot move from {from} to {to}: requires {requirement}")]
    PreconditionUnmet {
        from: Stage,
        to: Stage,
        requirement: String,
    },

    #[error("operation {kind} already in flight ({ticket})")]
    OperationInFlight {
        kind: OperationKind,
        ticket: OperationTicket,
    },

    /// The ticket belongs to a cancelled or superseded operation.
    #[error("operation {ticket} is no longer current")]
    StaleOperation { ticket: OperationTicket },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTransitionRecord {
    pub from: Stage,
    pub to: Stage,
    pub outcome: Outcome,
    pub at: Timestamp,
}

/// A failure recorded against a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFailure {
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationKind>,
    pub message: String,
    /// Whether retrying the same operation can succeed.
    pub recoverable: bool,
    pub at: Timestamp,
}

// ─── Machine ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMachine {
    stage: Stage,
    facts: FlowFacts,
    trigger_fired: bool,
    pending: Option<PendingOperation>,
    next_ticket: u64,
    transitions: Vec<StageTransitionRecord>,
    failures: Vec<StageFailure>,
}

impl Default for FlowMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowMachine {
    /// A machine at `Landing` with no facts established.
    pub fn new() -> Self {
        Self {
            stage: Stage::Landing,
            facts: FlowFacts::default(),
            trigger_fired: false,
            pending: None,
            next_ticket: 1,
            transitions: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn current_stage(&self) -> Stage {
        self.stage
    }

    pub fn facts(&self) -> &FlowFacts {
        &self.facts
    }

    pub fn facts_mut(&mut self) -> &mut FlowFacts {
        &mut self.facts
    }

    pub fn pending(&self) -> Option<&PendingOperation> {
        self.pending.as_ref()
    }

    pub fn transitions(&self) -> &[StageTransitionRecord] {
        &self.transitions
    }

    pub fn failures(&self) -> &[StageFailure] {
        &self.failures
    }

    /// Fire the current stage's exit trigger.
    pub fn confirm(&mut self) {
        self.trigger_fired = true;
    }

    /// Exit trigger fired and nothing in flight.
    pub fn can_advance(&self) -> bool {
        self.trigger_fired && self.pending.is_none() && !self.stage.is_terminal()
    }

    /// Leave the current stage with `outcome`.
    pub fn advance(&mut self, outcome: Outcome) -> Result<Stage, FlowError> {
        if let Some(pending) = self.pending {
            return Err(self.illegal(outcome, format!("{} is in flight", pending.kind)));
        }
        if !self.trigger_fired {
            return Err(self.illegal(outcome, "exit trigger has not fired".to_string()));
        }
        let Some(next) = self.stage.next(outcome, &self.facts) else {
            return Err(self.illegal(outcome, "outcome is not valid for this stage".to_string()));
        };
        self.stage
            .exit_precondition(outcome, &self.facts)
            .and_then(|()| next.entry_precondition(&self.facts))
            .map_err(|requirement| FlowError::PreconditionUnmet {
                from: self.stage,
                to: next,
                requirement: requirement.to_string(),
            })?;

        tracing::info!(from = %self.stage, to = %next, outcome = %outcome, "stage transition");
        self.transitions.push(StageTransitionRecord {
            from: self.stage,
            to: next,
            outcome,
            at: Timestamp::now(),
        });
        self.stage = next;
        self.trigger_fired = false;
        Ok(next)
    }

    /// Register a new in-flight operation.
    pub fn begin_operation(&mut self, kind: OperationKind) -> Result<OperationTicket, FlowError> {
        if let Some(pending) = self.pending {
            return Err(FlowError::OperationInFlight {
                kind: pending.kind,
                ticket: pending.ticket,
            });
        }
        let ticket = OperationTicket(self.next_ticket);
        self.next_ticket += 1;
        self.pending = Some(PendingOperation {
            kind,
            ticket,
            started_at: Timestamp::now(),
        });
        tracing::debug!(stage = %self.stage, operation = %kind, %ticket, "operation started");
        Ok(ticket)
    }

    /// Whether `ticket` is the operation currently in flight.
    pub fn is_current(&self, ticket: OperationTicket) -> bool {
        self.pending.is_some_and(|p| p.ticket == ticket)
    }

    /// Clear the in-flight operation identified by `ticket`.
    pub fn finish_operation(&mut self, ticket: OperationTicket) -> Result<OperationKind, FlowError> {
        match self.pending {
            Some(p) if p.ticket == ticket => {
                self.pending = None;
                Ok(p.kind)
            }
            _ => Err(FlowError::StaleOperation { ticket }),
        }
    }

    /// Abandon the in-flight operation, if any. Its ticket becomes stale.
    pub fn cancel_operation(&mut self) -> Option<PendingOperation> {
        let cancelled = self.pending.take();
        if let Some(p) = cancelled {
            tracing::info!(stage = %self.stage, operation = %p.kind, ticket = %p.ticket, "operation cancelled");
        }
        cancelled
    }

    /// Record a failure against the current stage.
    pub fn record_failure(
        &mut self,
        operation: Option<OperationKind>,
        message: impl Into<String>,
        recoverable: bool,
    ) -> &StageFailure {
        let failure = StageFailure {
            stage: self.stage,
            operation,
            message: message.into(),
            recoverable,
            at: Timestamp::now(),
        };
        tracing::warn!(stage = %failure.stage, message = %failure.message, recoverable, "stage failure");
        self.failures.push(failure);
        &self.failures[self.failures.len() - 1]
    }

    /// The most recent failure recorded at the current stage.
    pub fn last_failure(&self) -> Option<&StageFailure> {
        self.failures.last().filter(|f| f.stage == self.stage)
    }

    fn illegal(&self, outcome: Outcome, reason: String) -> FlowError {
        FlowError::IllegalTransition {
            stage: self.stage,
            outcome,
            reason,
        }
    }
}
