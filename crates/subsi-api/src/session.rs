//! # Application Session
//!
//! One session per application id. A session owns the draft, the flow
//! machine and everything gathered along the way (scheme analysis, project
//! plan, budget, attestation, submission).
//!
//! ## Remote operations
//!
//! Wallet retrieval, attestation signing and confirmation, submission and
//! status polls follow the same sequence:
//!
//! 1. Lock the session, register the operation with the flow machine
//!    (which refuses a second one while one is in flight) and take a
//!    cancellation token. Unlock.
//! 2. Run the remote call with retry, racing the token.
//! 3. Lock again and settle the ticket. If the operation was cancelled or
//!    superseded in the meantime its result is dropped without touching
//!    the session.
//!
//! The session mutex is never held across a remote call, so `cancel` and
//! `GET` stay responsive while an operation is in flight. If the caller
//! goes away between steps 1 and 3 (a client disconnect drops the handler
//! future) the operation is abandoned as if it had been cancelled.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use subsi_client::{
    cancellable, with_retry, CallToken, CancelSource, RemoteError, RemoteServices, SubmissionRequest,
};
use subsi_core::{ApplicationId, FieldId, RequirementId, Timestamp};
use subsi_state::{
    ApplicationDraft, AttestationBuilder, Budget, DraftManager, FlowFacts, FlowMachine, OperationKind,
    OperationTicket, Outcome, PendingOperation, ProjectPlan, Stage, StageFailure, StageTransitionRecord,
};
use subsi_vc::{
    ApplicantVerifier, Attestation, AttestationConfirmation, ConfirmationProof, RequirementEvaluator,
    RvoRequirements, RvoSubmission, SchemeAnalysis, SigningCapability, SubmissionDocument, SubmissionStatus,
    WalletCredential,
};

use crate::error::AppError;

pub type SharedSession = Arc<tokio::sync::Mutex<ApplicationSession>>;

#[derive(Debug)]
pub struct ApplicationSession {
    id: ApplicationId,
    analysis: SchemeAnalysis,
    manager: DraftManager,
    draft: ApplicationDraft,
    flow: FlowMachine,
    project_plan: ProjectPlan,
    budget: Option<Budget>,
    attestation: Option<Attestation>,
    confirmation: Option<AttestationConfirmation>,
    submission: Option<RvoSubmission>,
    cancel: CancelSource,
}

/// Changes to the applicant-supplied parts of a session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InformationPatch {
    /// Merged into the draft; `null` clears a field.
    #[serde(default)]
    pub additional_information: BTreeMap<FieldId, Value>,
    #[serde(default)]
    pub project_plan: Option<ProjectPlan>,
    #[serde(default)]
    pub budget: Option<Budget>,
}

// ─── Views ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeSummary {
    pub url: String,
    pub title: String,
    pub non_attestations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPlanView {
    #[serde(flatten)]
    pub plan: ProjectPlan,
    pub progress_percent: u8,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    pub reference: String,
    pub status: SubmissionStatus,
    pub submitted_at: Timestamp,
    pub documents: Vec<String>,
}

/// Everything a client needs to render the current step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub application_id: ApplicationId,
    pub scheme: SchemeSummary,
    pub stage: Stage,
    pub facts: FlowFacts,
    pub requirements: RvoRequirements,
    pub satisfied_credentials: Vec<RequirementId>,
    pub missing_credentials: Vec<RequirementId>,
    pub draft: ApplicationDraft,
    pub project_plan: ProjectPlanView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<Budget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation: Option<Attestation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<AttestationConfirmation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<SubmissionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_operation: Option<PendingOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<StageFailure>,
    pub transitions: Vec<StageTransitionRecord>,
}

/// Result of a status poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub reference: String,
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub last_updated: Timestamp,
    /// Whether this poll changed the recorded status.
    pub changed: bool,
}

// ─── Session ────────────────────────────────────────────────────────

impl ApplicationSession {
    /// A fresh session at `LANDING` for a scheme whose requirements are
    /// already known. Every additional field must belong to the scheme's
    /// field set.
    pub fn new(id: ApplicationId, analysis: SchemeAnalysis, additional_fields: &[FieldId]) -> Result<Self, AppError> {
        let requirements = analysis.to_requirements(additional_fields)?;
        let manager = DraftManager::new(requirements, RequirementEvaluator::builtin());
        let draft = manager.create(id);
        let mut flow = FlowMachine::new();
        flow.facts_mut().requirements_known = true;

        let mut session = Self {
            id,
            analysis,
            manager,
            draft,
            flow,
            project_plan: ProjectPlan::default(),
            budget: None,
            attestation: None,
            confirmation: None,
            submission: None,
            cancel: CancelSource::new(),
        };
        session.refresh_facts();
        Ok(session)
    }

    pub fn id(&self) -> ApplicationId {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.flow.current_stage()
    }

    pub fn draft(&self) -> &ApplicationDraft {
        &self.draft
    }

    pub fn flow(&self) -> &FlowMachine {
        &self.flow
    }

    pub fn attestation(&self) -> Option<&Attestation> {
        self.attestation.as_ref()
    }

    pub fn submission(&self) -> Option<&RvoSubmission> {
        self.submission.as_ref()
    }

    pub fn view(&self) -> SessionView {
        let missing: Vec<RequirementId> = self.draft.missing_credentials().cloned().collect();
        let satisfied = self
            .manager
            .requirements()
            .requested_credentials()
            .iter()
            .filter(|r| !missing.contains(r))
            .cloned()
            .collect();

        SessionView {
            application_id: self.id,
            scheme: SchemeSummary {
                url: self.analysis.url.clone(),
                title: self.analysis.title.clone(),
                non_attestations: self.analysis.non_attestations.clone(),
            },
            stage: self.flow.current_stage(),
            facts: *self.flow.facts(),
            requirements: self.manager.requirements().clone(),
            satisfied_credentials: satisfied,
            missing_credentials: missing,
            draft: self.draft.clone(),
            project_plan: ProjectPlanView {
                plan: self.project_plan.clone(),
                progress_percent: self.project_plan.progress_percent(),
                complete: self.project_plan.is_complete(),
            },
            budget: self.budget.clone(),
            attestation: self.attestation.clone(),
            confirmation: self.confirmation.clone(),
            submission: self.submission.as_ref().map(|s| SubmissionSummary {
                reference: s.reference.clone(),
                status: s.status,
                submitted_at: s.submitted_at,
                documents: s.documents.iter().map(|d| d.name.clone()).collect(),
            }),
            pending_operation: self.flow.pending().copied(),
            last_failure: self.flow.last_failure().cloned(),
            transitions: self.flow.transitions().to_vec(),
        }
    }

    /// Leave the current stage with `outcome`.
    ///
    /// Continuing from `AUTHORIZATION` is the applicant's consent to wallet
    /// access.
    pub fn advance(&mut self, outcome: Outcome) -> Result<Stage, AppError> {
        if self.flow.current_stage() == Stage::Authorization && outcome == Outcome::Continue {
            self.flow.facts_mut().authorized = true;
        }
        self.refresh_facts();
        self.flow.confirm();
        let stage = self.flow.advance(outcome)?;
        Ok(stage)
    }

    /// Apply an information patch. All parts are validated before any is
    /// applied.
    pub fn update_information(&mut self, patch: InformationPatch) -> Result<(), AppError> {
        if self.submission.is_some() {
            return Err(AppError::Conflict(format!("application {} has already been submitted", self.id)));
        }
        if let Some(plan) = &patch.project_plan {
            plan.validate()?;
        }
        if let Some(budget) = &patch.budget {
            budget.validate()?;
        }

        if !patch.additional_information.is_empty() {
            if self.attestation.is_some() {
                return Err(AppError::Conflict(
                    "the attestation has been built; additional information can no longer change".into(),
                ));
            }
            let next = self
                .manager
                .update_additional_information(&self.draft, patch.additional_information)?;
            self.draft = next;
        }
        if let Some(plan) = patch.project_plan {
            self.project_plan = plan;
        }
        if let Some(budget) = patch.budget {
            self.budget = Some(budget);
        }
        self.flow.facts_mut().intake_provided = true;
        self.refresh_facts();
        Ok(())
    }

    /// Replace the wallet credentials with ones the applicant supplied.
    pub fn attach_credentials(&mut self, credentials: Vec<WalletCredential>) -> Result<(), AppError> {
        if self.attestation.is_some() {
            return Err(AppError::Conflict(
                "the attestation has been built; credentials can no longer change".into(),
            ));
        }
        let next = self.manager.attach_credentials(&self.draft, credentials)?;
        self.draft = next;
        self.flow.facts_mut().credentials_loaded = true;
        self.refresh_facts();
        Ok(())
    }

    /// Cancel the in-flight operation, if any.
    pub fn cancel(&mut self) -> Option<PendingOperation> {
        let pending = self.flow.cancel_operation();
        if pending.is_some() {
            self.cancel.cancel();
        }
        pending
    }

    /// Documents sent with the attestation: the project plan and budget
    /// when they are ready.
    pub fn documents(&self) -> Vec<SubmissionDocument> {
        let mut documents = Vec::new();
        if self.project_plan.is_complete() {
            documents.push(self.project_plan.to_document());
        }
        if let Some(budget) = self.budget.as_ref().filter(|b| b.is_ready()) {
            documents.push(budget.to_document());
        }
        documents
    }

    fn refresh_facts(&mut self) {
        let credentials_satisfied = self.draft.missing_credentials().next().is_none();
        let draft_complete = self.draft.is_complete();
        let project_plan_done = self.project_plan.is_complete();
        let budget_done = self.budget.as_ref().is_some_and(Budget::is_ready);
        let attestation_built = self.attestation.is_some();
        let attestation_confirmed = self.confirmation.is_some();
        let submitted = self.submission.is_some();

        let facts = self.flow.facts_mut();
        facts.credentials_satisfied = facts.credentials_loaded && credentials_satisfied;
        facts.draft_complete = draft_complete;
        facts.project_plan_done = project_plan_done;
        facts.budget_done = budget_done;
        facts.attestation_built = attestation_built;
        facts.attestation_confirmed = attestation_confirmed;
        facts.submitted = submitted;
    }

    fn start_operation(&mut self, kind: OperationKind) -> Result<(OperationTicket, CallToken), AppError> {
        let ticket = self.flow.begin_operation(kind)?;
        Ok((ticket, self.cancel.token()))
    }

    /// Drop `ticket` if it is still the operation in flight.
    fn abandon(&mut self, ticket: OperationTicket) {
        if self.flow.is_current(ticket) {
            tracing::info!(application_id = %self.id, %ticket, "caller went away; abandoning operation");
            self.flow.cancel_operation();
            self.cancel.cancel();
        }
    }

    /// Close `ticket` with `result`. A failure is recorded against the
    /// current stage; a stale ticket drops the result.
    fn settle<T>(&mut self, ticket: OperationTicket, result: Result<T, AppError>) -> Result<T, AppError> {
        let kind = match self.flow.finish_operation(ticket) {
            Ok(kind) => kind,
            Err(stale) => {
                tracing::info!(application_id = %self.id, %ticket, "dropping result of cancelled operation");
                return Err(stale.into());
            }
        };
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.flow
                    .record_failure(Some(kind), err.to_string(), err.is_recoverable());
                Err(err)
            }
        }
    }
}

/// Abandons its operation when dropped before [`disarm`](Self::disarm).
struct OperationGuard {
    session: SharedSession,
    ticket: OperationTicket,
    armed: bool,
}

impl OperationGuard {
    fn new(session: &SharedSession, ticket: OperationTicket) -> Self {
        Self {
            session: Arc::clone(session),
            ticket,
            armed: true,
        }
    }

    /// Call with the session locked, just before settling.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let ticket = self.ticket;
        if let Ok(mut s) = self.session.try_lock() {
            s.abandon(ticket);
            return;
        }
        let session = Arc::clone(&self.session);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    session.lock().await.abandon(ticket);
                });
            }
            Err(_) => tracing::warn!(%ticket, "no runtime left to abandon operation"),
        }
    }
}

// ─── Operations ─────────────────────────────────────────────────────

/// Analyse a scheme, retrying transient failures.
pub async fn analyze_scheme(services: &RemoteServices, scheme_url: &str) -> Result<SchemeAnalysis, AppError> {
    let source = Arc::clone(&services.requirements);
    let analysis = with_retry(&services.retry, "requirements analysis", || source.analyze(scheme_url)).await?;
    Ok(analysis)
}

/// Fetch the applicant's credentials from the wallet and attach them.
///
/// At `BUSINESS_WALLET_CHECK` this is the business-wallet re-check;
/// anywhere else it is the initial retrieval. Requires the applicant's
/// authorization.
pub async fn retrieve_credentials(session: &SharedSession, services: &RemoteServices) -> Result<SessionView, AppError> {
    let (id, kind, ticket, token) = {
        let mut s = session.lock().await;
        if !s.flow.facts().authorized {
            return Err(AppError::Conflict(
                "the applicant has not authorized wallet access".into(),
            ));
        }
        let kind = if s.flow.current_stage() == Stage::BusinessWalletCheck {
            OperationKind::BusinessWalletCheck
        } else {
            OperationKind::WalletRetrieval
        };
        let (ticket, token) = s.start_operation(kind)?;
        (s.id, kind, ticket, token)
    };
    let guard = OperationGuard::new(session, ticket);

    let wallet = Arc::clone(&services.wallet);
    let result = cancellable(
        token,
        with_retry(&services.retry, "wallet retrieval", || wallet.fetch_credentials(id)),
    )
    .await;

    let mut s = session.lock().await;
    guard.disarm();
    let credentials = s.settle(ticket, result.map_err(AppError::from))?;
    if let Err(err) = s.attach_credentials(credentials) {
        s.flow.record_failure(Some(kind), err.to_string(), false);
        return Err(err);
    }
    Ok(s.view())
}

/// Build and sign the attestation for a complete draft at `FINAL_CONFIRM`.
///
/// The attestation is built once per draft; later calls return it from
/// any stage.
pub async fn build_attestation(
    session: &SharedSession,
    builder: &AttestationBuilder,
    signer: &dyn SigningCapability,
) -> Result<Attestation, AppError> {
    let (draft, ticket) = {
        let mut s = session.lock().await;
        if let Some(existing) = &s.attestation {
            return Ok(existing.clone());
        }
        if !s.draft.is_complete() {
            return Err(AppError::Incomplete(format!(
                "{} field(s) missing",
                s.draft.missing_fields().len()
            )));
        }
        let stage = s.flow.current_stage();
        if stage != Stage::FinalConfirm {
            return Err(AppError::Conflict(format!(
                "the attestation is built at {}, the application is at {stage}",
                Stage::FinalConfirm
            )));
        }
        let (ticket, _token) = s.start_operation(OperationKind::AttestationSigning)?;
        (s.draft.clone(), ticket)
    };
    let guard = OperationGuard::new(session, ticket);

    let result = builder.build(&draft, signer).await.map_err(AppError::from);

    let mut s = session.lock().await;
    guard.disarm();
    let attestation = s.settle(ticket, result)?;
    if s.draft != draft {
        return Err(AppError::Conflict(
            "the draft changed while the attestation was being signed; build it again".into(),
        ));
    }
    s.attestation = Some(attestation.clone());
    s.refresh_facts();
    Ok(attestation)
}

/// Have the applicant confirm the built attestation at `FINAL_CONFIRM`.
///
/// Submission requires a confirmation. Confirming twice returns the first
/// confirmation.
pub async fn confirm_attestation(
    session: &SharedSession,
    verifier: &dyn ApplicantVerifier,
    proof: ConfirmationProof,
) -> Result<AttestationConfirmation, AppError> {
    let (attestation, ticket, token) = {
        let mut s = session.lock().await;
        if let Some(existing) = &s.confirmation {
            return Ok(existing.clone());
        }
        let attestation = s
            .attestation
            .clone()
            .ok_or_else(|| AppError::Conflict("the attestation has not been built".into()))?;
        let stage = s.flow.current_stage();
        if stage != Stage::FinalConfirm {
            return Err(AppError::Conflict(format!(
                "the attestation is confirmed at {}, the application is at {stage}",
                Stage::FinalConfirm
            )));
        }
        let (ticket, token) = s.start_operation(OperationKind::AttestationConfirmation)?;
        (attestation, ticket, token)
    };
    let guard = OperationGuard::new(session, ticket);

    let verified = cancellable(token, async {
        Ok::<_, RemoteError>(verifier.verify(&attestation, &proof).await)
    })
    .await;

    let mut s = session.lock().await;
    guard.disarm();
    let result = verified
        .map_err(AppError::from)
        .and_then(|outcome| outcome.map_err(AppError::from));
    let confirmation = s.settle(ticket, result)?;
    tracing::info!(
        application_id = %s.id,
        attestation_id = %confirmation.attestation_id,
        method = %confirmation.method,
        "attestation confirmed"
    );
    s.confirmation = Some(confirmation.clone());
    s.refresh_facts();
    Ok(confirmation)
}

/// Submit the attestation and documents to RVO.
///
/// Only at `SUBMITTING`. The gateway's answer decides the outcome: a
/// rejection is recorded verbatim against the stage and the draft stays
/// complete.
pub async fn submit(session: &SharedSession, services: &RemoteServices) -> Result<RvoSubmission, AppError> {
    let (request, ticket, token) = {
        let mut s = session.lock().await;
        if s.submission.is_some() {
            return Err(AppError::Conflict(format!("application {} has already been submitted", s.id)));
        }
        let stage = s.flow.current_stage();
        if stage != Stage::Submitting {
            return Err(AppError::Conflict(format!(
                "submission is only possible at {}, the application is at {stage}",
                Stage::Submitting
            )));
        }
        let attestation = s
            .attestation
            .clone()
            .ok_or_else(|| AppError::Conflict("the attestation has not been built".into()))?;
        if s.confirmation.as_ref().map(|c| c.attestation_id.as_str()) != Some(attestation.id.as_str()) {
            return Err(AppError::Conflict(
                "the applicant has not confirmed the attestation".into(),
            ));
        }
        let request = SubmissionRequest {
            application_id: s.id,
            attestation,
            documents: s.documents(),
        };
        let (ticket, token) = s.start_operation(OperationKind::Submission)?;
        (request, ticket, token)
    };
    let guard = OperationGuard::new(session, ticket);

    let gateway = Arc::clone(&services.gateway);
    let result = cancellable(
        token,
        with_retry(&services.retry, "submission", || gateway.submit(&request)),
    )
    .await;

    let mut s = session.lock().await;
    guard.disarm();
    let submission = s.settle(ticket, result.map_err(AppError::from))?;
    let frozen = s.manager.mark_submitted(&s.draft, &submission.attestation)?;
    s.draft = frozen;
    s.submission = Some(submission.clone());
    s.refresh_facts();
    tracing::info!(
        application_id = %s.id,
        reference = %submission.reference,
        documents = submission.documents.len(),
        "application submitted"
    );
    Ok(submission)
}

/// Ask the gateway for the submission's status and apply it.
pub async fn poll_status(session: &SharedSession, services: &RemoteServices) -> Result<StatusView, AppError> {
    let (reference, ticket, token) = {
        let mut s = session.lock().await;
        let reference = s
            .submission
            .as_ref()
            .map(|sub| sub.reference.clone())
            .ok_or_else(|| AppError::Conflict("the application has not been submitted".into()))?;
        let (ticket, token) = s.start_operation(OperationKind::StatusPoll)?;
        (reference, ticket, token)
    };
    let guard = OperationGuard::new(session, ticket);

    let gateway = Arc::clone(&services.gateway);
    let result = cancellable(
        token,
        with_retry(&services.retry, "status poll", || gateway.fetch_status(&reference)),
    )
    .await;

    let mut s = session.lock().await;
    guard.disarm();
    let report = s.settle(ticket, result.map_err(AppError::from))?;
    let application_id = s.id;
    let Some(submission) = s.submission.as_mut() else {
        return Err(AppError::Internal("submission vanished during status poll".into()));
    };
    let changed = match submission.observe(report.status) {
        Ok(changed) => changed,
        Err(err) => {
            tracing::warn!(%application_id, %reference, error = %err, "gateway reported an impossible status change");
            return Err(AppError::Conflict(err.to_string()));
        }
    };
    let status = submission.status;

    if changed {
        tracing::info!(%application_id, %reference, %status, "submission status changed");
        if status == SubmissionStatus::Rejected {
            let reason = report
                .reason
                .clone()
                .unwrap_or_else(|| "rejected by RVO".to_string());
            s.flow
                .record_failure(Some(OperationKind::StatusPoll), reason, false);
        }
    }
    Ok(StatusView {
        reference: report.reference,
        status,
        reason: report.reason,
        last_updated: report.last_updated,
        changed,
    })
}
