//! Deterministic in-process collaborators for development and testing.
//!
//! Each mock can be told to fail transiently a number of times before
//! succeeding, and to take a fixed amount of time per call, so retry and
//! cancellation behaviour can be exercised without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use subsi_core::{ApplicationId, RequirementId, Timestamp};
use subsi_vc::requirements::{dhi_additional_fields, DHI_REQUESTED_CREDENTIALS};
use subsi_vc::{RvoSubmission, SchemeAnalysis, SubmissionStatus, WalletCredential};

use crate::adapter::{RequirementsSource, StatusReport, SubmissionGateway, SubmissionRequest, WalletSource};
use crate::error::RemoteError;

const DEMO_WALLET: &str = include_str!("../fixtures/demo_wallet.json");

/// Scheme page of the DHI feasibility-study subsidy.
pub const DHI_SCHEME_URL: &str = "https://www.rvo.nl/subsidies-financiering/dhi-haalbaarheidsstudies";

/// Requirement ids the DHI scheme analysis reports.
pub const DHI_SCHEME_ATTESTATIONS: &[&str] = &[
    "chamber_of_commerce_kvk_nummer",
    "chamber_of_commerce_rechtsvorm",
    "certificates_mbk_verklaring",
];

const DHI_NON_ATTESTATIONS: &[&str] = &[
    "haalbaarheidsstudie",
    "businessplan",
    "projectplan",
    "eHerkenning niveau 2+",
    "RVO-inlog",
    "DHI-voortgangsrapportages",
    "DHI-eindrapportages",
    "wijzigingsformulier",
];

/// Shared failure injection and latency for a mock.
#[derive(Debug, Default)]
struct Behaviour {
    transient_failures: AtomicU32,
    delay: Duration,
    calls: AtomicU32,
}

impl Behaviour {
    /// Count the call, sleep, then fail if failures remain.
    async fn enter(&self, endpoint: &str) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let remaining = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match remaining {
            Ok(_) => Err(RemoteError::unavailable(endpoint, "injected transient failure")),
            Err(_) => Ok(()),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The five demo credentials: authentication, business, SME declaration,
/// previous exporter and de-minimis room.
pub fn demo_credentials() -> Result<Vec<WalletCredential>, RemoteError> {
    let invalid = |message: String| RemoteError::InvalidResponse {
        endpoint: "demo wallet fixture".to_string(),
        message,
    };
    let fixture: Value = serde_json::from_str(DEMO_WALLET).map_err(|e| invalid(e.to_string()))?;
    let entries = fixture
        .get("credentials")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("missing credentials array".to_string()))?;
    entries
        .iter()
        .cloned()
        .map(|c| WalletCredential::from_json(c).map_err(RemoteError::from))
        .collect()
}

/// The DHI scheme analysis as the analyser reports it.
pub fn dhi_scheme_analysis() -> SchemeAnalysis {
    SchemeAnalysis {
        url: DHI_SCHEME_URL.to_string(),
        title: "DHI-subsidieregeling: Haalbaarheidsstudies".to_string(),
        analyzed_at: Timestamp::parse("2025-10-03T00:21:16Z").ok(),
        attestations: DHI_SCHEME_ATTESTATIONS
            .iter()
            .filter_map(|id| RequirementId::new(*id).ok())
            .collect(),
        non_attestations: DHI_NON_ATTESTATIONS.iter().map(|s| s.to_string()).collect(),
        analysis_notes: Value::String(
            "The content mentions several requirements for the DHI subsidy.".to_string(),
        ),
        additional_fields: dhi_additional_fields(),
    }
}

// ─── Wallet ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockWalletSource {
    credentials: Vec<WalletCredential>,
    behaviour: Behaviour,
}

impl MockWalletSource {
    pub fn new(credentials: Vec<WalletCredential>) -> Self {
        Self {
            credentials,
            behaviour: Behaviour::default(),
        }
    }

    /// A wallet holding [`demo_credentials`].
    pub fn demo() -> Result<Self, RemoteError> {
        Ok(Self::new(demo_credentials()?))
    }

    /// Fail the next `n` calls with a transient error.
    pub fn failing_first(mut self, n: u32) -> Self {
        self.behaviour.transient_failures = AtomicU32::new(n);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.behaviour.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.behaviour.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSource for MockWalletSource {
    async fn fetch_credentials(&self, _application_id: ApplicationId) -> Result<Vec<WalletCredential>, RemoteError> {
        self.behaviour.enter("mock wallet").await?;
        Ok(self.credentials.clone())
    }

    fn source_name(&self) -> &'static str {
        "wallet-mock"
    }
}

// ─── Scheme analysis ────────────────────────────────────────────────

/// Answers every scheme URL with the same analysis.
#[derive(Debug)]
pub struct MockRequirementsSource {
    analysis: SchemeAnalysis,
    behaviour: Behaviour,
}

impl Default for MockRequirementsSource {
    fn default() -> Self {
        Self::dhi()
    }
}

impl MockRequirementsSource {
    pub fn new(analysis: SchemeAnalysis) -> Self {
        Self {
            analysis,
            behaviour: Behaviour::default(),
        }
    }

    pub fn dhi() -> Self {
        Self::new(dhi_scheme_analysis())
    }

    /// Analysis requesting every DHI wallet attribute.
    pub fn dhi_full() -> Self {
        let mut analysis = dhi_scheme_analysis();
        analysis.attestations = DHI_REQUESTED_CREDENTIALS
            .iter()
            .filter_map(|id| RequirementId::new(*id).ok())
            .collect();
        Self::new(analysis)
    }

    pub fn failing_first(mut self, n: u32) -> Self {
        self.behaviour.transient_failures = AtomicU32::new(n);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.behaviour.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.behaviour.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequirementsSource for MockRequirementsSource {
    async fn analyze(&self, scheme_url: &str) -> Result<SchemeAnalysis, RemoteError> {
        self.behaviour.enter("mock analyze").await?;
        let mut analysis = self.analysis.clone();
        analysis.url = scheme_url.to_string();
        Ok(analysis)
    }

    fn source_name(&self) -> &'static str {
        "analysis-mock"
    }
}

// ─── RVO gateway ────────────────────────────────────────────────────

/// How the mock gateway answers `submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockSubmitOutcome {
    Accept,
    Reject(String),
    Unavailable,
}

#[derive(Debug)]
pub struct MockSubmissionGateway {
    outcome: MockSubmitOutcome,
    behaviour: Behaviour,
    /// Statuses returned by successive `fetch_status` calls; the last one
    /// repeats.
    status_script: Mutex<VecDeque<(SubmissionStatus, Option<String>)>>,
    accepted: Mutex<Vec<SubmissionRequest>>,
}

impl Default for MockSubmissionGateway {
    fn default() -> Self {
        Self::accepting()
    }
}

impl MockSubmissionGateway {
    pub fn new(outcome: MockSubmitOutcome) -> Self {
        Self {
            outcome,
            behaviour: Behaviour::default(),
            status_script: Mutex::new(VecDeque::new()),
            accepted: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(MockSubmitOutcome::Accept)
    }

    pub fn rejecting(reason: &str) -> Self {
        Self::new(MockSubmitOutcome::Reject(reason.to_string()))
    }

    pub fn failing_first(mut self, n: u32) -> Self {
        self.behaviour.transient_failures = AtomicU32::new(n);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.behaviour.delay = delay;
        self
    }

    /// Queue a status for a later `fetch_status`.
    pub fn then_status(self, status: SubmissionStatus, reason: Option<&str>) -> Self {
        lock(&self.status_script).push_back((status, reason.map(str::to_string)));
        self
    }

    /// Requests the gateway accepted, in order.
    pub fn accepted(&self) -> Vec<SubmissionRequest> {
        lock(&self.accepted).clone()
    }

    pub fn calls(&self) -> u32 {
        self.behaviour.calls.load(Ordering::SeqCst)
    }

    fn reference_for(application_id: &ApplicationId) -> String {
        let id = application_id.to_string();
        let prefix: String = id.chars().filter(|c| *c != '-').take(8).collect();
        format!("RVO-{}", prefix.to_ascii_uppercase())
    }
}

#[async_trait]
impl SubmissionGateway for MockSubmissionGateway {
    async fn submit(&self, request: &SubmissionRequest) -> Result<RvoSubmission, RemoteError> {
        let endpoint = "mock submit";
        self.behaviour.enter(endpoint).await?;
        match &self.outcome {
            MockSubmitOutcome::Accept => {}
            MockSubmitOutcome::Reject(reason) => {
                return Err(RemoteError::Rejected {
                    endpoint: endpoint.to_string(),
                    reason: reason.clone(),
                })
            }
            MockSubmitOutcome::Unavailable => {
                return Err(RemoteError::unavailable(endpoint, "gateway offline"))
            }
        }
        lock(&self.accepted).push(request.clone());
        Ok(RvoSubmission {
            reference: Self::reference_for(&request.application_id),
            attestation: request.attestation.clone(),
            documents: request.documents.clone(),
            submitted_at: Timestamp::now(),
            status: SubmissionStatus::Submitted,
        })
    }

    async fn fetch_status(&self, reference: &str) -> Result<StatusReport, RemoteError> {
        self.behaviour.enter("mock status").await?;
        let (status, reason) = {
            let mut script = lock(&self.status_script);
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        }
        .unwrap_or((SubmissionStatus::Submitted, None));
        Ok(StatusReport {
            reference: reference.to_string(),
            status,
            reason,
            last_updated: Timestamp::now(),
        })
    }

    fn gateway_name(&self) -> &'static str {
        "rvo-mock"
    }
}
