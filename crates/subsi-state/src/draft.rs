//! # Application Draft
//!
//! The draft accumulates everything an application needs before it can be
//! attested: wallet credentials and the scheme's additional information.
//!
//! ## Status
//!
//! ```text
//! Draft ◀──▶ Complete ──▶ Submitted (terminal)
//! ```
//!
//! `missingFields` and `status` are never set directly. Every mutation
//! recomputes them from the requirements, so `Complete` holds exactly when
//! nothing is missing. A draft moves to `Submitted` only together with an
//! attestation that references its id.
//!
//! ## Purity
//!
//! [`DraftManager`] operations take a draft by reference and return the
//! next draft value. A failed operation leaves the input untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use subsi_core::canonical::contains_float;
use subsi_core::{ApplicationId, FieldId, RequirementId, Timestamp};
use subsi_vc::{
    Attestation, CredentialError, CredentialStore, RequirementEvaluator, RvoRequirements,
    WalletCredential,
};

// ─── Status ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Draft,
    Complete,
    Submitted,
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "DRAFT",
            Self::Complete => "COMPLETE",
            Self::Submitted => "SUBMITTED",
        };
        f.write_str(s)
    }
}

/// One entry of `missingFields`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum MissingField {
    /// A requested credential the wallet does not satisfy.
    Credential(RequirementId),
    /// A declared additional field that is still unset.
    Information(FieldId),
}

impl MissingField {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Credential(id) => id.as_str(),
            Self::Information(id) => id.as_str(),
        }
    }
}

impl std::fmt::Display for MissingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum DraftError {
    /// The patch names a field the scheme does not declare.
    #[error("unknown field {field:?}: not declared by the scheme")]
    UnknownField { field: String },

    /// The patch carries a floating-point number, which cannot be attested.
    #[error("field {field:?} contains a floating-point number; use integers or strings")]
    NonCanonicalValue { field: String },

    /// The draft has been submitted and is frozen.
    #[error("application {id} has already been submitted")]
    AlreadySubmitted { id: ApplicationId },

    /// `mark_submitted` on a draft that is not complete.
    #[error("application {id} is not complete: {missing} field(s) missing")]
    NotComplete { id: ApplicationId, missing: usize },

    /// The attestation references another application.
    #[error("attestation references application {found}, expected {expected}")]
    AttestationMismatch {
        expected: ApplicationId,
        found: ApplicationId,
    },

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

// ─── Draft ───────────────────────────────────────────────────────────

/// An application being assembled. Only [`DraftManager`] produces new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDraft {
    id: ApplicationId,
    wallet_credentials: Vec<WalletCredential>,
    additional_information: BTreeMap<FieldId, Value>,
    missing_fields: Vec<MissingField>,
    status: DraftStatus,
    created_at: Timestamp,
    updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attestation_id: Option<String>,
}

impl ApplicationDraft {
    pub fn id(&self) -> ApplicationId {
        self.id
    }

    pub fn wallet_credentials(&self) -> &[WalletCredential] {
        &self.wallet_credentials
    }

    pub fn additional_information(&self) -> &BTreeMap<FieldId, Value> {
        &self.additional_information
    }

    /// Missing credentials in requested order, then unset fields in declared order.
    pub fn missing_fields(&self) -> &[MissingField] {
        &self.missing_fields
    }

    pub fn status(&self) -> DraftStatus {
        self.status
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Id of the attestation this draft was submitted with.
    pub fn attestation_id(&self) -> Option<&str> {
        self.attestation_id.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.status == DraftStatus::Complete
    }

    /// Credential identifiers still missing.
    pub fn missing_credentials(&self) -> impl Iterator<Item = &RequirementId> {
        self.missing_fields.iter().filter_map(|m| match m {
            MissingField::Credential(id) => Some(id),
            MissingField::Information(_) => None,
        })
    }
}

/// Whether a field value counts as filled in.
///
/// `null`, blank strings, empty arrays and empty objects are unset.
pub fn is_value_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

// ─── Manager ─────────────────────────────────────────────────────────

/// Applies mutations to drafts of one scheme.
#[derive(Debug, Clone)]
pub struct DraftManager {
    requirements: RvoRequirements,
    evaluator: RequirementEvaluator,
}

impl DraftManager {
    pub fn new(requirements: RvoRequirements, evaluator: RequirementEvaluator) -> Self {
        Self {
            requirements,
            evaluator,
        }
    }

    pub fn requirements(&self) -> &RvoRequirements {
        &self.requirements
    }

    pub fn evaluator(&self) -> &RequirementEvaluator {
        &self.evaluator
    }

    /// A fresh draft with nothing provided yet.
    pub fn create(&self, id: ApplicationId) -> ApplicationDraft {
        let now = Timestamp::now();
        let mut draft = ApplicationDraft {
            id,
            wallet_credentials: Vec::new(),
            additional_information: BTreeMap::new(),
            missing_fields: Vec::new(),
            status: DraftStatus::Draft,
            created_at: now,
            updated_at: now,
            attestation_id: None,
        };
        self.recompute(&mut draft, &CredentialStore::new());
        draft
    }

    /// Merge `patch` into the additional information.
    ///
    /// Patch keys overwrite; a `null` value clears the field. Every key is
    /// checked before anything is applied.
    pub fn update_additional_information(
        &self,
        draft: &ApplicationDraft,
        patch: BTreeMap<FieldId, Value>,
    ) -> Result<ApplicationDraft, DraftError> {
        self.require_open(draft)?;
        for (field, value) in &patch {
            if !self.requirements.declares_field(field) {
                tracing::warn!(application_id = %draft.id, field = %field, "patch names undeclared field");
                return Err(DraftError::UnknownField {
                    field: field.to_string(),
                });
            }
            if contains_float(value) {
                return Err(DraftError::NonCanonicalValue {
                    field: field.to_string(),
                });
            }
        }

        let store = Self::store_of(draft)?;
        let mut next = draft.clone();
        for (field, value) in patch {
            if value.is_null() {
                next.additional_information.remove(&field);
            } else {
                next.additional_information.insert(field, value);
            }
        }
        self.recompute(&mut next, &store);
        next.updated_at = Timestamp::now();
        Ok(next)
    }

    /// Replace the draft's wallet credentials.
    pub fn attach_credentials(
        &self,
        draft: &ApplicationDraft,
        credentials: Vec<WalletCredential>,
    ) -> Result<ApplicationDraft, DraftError> {
        self.require_open(draft)?;
        let mut store = CredentialStore::new();
        store.load(credentials)?;

        let mut next = draft.clone();
        next.wallet_credentials = store.credentials().to_vec();
        self.recompute(&mut next, &store);
        next.updated_at = Timestamp::now();
        Ok(next)
    }

    /// Freeze a complete draft against the attestation it was submitted with.
    pub fn mark_submitted(
        &self,
        draft: &ApplicationDraft,
        attestation: &Attestation,
    ) -> Result<ApplicationDraft, DraftError> {
        self.require_open(draft)?;
        if !draft.is_complete() {
            return Err(DraftError::NotComplete {
                id: draft.id,
                missing: draft.missing_fields.len(),
            });
        }
        if attestation.application_id() != draft.id {
            return Err(DraftError::AttestationMismatch {
                expected: draft.id,
                found: attestation.application_id(),
            });
        }
        let mut next = draft.clone();
        next.status = DraftStatus::Submitted;
        next.attestation_id = Some(attestation.id.clone());
        next.updated_at = Timestamp::now();
        tracing::info!(application_id = %draft.id, attestation_id = %attestation.id, "draft submitted");
        Ok(next)
    }

    fn require_open(&self, draft: &ApplicationDraft) -> Result<(), DraftError> {
        if draft.status == DraftStatus::Submitted {
            return Err(DraftError::AlreadySubmitted { id: draft.id });
        }
        Ok(())
    }

    fn store_of(draft: &ApplicationDraft) -> Result<CredentialStore, DraftError> {
        let mut store = CredentialStore::new();
        store.load(draft.wallet_credentials.clone())?;
        Ok(store)
    }

    fn recompute(&self, draft: &mut ApplicationDraft, store: &CredentialStore) {
        let evaluation = self.evaluator.evaluate(&self.requirements, store);
        let mut missing: Vec<MissingField> = evaluation
            .missing
            .into_iter()
            .map(MissingField::Credential)
            .collect();
        missing.extend(
            self.requirements
                .additional_information()
                .iter()
                .filter(|f| !draft.additional_information.get(*f).is_some_and(is_value_set))
                .cloned()
                .map(MissingField::Information),
        );
        draft.status = if missing.is_empty() {
            DraftStatus::Complete
        } else {
            DraftStatus::Draft
        };
        draft.missing_fields = missing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use subsi_core::CredentialId;
    use subsi_vc::credential::{BusinessSubject, CredentialSubject};
    use subsi_vc::{AttestationProof, AttestationSubject};

    fn fid(s: &str) -> FieldId {
        FieldId::new(s).unwrap()
    }

    fn manager() -> DraftManager {
        let requirements = RvoRequirements::new(
            [RequirementId::new("chamber_of_commerce_kvk_nummer").unwrap()],
            [fid("projectLocationDHI"), fid("startDate")],
        );
        DraftManager::new(requirements, RequirementEvaluator::builtin())
    }

    fn business() -> WalletCredential {
        WalletCredential {
            id: CredentialId::new("business_001").unwrap(),
            issuer: "KVK".into(),
            issued_at: Timestamp::parse("2024-01-01T00:00:00Z").unwrap(),
            expires_at: None,
            subject: CredentialSubject::Business(BusinessSubject {
                kvk_number: "NLNHR.4403655".into(),
                ..Default::default()
            }),
        }
    }

    fn patch(pairs: &[(&str, Value)]) -> BTreeMap<FieldId, Value> {
        pairs.iter().map(|(k, v)| (fid(k), v.clone())).collect()
    }

    fn attestation_for(id: ApplicationId) -> Attestation {
        Attestation {
            id: "urn:sha256:ab".into(),
            attestation_type: subsi_vc::ATTESTATION_TYPE.into(),
            issuer: subsi_vc::DEFAULT_ISSUER.into(),
            issued_at: Timestamp::now(),
            credential_subject: AttestationSubject {
                wallet_credentials: vec![],
                additional_information: BTreeMap::new(),
                application_id: id,
            },
            proof: AttestationProof {
                proof_type: subsi_vc::PROOF_TYPE.into(),
                jwt: "a.b.c".into(),
            },
        }
    }

    fn complete_draft(m: &DraftManager) -> ApplicationDraft {
        let d = m.create(ApplicationId::new());
        let d = m.attach_credentials(&d, vec![business()]).unwrap();
        m.update_additional_information(
            &d,
            patch(&[("projectLocationDHI", json!("Ghana")), ("startDate", json!("2025-01-01"))]),
        )
        .unwrap()
    }

    #[test]
    fn create_lists_every_requirement() {
        let d = manager().create(ApplicationId::new());
        assert_eq!(d.status(), DraftStatus::Draft);
        let names: Vec<&str> = d.missing_fields().iter().map(|m| m.as_str()).collect();
        assert_eq!(names, ["chamber_of_commerce_kvk_nummer", "projectLocationDHI", "startDate"]);
        assert_eq!(d.created_at(), d.updated_at());
    }

    #[test]
    fn create_with_no_requirements_is_complete() {
        let m = DraftManager::new(RvoRequirements::default(), RequirementEvaluator::builtin());
        assert!(m.create(ApplicationId::new()).is_complete());
    }

    #[test]
    fn credentials_then_information_completes_draft() {
        let m = manager();
        let d = m.create(ApplicationId::new());
        let d = m.attach_credentials(&d, vec![business()]).unwrap();
        assert_eq!(d.missing_credentials().count(), 0);
        assert_eq!(d.status(), DraftStatus::Draft);
        let d = complete_draft(&m);
        assert!(d.is_complete());
        assert!(d.missing_fields().is_empty());
    }

    #[test]
    fn blank_and_null_values_count_as_unset() {
        let m = manager();
        let d = complete_draft(&m);
        let d = m
            .update_additional_information(&d, patch(&[("startDate", json!("  "))]))
            .unwrap();
        assert_eq!(d.status(), DraftStatus::Draft);
        assert_eq!(d.missing_fields(), [MissingField::Information(fid("startDate"))]);

        let d = m
            .update_additional_information(&d, patch(&[("startDate", json!("2025-02-01")), ("projectLocationDHI", Value::Null)]))
            .unwrap();
        assert!(!d.additional_information().contains_key(&fid("projectLocationDHI")));
        assert_eq!(d.missing_fields(), [MissingField::Information(fid("projectLocationDHI"))]);
    }

    #[test]
    fn unknown_field_and_float_are_rejected_without_change() {
        let m = manager();
        let d = m.create(ApplicationId::new());
        let err = m
            .update_additional_information(&d, patch(&[("startDate", json!("x")), ("favouriteColour", json!("blue"))]))
            .unwrap_err();
        assert!(matches!(err, DraftError::UnknownField { ref field } if field == "favouriteColour"));

        let err = m
            .update_additional_information(&d, patch(&[("startDate", json!({"budget": 1.5}))]))
            .unwrap_err();
        assert!(matches!(err, DraftError::NonCanonicalValue { .. }));
        assert!(d.additional_information().is_empty());
    }

    #[test]
    fn invalid_credential_is_rejected() {
        let m = manager();
        let d = m.create(ApplicationId::new());
        let mut bad = business();
        bad.issuer = String::new();
        assert!(matches!(
            m.attach_credentials(&d, vec![bad]),
            Err(DraftError::Credential(_))
        ));
    }

    #[test]
    fn mark_submitted_requires_complete_and_matching_attestation() {
        let m = manager();
        let incomplete = m.create(ApplicationId::new());
        assert!(matches!(
            m.mark_submitted(&incomplete, &attestation_for(incomplete.id())),
            Err(DraftError::NotComplete { missing: 3, .. })
        ));

        let d = complete_draft(&m);
        assert!(matches!(
            m.mark_submitted(&d, &attestation_for(ApplicationId::new())),
            Err(DraftError::AttestationMismatch { .. })
        ));

        let submitted = m.mark_submitted(&d, &attestation_for(d.id())).unwrap();
        assert_eq!(submitted.status(), DraftStatus::Submitted);
        assert_eq!(submitted.attestation_id(), Some("urn:sha256:ab"));
        assert!(matches!(
            m.update_additional_information(&submitted, patch(&[("startDate", json!("2026-01-01"))])),
            Err(DraftError::AlreadySubmitted { .. })
        ));
        assert!(matches!(
            m.attach_credentials(&submitted, vec![]),
            Err(DraftError::AlreadySubmitted { .. })
        ));
    }

    #[test]
    fn missing_field_wire_shape() {
        let v = serde_json::to_value(MissingField::Information(fid("startDate"))).unwrap();
        assert_eq!(v, json!({"kind": "information", "id": "startDate"}));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            Just(json!("")),
            Just(json!([])),
            "[a-z ]{0,6}".prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn same_patch_twice_is_idempotent(
            location in arb_value(),
            start in arb_value(),
            with_credentials in any::<bool>(),
        ) {
            let m = manager();
            let mut d = m.create(ApplicationId::new());
            if with_credentials {
                d = m.attach_credentials(&d, vec![business()]).unwrap();
            }
            let p = patch(&[("projectLocationDHI", location), ("startDate", start)]);
            let once = m.update_additional_information(&d, p.clone()).unwrap();
            let twice = m.update_additional_information(&once, p).unwrap();
            prop_assert_eq!(once.missing_fields(), twice.missing_fields());
            prop_assert_eq!(once.status(), twice.status());
            prop_assert_eq!(once.additional_information(), twice.additional_information());
        }

        #[test]
        fn complete_iff_nothing_missing(
            patches in proptest::collection::vec((0usize..2, arb_value()), 0..6),
            with_credentials in any::<bool>(),
        ) {
            let m = manager();
            let mut d = m.create(ApplicationId::new());
            prop_assert_eq!(d.is_complete(), d.missing_fields().is_empty());
            if with_credentials {
                d = m.attach_credentials(&d, vec![business()]).unwrap();
                prop_assert_eq!(d.is_complete(), d.missing_fields().is_empty());
            }
            for (which, value) in patches {
                let key = ["projectLocationDHI", "startDate"][which];
                d = m.update_additional_information(&d, patch(&[(key, value)])).unwrap();
                prop_assert_eq!(d.is_complete(), d.missing_fields().is_empty());
            }
        }
    }
}
