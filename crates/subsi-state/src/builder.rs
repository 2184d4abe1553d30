//! # Attestation Builder
//!
//! Turns a complete draft into a signed [`Attestation`]. The signer is only
//! consulted once the draft has been checked; an incomplete draft fails
//! with [`AttestationError::DraftIncomplete`] and nothing is signed.

use subsi_core::Timestamp;
use subsi_vc::{
    Attestation, AttestationError, AttestationProof, AttestationSubject, SigningCapability,
    SigningRequest, ATTESTATION_TYPE, DEFAULT_ISSUER, PROOF_TYPE,
};

use crate::draft::{ApplicationDraft, DraftStatus};

#[derive(Debug, Clone)]
pub struct AttestationBuilder {
    issuer: String,
}

impl Default for AttestationBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ISSUER)
    }
}

impl AttestationBuilder {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Build and sign the attestation for `draft`.
    ///
    /// Deterministic apart from `issuedAt` and the proof.
    pub async fn build(
        &self,
        draft: &ApplicationDraft,
        signer: &dyn SigningCapability,
    ) -> Result<Attestation, AttestationError> {
        if draft.status() != DraftStatus::Complete {
            return Err(AttestationError::DraftIncomplete {
                missing: draft.missing_fields().len(),
            });
        }

        let subject = AttestationSubject {
            wallet_credentials: draft.wallet_credentials().to_vec(),
            additional_information: draft.additional_information().clone(),
            application_id: draft.id(),
        };
        let digest = subject.digest()?;
        let request = SigningRequest {
            attestation_id: digest.to_urn(),
            issuer: self.issuer.clone(),
            issued_at: Timestamp::now(),
            subject_digest: digest,
        };
        let jwt = signer.sign(&request).await?;
        tracing::info!(
            application_id = %draft.id(),
            attestation_id = %request.attestation_id,
            "attestation built"
        );

        Ok(Attestation {
            id: request.attestation_id,
            attestation_type: ATTESTATION_TYPE.to_string(),
            issuer: request.issuer,
            issued_at: request.issued_at,
            credential_subject: subject,
            proof: AttestationProof {
                proof_type: PROOF_TYPE.to_string(),
                jwt,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::DraftManager;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use subsi_core::{ApplicationId, FieldId};
    use subsi_crypto::Ed25519KeyPair;
    use subsi_vc::{Ed25519JwsSigner, RequirementEvaluator, RvoRequirements};

    #[derive(Default)]
    struct CountingSigner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SigningCapability for CountingSigner {
        async fn sign(&self, _request: &SigningRequest) -> Result<String, AttestationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("h.p.s".to_string())
        }
    }

    fn manager() -> DraftManager {
        let requirements = RvoRequirements::new([], [FieldId::new("projectDetails").unwrap()]);
        DraftManager::new(requirements, RequirementEvaluator::builtin())
    }

    fn complete_draft() -> ApplicationDraft {
        let m = manager();
        let d = m.create(ApplicationId::new());
        let mut patch = BTreeMap::new();
        patch.insert(FieldId::new("projectDetails").unwrap(), "Solar pumps in Ghana".into());
        m.update_additional_information(&d, patch).unwrap()
    }

    #[tokio::test]
    async fn incomplete_draft_never_reaches_signer() {
        let signer = CountingSigner::default();
        let draft = manager().create(ApplicationId::new());
        let err = AttestationBuilder::default().build(&draft, &signer).await.unwrap_err();
        assert!(matches!(err, AttestationError::DraftIncomplete { missing: 1 }));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn complete_draft_is_attested_once_per_call() {
        let signer = CountingSigner::default();
        let draft = complete_draft();
        let att = AttestationBuilder::new("did:web:subsigenie.example")
            .build(&draft, &signer)
            .await
            .unwrap();
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(att.application_id(), draft.id());
        assert_eq!(att.attestation_type, "DhiSubsidyApplication");
        assert_eq!(att.proof.proof_type, "JwtProof2020");
        assert_eq!(att.issuer, "did:web:subsigenie.example");
    }

    #[tokio::test]
    async fn id_is_content_derived_and_proof_verifies() {
        let signer = Ed25519JwsSigner::new(Ed25519KeyPair::from_seed(&[4u8; 32]));
        let draft = complete_draft();
        let builder = AttestationBuilder::default();
        let first = builder.build(&draft, &signer).await.unwrap();
        let second = builder.build(&draft, &signer).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.credential_subject, second.credential_subject);
        first.verify(&signer.public_key()).unwrap();
    }
}
