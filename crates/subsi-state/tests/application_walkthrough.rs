//! Walks a draft and a flow machine together from an empty wallet to a
//! submitted application, the way a session drives them.

use std::collections::BTreeMap;

use serde_json::json;
use subsi_core::{ApplicationId, CredentialId, FieldId, RequirementId, Timestamp};
use subsi_crypto::Ed25519KeyPair;
use subsi_state::{
    AttestationBuilder, Budget, BudgetLine, DraftManager, DraftStatus, FlowMachine, Outcome,
    ProjectPlan, Stage,
};
use subsi_vc::credential::{BusinessSubject, CredentialSubject, MkbDeclarationSubject};
use subsi_vc::{Ed25519JwsSigner, RequirementEvaluator, RvoRequirements, WalletCredential};

fn wallet() -> Vec<WalletCredential> {
    let issued = Timestamp::parse("2024-01-01T00:00:00Z").unwrap();
    vec![
        WalletCredential {
            id: CredentialId::new("business_001").unwrap(),
            issuer: "KVK".into(),
            issued_at: issued,
            expires_at: None,
            subject: CredentialSubject::Business(BusinessSubject {
                kvk_number: "NLNHR.4403655".into(),
                legal_form: "Besloten Vennootschap (B.V.)".into(),
                ..Default::default()
            }),
        },
        WalletCredential {
            id: CredentialId::new("mkb_001").unwrap(),
            issuer: "MKB".into(),
            issued_at: issued,
            expires_at: None,
            subject: CredentialSubject::MkbDeclaration(MkbDeclarationSubject { mkb_declaration: true }),
        },
    ]
}

fn step(flow: &mut FlowMachine, outcome: Outcome) -> Stage {
    flow.confirm();
    flow.advance(outcome).unwrap()
}

#[tokio::test]
async fn empty_wallet_to_submitted_application() {
    let requirements = RvoRequirements::new(
        ["chamber_of_commerce_kvk_nummer", "chamber_of_commerce_rechtsvorm", "certificates_mbk_verklaring"]
            .map(|r| RequirementId::new(r).unwrap()),
        [FieldId::new("projectLocationDHI").unwrap()],
    );
    let manager = DraftManager::new(requirements, RequirementEvaluator::builtin());
    let mut flow = FlowMachine::new();
    let mut draft = manager.create(ApplicationId::new());
    assert_eq!(draft.missing_fields().len(), 4);

    step(&mut flow, Outcome::Continue);
    flow.facts_mut().authorized = true;
    step(&mut flow, Outcome::Continue);

    draft = manager.attach_credentials(&draft, wallet()).unwrap();
    flow.facts_mut().credentials_loaded = true;
    step(&mut flow, Outcome::Continue);
    flow.facts_mut().intake_provided = true;
    step(&mut flow, Outcome::Continue);
    flow.facts_mut().requirements_known = true;
    step(&mut flow, Outcome::Continue);
    step(&mut flow, Outcome::Continue);
    flow.facts_mut().credentials_satisfied = draft.missing_credentials().next().is_none();
    assert_eq!(step(&mut flow, Outcome::Continue), Stage::Success);

    assert_eq!(step(&mut flow, Outcome::ChooseProjectPlan), Stage::ProjectPlan);
    let plan = ProjectPlan {
        countries: "Ghana".into(),
        project_title: "Solar irrigation feasibility".into(),
        start_date: Some("2025-03-01".parse().unwrap()),
        end_date: Some("2025-12-31".parse().unwrap()),
    };
    flow.facts_mut().project_plan_done = plan.is_complete();
    assert_eq!(step(&mut flow, Outcome::Continue), Stage::Budget);

    let budget = Budget::Composed {
        lines: vec![BudgetLine { description: "Feasibility study".into(), amount_cents: 4_000_000 }],
    };
    flow.facts_mut().budget_done = budget.is_ready();
    flow.confirm();
    assert!(flow.advance(Outcome::Continue).is_err(), "draft still misses projectLocationDHI");

    let mut patch = BTreeMap::new();
    patch.insert(FieldId::new("projectLocationDHI").unwrap(), json!("Ghana"));
    draft = manager.update_additional_information(&draft, patch).unwrap();
    flow.facts_mut().draft_complete = draft.is_complete();
    assert_eq!(flow.advance(Outcome::Continue).unwrap(), Stage::FinalConfirm);

    let signer = Ed25519JwsSigner::new(Ed25519KeyPair::generate());
    let attestation = AttestationBuilder::default().build(&draft, &signer).await.unwrap();
    attestation.verify(&signer.public_key()).unwrap();
    flow.facts_mut().attestation_built = true;
    flow.facts_mut().attestation_confirmed = true;
    assert_eq!(step(&mut flow, Outcome::Continue), Stage::Submitting);

    draft = manager.mark_submitted(&draft, &attestation).unwrap();
    flow.facts_mut().submitted = draft.status() == DraftStatus::Submitted;
    assert_eq!(step(&mut flow, Outcome::Continue), Stage::ApplicationSuccess);
    assert_eq!(flow.transitions().len(), 12);
}
