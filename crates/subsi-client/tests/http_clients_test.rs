//! HTTP client tests against a wiremock server.

use std::collections::BTreeMap;

use serde_json::json;
use subsi_client::{
    with_retry, ClientConfig, HttpRequirementsSource, HttpSubmissionGateway, HttpWalletSource, RemoteError,
    RequirementsSource, RetryPolicy, SubmissionGateway, SubmissionRequest, WalletSource,
};
use subsi_core::{ApplicationId, Timestamp};
use subsi_vc::{Attestation, AttestationProof, AttestationSubject, CredentialType, SubmissionStatus};
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::single_base(Url::parse(&server.uri()).unwrap(), "test-token")
}

fn request() -> SubmissionRequest {
    let application_id = ApplicationId::parse("8d4c0f5e-1234-4abc-9def-000000000000").unwrap();
    SubmissionRequest {
        application_id,
        attestation: Attestation {
            id: "urn:sha256:ab".into(),
            attestation_type: "DhiSubsidyApplication".into(),
            issuer: "EntrepreneurAI".into(),
            issued_at: Timestamp::parse("2025-01-01T00:00:00Z").unwrap(),
            credential_subject: AttestationSubject {
                wallet_credentials: vec![],
                additional_information: BTreeMap::new(),
                application_id,
            },
            proof: AttestationProof {
                proof_type: "JwtProof2020".into(),
                jwt: "h.p.s".into(),
            },
        },
        documents: vec![],
    }
}

#[tokio::test]
async fn wallet_fetch_parses_typed_credentials() {
    let server = MockServer::start().await;
    let id = ApplicationId::new();

    Mock::given(method("GET"))
        .and(path("/api/v1/wallet/credentials"))
        .and(query_param("applicationId", id.to_string().as_str()))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "credentials": [{
                "id": "mkb_001", "type": "MkbDeclarationCredential", "issuer": "MKB",
                "issuedAt": "2024-01-01T00:00:00Z", "credentialSubject": {"mkbDeclaration": true}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let wallet = HttpWalletSource::new(&config(&server)).unwrap();
    let creds = wallet.fetch_credentials(id).await.unwrap();
    assert_eq!(creds.len(), 1);
    assert_eq!(creds[0].credential_type(), CredentialType::MkbDeclaration);
}

#[tokio::test]
async fn wallet_fetch_imports_export_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/wallet/credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{
                "displayProperties": {"credentialTypeDisplay": {"displayName": "KVK Registratie"}},
                "issuer": "KVK",
                "issuanceDate": "2024-05-01T10:00:00Z",
                "credentialSubject": {
                    "identifier": {"EUID": "NLNHR.4403655"},
                    "legalFormType": "Besloten Vennootschap (B.V.)"
                }
            }]
        })))
        .mount(&server)
        .await;

    let wallet = HttpWalletSource::new(&config(&server)).unwrap();
    let creds = wallet.fetch_credentials(ApplicationId::new()).await.unwrap();
    assert_eq!(creds.len(), 1);
    assert_eq!(creds[0].credential_type(), CredentialType::Business);
}

#[tokio::test]
async fn malformed_credential_is_invalid_not_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/wallet/credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "credentials": [{
                "id": "mkb_001", "type": "MkbDeclarationCredential", "issuer": "MKB",
                "issuedAt": "2024-01-01T00:00:00Z", "credentialSubject": "not an object"
            }]
        })))
        .mount(&server)
        .await;

    let wallet = HttpWalletSource::new(&config(&server)).unwrap();
    let err = wallet.fetch_credentials(ApplicationId::new()).await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidCredential(_)), "got {err:?}");
    assert!(!err.is_transient());
}

#[tokio::test]
async fn analyze_accepts_snake_case_analyser_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/analyze"))
        .and(body_partial_json(json!({"url": "https://www.rvo.nl/dhi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "url": "https://www.rvo.nl/dhi",
            "title": "DHI-subsidieregeling: Haalbaarheidsstudies",
            "analyzed_at": "2025-10-03T00:21:16.216Z",
            "pages_analyzed": 6,
            "attestations": ["chamber_of_commerce_kvk_nummer", "certificates_mbk_verklaring"],
            "non_attestations": ["businessplan"],
            "analysis_notes": "notes"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = HttpRequirementsSource::new(&config(&server)).unwrap();
    let analysis = source.analyze("https://www.rvo.nl/dhi").await.unwrap();
    assert_eq!(analysis.attestations.len(), 2);
    assert_eq!(analysis.non_attestations, vec!["businessplan".to_string()]);
    assert!(analysis.analyzed_at.is_some());
}

#[tokio::test]
async fn submit_returns_gateway_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/submissions"))
        .and(body_partial_json(json!({"applicationId": "8d4c0f5e-1234-4abc-9def-000000000000"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "reference": "RVO-8D4C0F5E",
            "status": "submitted",
            "submittedAt": "2025-01-02T09:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpSubmissionGateway::new(&config(&server)).unwrap();
    let submission = gateway.submit(&request()).await.unwrap();
    assert_eq!(submission.reference, "RVO-8D4C0F5E");
    assert_eq!(submission.status, SubmissionStatus::Submitted);
    assert_eq!(submission.attestation.id, "urn:sha256:ab");
}

#[tokio::test]
async fn submit_without_explicit_status_is_not_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/submissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reference": "RVO-1", "status": "queued"
        })))
        .mount(&server)
        .await;

    let gateway = HttpSubmissionGateway::new(&config(&server)).unwrap();
    let err = gateway.submit(&request()).await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse { .. }), "got {err:?}");
}

#[tokio::test]
async fn submit_rejection_surfaces_reason_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/submissions"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "error": {"code": "DEADLINE", "message": "De aanvraagperiode is gesloten"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpSubmissionGateway::new(&config(&server)).unwrap();
    let policy = RetryPolicy { max_retries: 3, base_delay_ms: 1 };
    let req = request();
    let err = with_retry(&policy, "submit", || gateway.submit(&req))
        .await
        .unwrap_err();
    match err {
        RemoteError::Rejected { reason, .. } => assert_eq!(reason, "De aanvraagperiode is gesloten"),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/submissions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/submissions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "reference": "RVO-8D4C0F5E", "status": "submitted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpSubmissionGateway::new(&config(&server)).unwrap();
    let policy = RetryPolicy { max_retries: 3, base_delay_ms: 1 };
    let req = request();
    let submission = with_retry(&policy, "submit", || gateway.submit(&req)).await.unwrap();
    assert_eq!(submission.reference, "RVO-8D4C0F5E");
}

#[tokio::test]
async fn exhausted_retries_report_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/submissions/RVO-1/status"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let gateway = HttpSubmissionGateway::new(&config(&server)).unwrap();
    let policy = RetryPolicy { max_retries: 2, base_delay_ms: 1 };
    let err = with_retry(&policy, "status", || gateway.fetch_status("RVO-1")).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable { attempts: 3, .. }), "got {err:?}");
}

#[tokio::test]
async fn status_maps_review_states_and_reason() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/submissions/RVO-2/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "under_review", "lastUpdated": "2025-02-01T12:00:00Z"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/submissions/RVO-3/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reference": "RVO-3", "status": "rejected", "reason": "Begroting onvolledig"
        })))
        .mount(&server)
        .await;

    let gateway = HttpSubmissionGateway::new(&config(&server)).unwrap();
    let review = gateway.fetch_status("RVO-2").await.unwrap();
    assert_eq!(review.reference, "RVO-2");
    assert_eq!(review.status, SubmissionStatus::Submitted);

    let rejected = gateway.fetch_status("RVO-3").await.unwrap();
    assert_eq!(rejected.status, SubmissionStatus::Rejected);
    assert_eq!(rejected.reason.as_deref(), Some("Begroting onvolledig"));
}

#[tokio::test]
async fn unreachable_service_is_transient() {
    let cfg = ClientConfig::local_mock(1, "test-token").unwrap();
    let wallet = HttpWalletSource::new(&cfg).unwrap();
    let err = wallet.fetch_credentials(ApplicationId::new()).await.unwrap_err();
    assert!(err.is_transient(), "got {err:?}");
}
