//! End-to-end checks of `subsi evaluate` input handling.

use std::path::PathBuf;

use subsi_cli::evaluate::evaluate_files;

fn demo_wallet() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../subsi-client/fixtures/demo_wallet.json")
}

#[test]
fn demo_wallet_satisfies_dhi_attestations() {
    let dir = tempfile::tempdir().unwrap();
    let requirements = dir.path().join("dhi.yaml");
    std::fs::write(
        &requirements,
        "url: https://www.rvo.nl/subsidies-financiering/dhi-haalbaarheidsstudies\n\
         title: DHI\n\
         attestations:\n  - chamber_of_commerce_kvk_nummer\n  - chamber_of_commerce_rechtsvorm\n  - certificates_mbk_verklaring\n",
    )
    .unwrap();

    let evaluation = evaluate_files(&demo_wallet(), &requirements).unwrap();
    assert!(evaluation.is_satisfied(), "{evaluation:?}");
    assert_eq!(evaluation.satisfied.len(), 3);
}

#[test]
fn empty_wallet_misses_everything() {
    let dir = tempfile::tempdir().unwrap();
    let wallet = dir.path().join("wallet.json");
    let requirements = dir.path().join("req.json");
    std::fs::write(&wallet, r#"{"credentials": []}"#).unwrap();
    std::fs::write(
        &requirements,
        r#"{"requestedCredentials": ["kvkNumber", "mkbDeclaration"], "additionalInformation": []}"#,
    )
    .unwrap();

    let evaluation = evaluate_files(&wallet, &requirements).unwrap();
    assert_eq!(evaluation.missing.len(), 2);
    assert!(evaluation.satisfied.is_empty());
}

#[test]
fn malformed_credential_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let wallet = dir.path().join("wallet.json");
    let requirements = dir.path().join("req.json");
    std::fs::write(&wallet, r#"[{"id": "x", "type": "BusinessCredential"}]"#).unwrap();
    std::fs::write(&requirements, r#"{"requestedCredentials": ["kvkNumber"]}"#).unwrap();

    let err = evaluate_files(&wallet, &requirements).unwrap_err();
    assert!(format!("{err:#}").contains("invalid wallet"));
}
