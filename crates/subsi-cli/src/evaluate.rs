//! # Evaluate Subcommand
//!
//! Evaluates a wallet against a scheme's requirements without any remote
//! service.
//!
//! ```bash
//! subsi evaluate --wallet wallet.json --requirements dhi.yaml
//! ```
//!
//! The wallet file is a credential array, `{"credentials": [...]}`, or a
//! wallet export with a `content` array. The requirements file is either
//! `{requestedCredentials, additionalInformation}` or a scheme analysis
//! with `attestations`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use subsi_core::Timestamp;
use subsi_vc::{
    import_wallet_export, CredentialStore, Evaluation, RequirementEvaluator, RvoRequirements, SchemeAnalysis,
    WalletCredential,
};

use crate::input::read_document;

/// Exit code when requested credentials are missing.
pub const EXIT_MISSING: u8 = 2;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Wallet file (JSON or YAML).
    #[arg(long)]
    pub wallet: PathBuf,

    /// Requirements or scheme analysis file (JSON or YAML).
    #[arg(long)]
    pub requirements: PathBuf,
}

pub fn run_evaluate(args: &EvaluateArgs) -> Result<u8> {
    let evaluation = evaluate_files(&args.wallet, &args.requirements)?;
    println!("{}", serde_json::to_string_pretty(&evaluation)?);
    if evaluation.is_satisfied() {
        Ok(0)
    } else {
        tracing::info!(missing = evaluation.missing.len(), "requested credentials missing");
        Ok(EXIT_MISSING)
    }
}

pub fn evaluate_files(wallet: &Path, requirements: &Path) -> Result<Evaluation> {
    let credentials = load_wallet(&read_document(wallet)?)
        .with_context(|| format!("invalid wallet {}", wallet.display()))?;
    let requirements = load_requirements(read_document(requirements)?)
        .with_context(|| format!("invalid requirements {}", requirements.display()))?;

    let mut store = CredentialStore::new();
    store.load(credentials)?;
    Ok(RequirementEvaluator::builtin().evaluate(&requirements, &store))
}

fn load_wallet(document: &Value) -> Result<Vec<WalletCredential>> {
    if document.get("content").is_some() {
        return Ok(import_wallet_export(document, Timestamp::now())?);
    }
    let records = match document {
        Value::Array(records) => records.clone(),
        other => other
            .get("credentials")
            .and_then(Value::as_array)
            .cloned()
            .context("expected a credential array, a `credentials` array or a wallet export")?,
    };
    let credentials = records
        .into_iter()
        .map(WalletCredential::from_json)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(credentials)
}

fn load_requirements(document: Value) -> Result<RvoRequirements> {
    if document.get("attestations").is_some() {
        let analysis: SchemeAnalysis = serde_json::from_value(document)?;
        return Ok(analysis.to_requirements(&[])?);
    }
    Ok(serde_json::from_value(document)?)
}
