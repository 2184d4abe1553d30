//! # Wallet Export Import
//!
//! Maps a business-wallet export into typed credentials. The export is a
//! display-oriented envelope:
//!
//! ```json
//! {"content": [{"displayProperties": {"credentialTypeDisplay": {"displayName": "KVK Registratie"}},
//!               "issuer": "...", "issuanceDate": "...",
//!               "credentialSubject": {"identifier": {"EUID": "NLNHR.4403655"}, "legalFormType": "..."}}]}
//! ```
//!
//! Only the entries recognised by display name are imported; everything
//! else is skipped.

use serde_json::Value;
use subsi_core::{CredentialId, Timestamp};

use crate::credential::{
    BusinessSubject, CredentialError, CredentialSubject, MkbDeclarationSubject, WalletCredential,
};

/// Display name of the Chamber of Commerce registration credential.
pub const KVK_DISPLAY_NAME: &str = "KVK Registratie";
/// Display name of the SME declaration credential.
pub const MKB_DISPLAY_NAME: &str = "MKB Verklaring";

/// Import the recognised entries of a wallet export.
///
/// `fallback_issued_at` is used for entries without an issuance date.
///
/// # Errors
///
/// [`CredentialError::InvalidCredential`] if the export has no `content`
/// array, or a recognised entry cannot be mapped.
pub fn import_wallet_export(
    export: &Value,
    fallback_issued_at: Timestamp,
) -> Result<Vec<WalletCredential>, CredentialError> {
    let entries = export
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| CredentialError::InvalidCredential {
            id: String::new(),
            reason: "wallet export has no content array".to_string(),
        })?;

    let mut imported = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let display_name = entry
            .pointer("/displayProperties/credentialTypeDisplay/displayName")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let subject = entry.get("credentialSubject").cloned().unwrap_or(Value::Null);

        let mapped = match display_name {
            KVK_DISPLAY_NAME => CredentialSubject::Business(business_subject(&subject)),
            MKB_DISPLAY_NAME => CredentialSubject::MkbDeclaration(MkbDeclarationSubject {
                mkb_declaration: true,
            }),
            other => {
                tracing::debug!(index, display_name = other, "skipping unrecognised wallet entry");
                continue;
            }
        };

        let raw_id = entry
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("wallet-import-{index}"));
        let id = CredentialId::new(raw_id.clone()).map_err(|e| invalid(&raw_id, e.to_string()))?;
        let issued_at = match first_str(entry, &["issuanceDate", "validFrom", "issuedAt"]) {
            Some(s) => Timestamp::parse_lenient(s).map_err(|e| invalid(&raw_id, e.to_string()))?,
            None => fallback_issued_at,
        };
        let expires_at = first_str(entry, &["expirationDate", "validUntil", "expiresAt"])
            .map(Timestamp::parse_lenient)
            .transpose()
            .map_err(|e| invalid(&raw_id, e.to_string()))?;

        let credential = WalletCredential {
            id,
            issuer: issuer_name(entry).unwrap_or_else(|| display_name.to_string()),
            issued_at,
            expires_at,
            subject: mapped,
        };
        credential.validate()?;
        imported.push(credential);
    }
    Ok(imported)
}

fn business_subject(subject: &Value) -> BusinessSubject {
    let text = |pointer: &str| {
        subject
            .pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    BusinessSubject {
        kvk_number: text("/identifier/EUID"),
        legal_form: text("/legalFormType"),
        statutory_name: text("/name"),
        trade_name: text("/tradeName"),
        rsin: text("/identifier/RSIN"),
        ..Default::default()
    }
}

fn issuer_name(entry: &Value) -> Option<String> {
    match entry.get("issuer")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(o) => o
            .get("name")
            .or_else(|| o.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn first_str<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| entry.get(*k).and_then(Value::as_str))
}

fn invalid(id: &str, reason: String) -> CredentialError {
    CredentialError::InvalidCredential {
        id: id.to_string(),
        reason,
    }
}
