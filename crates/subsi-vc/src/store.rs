//! # Credential Store
//!
//! Holds the wallet credentials for one application session. Loading
//! replaces the held set atomically: every entry is validated first, and on
//! any failure the previously held set is kept untouched.

use std::collections::HashSet;

use serde_json::Value;

use crate::credential::{CredentialError, CredentialType, WalletCredential};

/// Read-only view over the credentials a wallet presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    credentials: Vec<WalletCredential>,
}

impl CredentialStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held set with already-typed credentials.
    ///
    /// # Errors
    ///
    /// [`CredentialError::InvalidCredential`] if any credential violates a
    /// credential-level constraint or two credentials share an id.
    pub fn load(&mut self, credentials: Vec<WalletCredential>) -> Result<(), CredentialError> {
        let mut seen = HashSet::new();
        for credential in &credentials {
            credential.validate()?;
            if !seen.insert(credential.id.as_str()) {
                return Err(CredentialError::InvalidCredential {
                    id: credential.id.to_string(),
                    reason: "duplicate credential id".to_string(),
                });
            }
        }
        tracing::debug!(count = credentials.len(), "credential store loaded");
        self.credentials = credentials;
        Ok(())
    }

    /// Replace the held set from untyped JSON records.
    ///
    /// Each record must carry a `credentialSubject` matching its `type`.
    pub fn load_json(&mut self, records: Vec<Value>) -> Result<(), CredentialError> {
        let parsed = records
            .into_iter()
            .map(WalletCredential::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        self.load(parsed)
    }

    /// First credential of the given type, in insertion order.
    pub fn find(&self, credential_type: CredentialType) -> Option<&WalletCredential> {
        self.credentials
            .iter()
            .find(|c| c.credential_type() == credential_type)
    }

    /// All held credentials, in insertion order.
    pub fn credentials(&self) -> &[WalletCredential] {
        &self.credentials
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{CredentialSubject, MkbDeclarationSubject};
    use serde_json::json;
    use subsi_core::{CredentialId, Timestamp};

    fn mkb(id: &str, declared: bool) -> WalletCredential {
        WalletCredential {
            id: CredentialId::new(id).unwrap(),
            issuer: "MKB Nederland".into(),
            issued_at: Timestamp::parse("2024-01-01T00:00:00Z").unwrap(),
            expires_at: None,
            subject: CredentialSubject::MkbDeclaration(MkbDeclarationSubject {
                mkb_declaration: declared,
            }),
        }
    }

    #[test]
    fn find_returns_first_match_in_insertion_order() {
        let mut store = CredentialStore::new();
        store.load(vec![mkb("a", true), mkb("b", false)]).unwrap();
        assert_eq!(store.find(CredentialType::MkbDeclaration).unwrap().id.as_str(), "a");
        assert!(store.find(CredentialType::Business).is_none());
    }

    #[test]
    fn failed_load_keeps_previous_set() {
        let mut store = CredentialStore::new();
        store.load(vec![mkb("a", true)]).unwrap();

        let mut bad = mkb("b", true);
        bad.issuer = "  ".into();
        assert!(store.load(vec![mkb("c", true), bad]).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.credentials()[0].id.as_str(), "a");

        assert!(store.load(vec![mkb("d", true), mkb("d", false)]).is_err());
        assert_eq!(store.credentials()[0].id.as_str(), "a");
    }

    #[test]
    fn load_json_rejects_shape_mismatch_and_keeps_previous() {
        let mut store = CredentialStore::new();
        store
            .load_json(vec![json!({
                "id": "deminimis_001", "type": "DeMinimisCredential", "issuer": "RVO",
                "issuedAt": "2024-01-01T00:00:00Z",
                "credentialSubject": {"deMinimisRoom": 150000}
            })])
            .unwrap();

        let err = store
            .load_json(vec![json!({
                "id": "auth_001", "type": "AuthenticationCredential", "issuer": "DigiD",
                "issuedAt": "2024-01-01T00:00:00Z",
                "credentialSubject": {"deMinimisRoom": 150000}
            })])
            .unwrap_err();
        assert!(matches!(err, CredentialError::InvalidCredential { ref id, .. } if id == "auth_001"));
        assert!(store.find(CredentialType::DeMinimis).is_some());
    }
}
