//! # Requirement Catalog
//!
//! Resolves a requested-credential identifier into the credential type that
//! can satisfy it and the subject fields that must be filled in.
//!
//! Three identifier families resolve out of the box:
//!
//! | Identifier | Resolves to |
//! |---|---|
//! | scheme attestation ids (`chamber_of_commerce_kvk_nummer`) | curated entry |
//! | subject field names (`kvkNumber`, `deMinimisRoom`) | the type carrying that field |
//! | credential type tags (`BusinessCredential`) | the type, no field constraint |
//!
//! Explicitly registered entries take precedence over the derived ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use subsi_core::RequirementId;

use crate::credential::CredentialType;

/// What a requested credential identifier demands of the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequirement {
    /// The credential type that can satisfy the requirement.
    pub credential_type: CredentialType,
    /// Subject fields that must be present and non-empty.
    pub fields: Vec<String>,
}

impl CredentialRequirement {
    pub fn new(credential_type: CredentialType, fields: &[&str]) -> Self {
        Self {
            credential_type,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Scheme attestation ids known from the DHI feasibility-study scheme.
const SCHEME_ENTRIES: &[(&str, CredentialType, &[&str])] = &[
    ("chamber_of_commerce_kvk_nummer", CredentialType::Business, &["kvkNumber"]),
    ("chamber_of_commerce_rechtsvorm", CredentialType::Business, &["legalForm"]),
    ("certificates_mbk_verklaring", CredentialType::MkbDeclaration, &["mkbDeclaration"]),
];

/// Lookup table from requirement identifiers to credential requirements.
#[derive(Debug, Clone, Default)]
pub struct RequirementCatalog {
    entries: BTreeMap<RequirementId, CredentialRequirement>,
}

impl RequirementCatalog {
    /// A catalog with no curated entries; only field names and type tags resolve.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The catalog with the built-in scheme entries.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for (id, credential_type, fields) in SCHEME_ENTRIES {
            if let Ok(id) = RequirementId::new(*id) {
                catalog.register(id, CredentialRequirement::new(*credential_type, fields));
            }
        }
        catalog
    }

    /// Add or replace a curated entry.
    pub fn register(&mut self, id: RequirementId, requirement: CredentialRequirement) {
        self.entries.insert(id, requirement);
    }

    /// Resolve an identifier, or `None` if nothing can satisfy it.
    pub fn resolve(&self, id: &RequirementId) -> Option<CredentialRequirement> {
        if let Some(entry) = self.entries.get(id) {
            return Some(entry.clone());
        }
        let key = id.as_str();
        if let Some(credential_type) = CredentialType::from_tag(key) {
            return Some(CredentialRequirement::new(credential_type, &[]));
        }
        CredentialType::ALL
            .into_iter()
            .find(|t| t.fields().contains(&key))
            .map(|t| CredentialRequirement::new(t, &[key]))
    }
}
