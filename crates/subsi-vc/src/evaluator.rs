//! # Requirement Evaluator
//!
//! Partitions a scheme's requested credentials into those the wallet
//! satisfies and those still missing. Pure: the same requirements and store
//! always give the same partition, in the requested order.

use serde::{Deserialize, Serialize};
use subsi_core::RequirementId;

use crate::catalog::RequirementCatalog;
use crate::requirements::RvoRequirements;
use crate::store::CredentialStore;

/// Outcome of evaluating a wallet against requirements.
///
/// `satisfied` and `missing` are disjoint and together equal the requested
/// credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub satisfied: Vec<RequirementId>,
    pub missing: Vec<RequirementId>,
}

impl Evaluation {
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Evaluates requirements against a credential store via a catalog.
#[derive(Debug, Clone, Default)]
pub struct RequirementEvaluator {
    catalog: RequirementCatalog,
}

impl RequirementEvaluator {
    pub fn new(catalog: RequirementCatalog) -> Self {
        Self { catalog }
    }

    /// Evaluator over the built-in catalog.
    pub fn builtin() -> Self {
        Self::new(RequirementCatalog::builtin())
    }

    pub fn catalog(&self) -> &RequirementCatalog {
        &self.catalog
    }

    /// Partition `requirements.requested_credentials` into satisfied and missing.
    ///
    /// An identifier is satisfied iff the first credential of the resolved
    /// type has every required field present and non-empty. Identifiers the
    /// catalog cannot resolve are missing.
    pub fn evaluate(&self, requirements: &RvoRequirements, store: &CredentialStore) -> Evaluation {
        let mut evaluation = Evaluation::default();
        for id in requirements.requested_credentials() {
            if self.is_satisfied(id, store) {
                evaluation.satisfied.push(id.clone());
            } else {
                evaluation.missing.push(id.clone());
            }
        }
        tracing::debug!(
            satisfied = evaluation.satisfied.len(),
            missing = evaluation.missing.len(),
            "evaluated credential requirements"
        );
        evaluation
    }

    fn is_satisfied(&self, id: &RequirementId, store: &CredentialStore) -> bool {
        let Some(requirement) = self.catalog.resolve(id) else {
            tracing::debug!(requirement = %id, "requirement not in catalog");
            return false;
        };
        store.find(requirement.credential_type).is_some_and(|credential| {
            requirement
                .fields
                .iter()
                .all(|field| credential.subject.field_present(field))
        })
    }
}
