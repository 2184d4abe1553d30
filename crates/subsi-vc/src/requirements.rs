//! # Scheme Requirements
//!
//! [`RvoRequirements`] is what a subsidy scheme asks of an applicant: the
//! credentials to present and the free-form fields to fill in. Both lists
//! are ordered sets; duplicates are dropped on construction and on
//! deserialization, keeping the first occurrence.
//!
//! [`SchemeAnalysis`] is the raw output of analysing a scheme's web pages;
//! it converts into requirements. Only fields from the scheme's field set
//! can be requested from the applicant.

use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use subsi_core::{FieldId, RequirementId, Timestamp};

/// Wallet attributes the DHI scheme requests by default.
pub const DHI_REQUESTED_CREDENTIALS: &[&str] = &[
    "authentication",
    "kvkNumber",
    "statutoryName",
    "rsin",
    "establishmentNumber",
    "tradeName",
    "businessAddress",
    "email",
    "sbiCode",
    "legalForm",
    "employeeCount",
    "iban",
    "contactPerson",
    "mkbDeclaration",
    "previousExporterApplications",
    "deMinimisRoom",
];

/// Additional application fields of the DHI feasibility-study scheme.
pub const DHI_ADDITIONAL_FIELDS: &[&str] = &[
    "projectLocationDHI",
    "applicantRole",
    "applicationTypeOrConsortium",
    "demonstration",
    "feasibility",
    "investmentPreparation",
    "projectDetails",
    "targetSector",
    "greeningCheck",
    "startDate",
    "endDate",
    "financialTurnoverMin100kLast3Years",
    "exportMultiplierStatement",
    "onHostLocation",
    "exportedBefore",
    "performedQuickScan",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequirementsError {
    /// A requested field is not part of the scheme's field set.
    #[error("field {field} is not an additional field of {scheme}")]
    UndeclaredField { field: FieldId, scheme: String },
}

/// Credentials and fields a scheme requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RequirementsWire")]
pub struct RvoRequirements {
    requested_credentials: Vec<RequirementId>,
    additional_information: Vec<FieldId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequirementsWire {
    #[serde(default)]
    requested_credentials: Vec<RequirementId>,
    #[serde(default)]
    additional_information: Vec<FieldId>,
}

impl From<RequirementsWire> for RvoRequirements {
    fn from(w: RequirementsWire) -> Self {
        Self::new(w.requested_credentials, w.additional_information)
    }
}

impl RvoRequirements {
    /// Build requirements, dropping duplicate identifiers.
    pub fn new(
        requested_credentials: impl IntoIterator<Item = RequirementId>,
        additional_information: impl IntoIterator<Item = FieldId>,
    ) -> Self {
        Self {
            requested_credentials: dedup(requested_credentials),
            additional_information: dedup(additional_information),
        }
    }

    /// The DHI scheme's default wallet requirements plus, optionally, its
    /// additional fields.
    pub fn dhi(with_additional_fields: bool) -> Self {
        let fields: &[&str] = if with_additional_fields {
            DHI_ADDITIONAL_FIELDS
        } else {
            &[]
        };
        Self::new(ids(DHI_REQUESTED_CREDENTIALS), ids(fields))
    }

    pub fn requested_credentials(&self) -> &[RequirementId] {
        &self.requested_credentials
    }

    pub fn additional_information(&self) -> &[FieldId] {
        &self.additional_information
    }

    /// Whether `field` is one of the declared additional fields.
    pub fn declares_field(&self, field: &FieldId) -> bool {
        self.additional_information.contains(field)
    }
}

/// Result of analysing a subsidy scheme's pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeAnalysis {
    pub url: String,
    pub title: String,
    #[serde(default, alias = "analyzed_at", skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<Timestamp>,
    /// Wallet attestations the scheme asks for.
    #[serde(default)]
    pub attestations: Vec<RequirementId>,
    /// Requirements that cannot be proven from a wallet.
    #[serde(default, alias = "non_attestations")]
    pub non_attestations: Vec<String>,
    /// Free-form analyser output, passed through untouched.
    #[serde(default, alias = "analysis_notes")]
    pub analysis_notes: Value,
    /// Additional fields the scheme may ask for. Empty when the analyser
    /// reports none, in which case the DHI field set applies.
    #[serde(default, alias = "additional_fields", skip_serializing_if = "Vec::is_empty")]
    pub additional_fields: Vec<FieldId>,
}

impl SchemeAnalysis {
    /// Fields the applicant can be asked for under this scheme.
    pub fn field_set(&self) -> Vec<FieldId> {
        if self.additional_fields.is_empty() {
            dhi_additional_fields()
        } else {
            dedup(self.additional_fields.iter().cloned())
        }
    }

    /// Requirements from this analysis, with the given additional fields.
    /// Every field must belong to [`field_set`](Self::field_set).
    pub fn to_requirements(&self, additional_information: &[FieldId]) -> Result<RvoRequirements, RequirementsError> {
        let field_set = self.field_set();
        if let Some(field) = additional_information.iter().find(|f| !field_set.contains(f)) {
            return Err(RequirementsError::UndeclaredField {
                field: field.clone(),
                scheme: self.url.clone(),
            });
        }
        Ok(RvoRequirements::new(
            self.attestations.iter().cloned(),
            additional_information.iter().cloned(),
        ))
    }
}

fn dedup<T: Eq + Hash + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

fn ids<T: TryFrom<String>>(raw: &[&str]) -> Vec<T> {
    raw.iter()
        .filter_map(|s| T::try_from(s.to_string()).ok())
        .collect()
}

/// The DHI additional fields as typed identifiers.
pub fn dhi_additional_fields() -> Vec<FieldId> {
    ids(DHI_ADDITIONAL_FIELDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicates_are_dropped_keeping_first_occurrence() {
        let r: RvoRequirements = serde_json::from_value(json!({
            "requestedCredentials": ["kvkNumber", "iban", "kvkNumber"],
            "additionalInformation": ["startDate", "startDate"]
        }))
        .unwrap();
        let creds: Vec<&str> = r.requested_credentials().iter().map(|i| i.as_str()).collect();
        assert_eq!(creds, ["kvkNumber", "iban"]);
        assert_eq!(r.additional_information().len(), 1);
    }

    #[test]
    fn dhi_defaults() {
        assert_eq!(RvoRequirements::dhi(false).requested_credentials().len(), 16);
        assert!(RvoRequirements::dhi(false).additional_information().is_empty());
        let full = RvoRequirements::dhi(true);
        assert_eq!(full.additional_information().len(), 16);
        assert!(full.declares_field(&FieldId::new("greeningCheck").unwrap()));
    }

    #[test]
    fn analysis_converts_to_requirements() {
        let analysis: SchemeAnalysis = serde_json::from_value(json!({
            "url": "https://www.rvo.nl/subsidies-financiering/dhi-haalbaarheidsstudies",
            "title": "DHI-subsidieregeling: Haalbaarheidsstudies",
            "attestations": ["chamber_of_commerce_kvk_nummer", "certificates_mbk_verklaring"],
            "nonAttestations": ["Projectplan"],
            "analysisNotes": "generated"
        }))
        .unwrap();
        let r = analysis.to_requirements(&dhi_additional_fields()).unwrap();
        assert_eq!(r.requested_credentials()[0].as_str(), "chamber_of_commerce_kvk_nummer");
        assert_eq!(r.additional_information().len(), DHI_ADDITIONAL_FIELDS.len());
    }

    fn analysis(fields: serde_json::Value) -> SchemeAnalysis {
        serde_json::from_value(json!({
            "url": "https://www.rvo.nl/subsidies-financiering/dhi-haalbaarheidsstudies",
            "title": "DHI",
            "attestations": ["kvkNumber"],
            "additionalFields": fields
        }))
        .unwrap()
    }

    #[test]
    fn fields_outside_the_scheme_are_refused() {
        let err = analysis(json!([]))
            .to_requirements(&[FieldId::new("favouriteColour").unwrap()])
            .unwrap_err();
        assert!(matches!(
            err,
            RequirementsError::UndeclaredField { ref field, .. } if field.as_str() == "favouriteColour"
        ));
    }

    #[test]
    fn declared_field_set_replaces_dhi_default() {
        let a = analysis(json!(["projectSummary", "projectSummary"]));
        assert_eq!(a.field_set().len(), 1);
        assert!(a.to_requirements(&[FieldId::new("projectSummary").unwrap()]).is_ok());
        assert!(a.to_requirements(&[FieldId::new("greeningCheck").unwrap()]).is_err());
    }
}
