//! # Wallet Credentials
//!
//! A wallet credential is a closed sum type keyed by its `type` tag. Each
//! variant carries its own subject shape, so every consumer that inspects a
//! subject (the requirement evaluator in particular) must handle all five
//! kinds; adding a kind is a compile error until every `match` is updated.
//!
//! ## Wire format
//!
//! ```json
//! {"id": "business_001", "type": "BusinessCredential", "issuer": "KVK",
//!  "issuedAt": "2024-01-01T00:00:00Z", "credentialSubject": {"kvkNumber": "..."}}
//! ```
//!
//! Deserialization goes through [`RawCredential`] so that a subject whose
//! shape does not match its tag surfaces as
//! [`CredentialError::InvalidCredential`] with the credential id attached,
//! not as a bare serde error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use subsi_core::{CredentialId, Timestamp};

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised while admitting credentials.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The credential is malformed: unknown tag, subject shape does not
    /// match the tag, or a credential-level constraint is violated.
    #[error("invalid credential {id}: {reason}")]
    InvalidCredential {
        /// Credential id as received (may be empty if that was the problem).
        id: String,
        /// What was wrong.
        reason: String,
    },
}

impl CredentialError {
    fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCredential {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

// ─── Credential Type ─────────────────────────────────────────────────

/// The closed set of credential kinds a wallet can present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CredentialType {
    /// Proof that the applicant authenticated with a government login.
    #[serde(rename = "AuthenticationCredential")]
    Authentication,
    /// Chamber of Commerce (KVK) business registration.
    #[serde(rename = "BusinessCredential")]
    Business,
    /// SME (MKB) self-declaration.
    #[serde(rename = "MkbDeclarationCredential")]
    MkbDeclaration,
    /// Earlier export-subsidy applications.
    #[serde(rename = "PreviousExporterCredential")]
    PreviousExporter,
    /// Remaining de-minimis state-aid room, in euros.
    #[serde(rename = "DeMinimisCredential")]
    DeMinimis,
}

impl CredentialType {
    /// All credential types, in declaration order.
    pub const ALL: [CredentialType; 5] = [
        Self::Authentication,
        Self::Business,
        Self::MkbDeclaration,
        Self::PreviousExporter,
        Self::DeMinimis,
    ];

    /// The wire tag, e.g. `BusinessCredential`.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Authentication => "AuthenticationCredential",
            Self::Business => "BusinessCredential",
            Self::MkbDeclaration => "MkbDeclarationCredential",
            Self::PreviousExporter => "PreviousExporterCredential",
            Self::DeMinimis => "DeMinimisCredential",
        }
    }

    /// Resolve a wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Subject field names carried by this type, in wire order.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Self::Authentication => &["authentication"],
            Self::Business => BusinessSubject::FIELDS,
            Self::MkbDeclaration => &["mkbDeclaration"],
            Self::PreviousExporter => &["previousExporterApplications"],
            Self::DeMinimis => &["deMinimisRoom"],
        }
    }
}

impl std::fmt::Display for CredentialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

// ─── Subjects ────────────────────────────────────────────────────────

/// Subject of an [`CredentialType::Authentication`] credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSubject {
    /// Authentication outcome as asserted by the issuer (e.g. `verified`).
    pub authentication: String,
}

/// Postal address of the registered business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

/// Contact person registered for the business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPerson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// Subject of a [`CredentialType::Business`] credential.
///
/// Registries do not always disclose every attribute, so each field may be
/// absent. Absent and blank values are kept distinguishable from wrongly
/// typed ones: `"kvkNumber": 12` is a shape error, `"kvkNumber": ""` is a
/// present-but-empty field that fails requirement evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessSubject {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kvk_number: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub statutory_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rsin: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub establishment_number: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trade_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_address: Option<BusinessAddress>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sbi_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub legal_form: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub iban: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_person: Option<ContactPerson>,
}

impl BusinessSubject {
    /// Wire names of every business attribute.
    pub const FIELDS: &'static [&'static str] = &[
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
    ];

    fn field_present(&self, field: &str) -> bool {
        match field {
            "kvkNumber" => filled(&self.kvk_number),
            "statutoryName" => filled(&self.statutory_name),
            "rsin" => filled(&self.rsin),
            "establishmentNumber" => filled(&self.establishment_number),
            "tradeName" => filled(&self.trade_name),
            "businessAddress" => self.business_address.as_ref().is_some_and(|a| {
                filled(&a.street) && filled(&a.city) && filled(&a.postal_code) && filled(&a.country)
            }),
            "email" => filled(&self.email),
            "sbiCode" => filled(&self.sbi_code),
            "legalForm" => filled(&self.legal_form),
            "employeeCount" => self.employee_count.is_some(),
            "iban" => filled(&self.iban),
            "contactPerson" => self
                .contact_person
                .as_ref()
                .is_some_and(|c| filled(&c.name) && (filled(&c.email) || filled(&c.phone))),
            _ => false,
        }
    }
}

/// Subject of an [`CredentialType::MkbDeclaration`] credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MkbDeclarationSubject {
    pub mkb_declaration: bool,
}

/// Subject of a [`CredentialType::PreviousExporter`] credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousExporterSubject {
    pub previous_exporter_applications: Vec<String>,
}

/// Subject of a [`CredentialType::DeMinimis`] credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeMinimisSubject {
    pub de_minimis_room: u64,
}

/// A credential subject, one variant per [`CredentialType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSubject {
    Authentication(AuthenticationSubject),
    Business(BusinessSubject),
    MkbDeclaration(MkbDeclarationSubject),
    PreviousExporter(PreviousExporterSubject),
    DeMinimis(DeMinimisSubject),
}

impl CredentialSubject {
    /// The credential type this subject belongs to.
    pub fn credential_type(&self) -> CredentialType {
        match self {
            Self::Authentication(_) => CredentialType::Authentication,
            Self::Business(_) => CredentialType::Business,
            Self::MkbDeclaration(_) => CredentialType::MkbDeclaration,
            Self::PreviousExporter(_) => CredentialType::PreviousExporter,
            Self::DeMinimis(_) => CredentialType::DeMinimis,
        }
    }

    /// Whether `field` is present and non-empty in this subject.
    ///
    /// Fields that do not belong to the subject's type are never present.
    pub fn field_present(&self, field: &str) -> bool {
        match self {
            Self::Authentication(s) => field == "authentication" && filled(&s.authentication),
            Self::Business(s) => s.field_present(field),
            Self::MkbDeclaration(_) => field == "mkbDeclaration",
            Self::PreviousExporter(s) => {
                field == "previousExporterApplications"
                    && s.previous_exporter_applications.iter().any(|a| filled(a))
            }
            Self::DeMinimis(_) => field == "deMinimisRoom",
        }
    }

    /// Parse a subject for the given type, rejecting shape mismatches.
    pub fn parse(credential_type: CredentialType, value: Value) -> Result<Self, String> {
        if !value.is_object() {
            return Err("credentialSubject must be a JSON object".to_string());
        }
        let subject = match credential_type {
            CredentialType::Authentication => Self::Authentication(from_value(value)?),
            CredentialType::Business => {
                let has_known_field = value
                    .as_object()
                    .is_some_and(|m| BusinessSubject::FIELDS.iter().any(|f| m.contains_key(*f)));
                if !has_known_field {
                    return Err("BusinessCredential subject carries no business attributes".to_string());
                }
                Self::Business(from_value(value)?)
            }
            CredentialType::MkbDeclaration => Self::MkbDeclaration(from_value(value)?),
            CredentialType::PreviousExporter => Self::PreviousExporter(from_value(value)?),
            CredentialType::DeMinimis => Self::DeMinimis(from_value(value)?),
        };
        Ok(subject)
    }

    /// Render as the JSON `credentialSubject` object.
    pub fn to_value(&self) -> Value {
        let rendered = match self {
            Self::Authentication(s) => serde_json::to_value(s),
            Self::Business(s) => serde_json::to_value(s),
            Self::MkbDeclaration(s) => serde_json::to_value(s),
            Self::PreviousExporter(s) => serde_json::to_value(s),
            Self::DeMinimis(s) => serde_json::to_value(s),
        };
        // Plain structs with string keys always serialize.
        rendered.unwrap_or(Value::Null)
    }
}

fn from_value<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn filled(s: &str) -> bool {
    !s.trim().is_empty()
}

// ─── Wallet Credential ───────────────────────────────────────────────

/// A verifiable credential as held by the applicant's wallet.
///
/// Immutable once constructed; the Credential Store only ever hands out
/// shared references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCredential", into = "RawCredential")]
pub struct WalletCredential {
    /// Issuer-assigned credential id.
    pub id: CredentialId,
    /// Issuer name or DID.
    pub issuer: String,
    /// Issuance time.
    pub issued_at: Timestamp,
    /// Optional expiry.
    pub expires_at: Option<Timestamp>,
    /// Typed subject; determines the credential type.
    pub subject: CredentialSubject,
}

impl WalletCredential {
    /// The credential type, derived from the subject variant.
    pub fn credential_type(&self) -> CredentialType {
        self.subject.credential_type()
    }

    /// Check credential-level constraints that the type system cannot.
    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.issuer.trim().is_empty() {
            return Err(CredentialError::invalid(self.id.as_str(), "issuer must not be empty"));
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= self.issued_at {
                return Err(CredentialError::invalid(
                    self.id.as_str(),
                    format!("expiresAt {expires_at} is not after issuedAt {}", self.issued_at),
                ));
            }
        }
        Ok(())
    }

    /// Whether the credential has expired at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|e| e <= now)
    }

    /// Parse a credential from an untyped JSON record.
    pub fn from_json(value: Value) -> Result<Self, CredentialError> {
        let id_hint = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let raw: RawCredential =
            serde_json::from_value(value).map_err(|e| CredentialError::invalid(id_hint, e.to_string()))?;
        Self::try_from(raw)
    }
}

/// The loosely-typed wire record a credential is parsed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCredential {
    pub id: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub issuer: String,
    pub issued_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub credential_subject: Value,
}

impl TryFrom<RawCredential> for WalletCredential {
    type Error = CredentialError;

    fn try_from(raw: RawCredential) -> Result<Self, Self::Error> {
        let id = CredentialId::new(raw.id.clone())
            .map_err(|e| CredentialError::invalid(&raw.id, e.to_string()))?;
        let credential_type = CredentialType::from_tag(&raw.credential_type).ok_or_else(|| {
            CredentialError::invalid(&raw.id, format!("unknown credential type {:?}", raw.credential_type))
        })?;
        let issued_at = Timestamp::parse_lenient(&raw.issued_at)
            .map_err(|e| CredentialError::invalid(&raw.id, e.to_string()))?;
        let expires_at = raw
            .expires_at
            .as_deref()
            .map(Timestamp::parse_lenient)
            .transpose()
            .map_err(|e| CredentialError::invalid(&raw.id, e.to_string()))?;
        let subject = CredentialSubject::parse(credential_type, raw.credential_subject)
            .map_err(|reason| CredentialError::invalid(&raw.id, reason))?;

        let credential = Self {
            id,
            issuer: raw.issuer,
            issued_at,
            expires_at,
            subject,
        };
        credential.validate()?;
        Ok(credential)
    }
}

impl From<WalletCredential> for RawCredential {
    fn from(c: WalletCredential) -> Self {
        Self {
            id: c.id.to_string(),
            credential_type: c.credential_type().tag().to_string(),
            issuer: c.issuer,
            issued_at: c.issued_at.to_iso8601(),
            expires_at: c.expires_at.map(|t| t.to_iso8601()),
            credential_subject: c.subject.to_value(),
        }
    }
}
