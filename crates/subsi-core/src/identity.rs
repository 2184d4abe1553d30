//! # Identifier Newtypes
//!
//! Newtype wrappers for the identifiers that cross component boundaries.
//! A `RequirementId` (what a subsidy scheme asks for) cannot be passed
//! where a `FieldId` (a free-form application field) is expected, even
//! though both are strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SubsiError;

/// Unique identifier for one subsidy application (and its draft).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    /// Generate a new random application identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from the hyphenated UUID form.
    pub fn parse(s: &str) -> Result<Self, SubsiError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| SubsiError::Validation(format!("invalid application id {s:?}: {e}")))
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a ", $what, ", rejecting empty or whitespace-only input.")]
            pub fn new(value: impl Into<String>) -> Result<Self, SubsiError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(SubsiError::Validation(concat!($what, " must not be empty").to_string()));
                }
                Ok(Self(value))
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = SubsiError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = SubsiError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a wallet credential as issued (e.g. `business_001`).
    CredentialId,
    "credential id"
);

string_id!(
    /// Identifier of a requested credential in a scheme's requirement set
    /// (e.g. `chamber_of_commerce_kvk_nummer`, `kvkNumber`).
    RequirementId,
    "requirement id"
);

string_id!(
    /// Identifier of a free-form application field (e.g. `projectLocationDHI`).
    FieldId,
    "field id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_ids_are_unique() {
        assert_ne!(ApplicationId::new(), ApplicationId::new());
    }

    #[test]
    fn application_id_parse_roundtrip() {
        let id = ApplicationId::new();
        assert_eq!(ApplicationId::parse(&id.to_string()).unwrap(), id);
        assert!(ApplicationId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn string_ids_reject_blank() {
        assert!(FieldId::new("").is_err());
        assert!(RequirementId::new("   ").is_err());
        assert_eq!(CredentialId::new("auth_001").unwrap().as_str(), "auth_001");
    }

    #[test]
    fn string_ids_serialize_as_plain_strings() {
        let id = RequirementId::new("chamber_of_commerce_kvk_nummer").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"chamber_of_commerce_kvk_nummer\"");
        let back: RequirementId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<FieldId>("\"\"").is_err());
    }
}
