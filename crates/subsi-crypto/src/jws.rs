//! # Compact JWS (EdDSA)
//!
//! Produces `base64url(header).base64url(claims).base64url(signature)` where
//! the claims segment is the JCS-canonical encoding of [`JwsClaims`]. The
//! signature covers the ASCII signing input `header.claims` per RFC 7515.
//!
//! Verification re-parses the claims but does not trust them for anything
//! beyond what the caller checks: the `digest` claim must be compared with
//! the digest of the attestation subject the token is attached to.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use subsi_core::{CanonicalBytes, CryptoError};

use crate::ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// JOSE header. Only `EdDSA` is produced or accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    /// Algorithm, always `EdDSA`.
    pub alg: String,
    /// Token type, always `JWT`.
    pub typ: String,
    /// Key id (verification method) of the signer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl JwsHeader {
    fn eddsa(kid: Option<String>) -> Self {
        Self {
            alg: "EdDSA".to_string(),
            typ: "JWT".to_string(),
            kid,
        }
    }
}

/// Claims carried by an attestation proof token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsClaims {
    /// Issuer of the attestation.
    pub iss: String,
    /// Attestation id the token is bound to.
    pub sub: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Hex SHA-256 of the canonical attestation subject.
    pub digest: String,
}

/// Sign claims into a compact JWS.
pub fn sign_jws(
    key: &Ed25519KeyPair,
    kid: Option<String>,
    claims: &JwsClaims,
) -> Result<String, CryptoError> {
    let header = encode_segment(&JwsHeader::eddsa(kid))?;
    let payload = encode_segment(claims)?;
    let signing_input = format!("{header}.{payload}");
    let sig = key.sign_bytes(signing_input.as_bytes());
    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(sig.as_bytes())))
}

/// Verify a compact JWS and return its claims.
pub fn verify_jws(token: &str, public_key: &Ed25519PublicKey) -> Result<JwsClaims, CryptoError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CryptoError::Encoding("compact JWS must have three segments".into()));
    };

    let header: JwsHeader = decode_segment(header_b64)?;
    if header.alg != "EdDSA" {
        return Err(CryptoError::VerificationFailed(format!(
            "unsupported JWS algorithm: {}",
            header.alg
        )));
    }

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|e| CryptoError::Encoding(format!("signature segment: {e}")))?;
    let sig = Ed25519Signature::from_slice(&sig_bytes)?;
    let signing_input = format!("{header_b64}.{payload_b64}");
    public_key.verify_bytes(signing_input.as_bytes(), &sig)?;

    decode_segment(payload_b64)
}

fn encode_segment(value: &impl Serialize) -> Result<String, CryptoError> {
    let canonical =
        CanonicalBytes::new(value).map_err(|e| CryptoError::Encoding(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(canonical.as_bytes()))
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, CryptoError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| CryptoError::Encoding(format!("base64url: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| CryptoError::Encoding(format!("json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> JwsClaims {
        JwsClaims {
            iss: "did:web:subsigenie.example".into(),
            sub: "urn:sha256:abc".into(),
            iat: 1_760_000_000,
            digest: "abc".into(),
        }
    }

    #[test]
    fn sign_then_verify_returns_claims() {
        let kp = Ed25519KeyPair::from_seed(&[1u8; 32]);
        let token = sign_jws(&kp, Some("key-1".into()), &claims()).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(verify_jws(&token, &kp.public_key()).unwrap(), claims());
    }

    #[test]
    fn token_is_deterministic_for_same_key_and_claims() {
        let kp = Ed25519KeyPair::from_seed(&[2u8; 32]);
        assert_eq!(
            sign_jws(&kp, None, &claims()).unwrap(),
            sign_jws(&kp, None, &claims()).unwrap()
        );
    }

    #[test]
    fn tampered_payload_fails() {
        let kp = Ed25519KeyPair::generate();
        let token = sign_jws(&kp, None, &claims()).unwrap();
        let mut other = claims();
        other.digest = "def".into();
        let forged_payload = encode_segment(&other).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert!(verify_jws(&forged, &kp.public_key()).is_err());
    }

    #[test]
    fn wrong_key_and_malformed_tokens_fail() {
        let kp = Ed25519KeyPair::generate();
        let token = sign_jws(&kp, None, &claims()).unwrap();
        assert!(verify_jws(&token, &Ed25519KeyPair::generate().public_key()).is_err());
        assert!(verify_jws("a.b", &kp.public_key()).is_err());
        assert!(verify_jws("a.b.c.d", &kp.public_key()).is_err());
    }
}
