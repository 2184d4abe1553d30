//! # Keygen Subcommand
//!
//! Generates the Ed25519 seed the API signs attestations with
//! (`SUBSI_SIGNING_SEED`), or re-derives the public key of an existing one.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use subsi_crypto::Ed25519KeyPair;

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Derive from this hex seed instead of generating a new one.
    #[arg(long)]
    pub seed: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMaterial {
    pub seed: String,
    pub public_key: String,
}

pub fn key_material(seed: Option<&str>) -> Result<KeyMaterial> {
    let key = match seed {
        Some(hex) => Ed25519KeyPair::from_seed_hex(hex)?,
        None => Ed25519KeyPair::generate(),
    };
    Ok(KeyMaterial {
        seed: key.seed_hex(),
        public_key: key.public_key().to_hex(),
    })
}

pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let material = key_material(args.seed.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&material)?);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_round_trips_to_the_same_public_key() {
        let fresh = key_material(None).unwrap();
        assert_eq!(fresh.seed.len(), 64);
        let again = key_material(Some(&fresh.seed)).unwrap();
        assert_eq!(again.public_key, fresh.public_key);
    }

    #[test]
    fn malformed_seed_is_an_error() {
        assert!(key_material(Some("not-hex")).is_err());
    }
}
