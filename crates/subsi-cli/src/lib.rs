//! # subsi-cli — SubsiGenie Command-Line Interface
//!
//! ## Subcommands
//!
//! - `evaluate` — Check a wallet file against a requirements file, offline
//! - `keygen` — Generate an Ed25519 seed for the attestation signer
//! - `serve` — Run the application API
//! - `stages` — Print the stage transition table
//!
//! Argument parsing lives in `main.rs`; each module exposes its `Args`
//! struct and a `run_*` handler returning the process exit code.

pub mod evaluate;
pub mod input;
pub mod keygen;
pub mod serve;
pub mod stages;
