//! # subsi CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use subsi_cli::evaluate::{run_evaluate, EvaluateArgs};
use subsi_cli::keygen::{run_keygen, KeygenArgs};
use subsi_cli::serve::{run_serve, ServeArgs};
use subsi_cli::stages::{run_stages, StagesArgs};

/// SubsiGenie — subsidy applications from wallet credentials.
#[derive(Parser, Debug)]
#[command(name = "subsi", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a wallet file against a requirements file.
    Evaluate(EvaluateArgs),

    /// Generate an Ed25519 signing seed.
    Keygen(KeygenArgs),

    /// Run the application API server.
    Serve(ServeArgs),

    /// Print the stage transition table.
    Stages(StagesArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match &cli.command {
        Commands::Evaluate(args) => run_evaluate(args),
        Commands::Keygen(args) => run_keygen(args),
        Commands::Serve(args) => run_serve(args),
        Commands::Stages(args) => run_stages(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_evaluate() {
        let cli = Cli::try_parse_from(["subsi", "-vv", "evaluate", "--wallet", "w.json", "--requirements", "r.yaml"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Evaluate(args) = cli.command else {
            panic!("expected evaluate");
        };
        assert_eq!(args.wallet.to_str(), Some("w.json"));
    }

    #[test]
    fn cli_parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["subsi", "serve", "--bind", "0.0.0.0:9000", "--mock"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert!(args.mock);
        assert_eq!(args.bind.map(|b| b.port()), Some(9000));
    }

    #[test]
    fn cli_rejects_bad_bind() {
        assert!(Cli::try_parse_from(["subsi", "serve", "--bind", "nowhere"]).is_err());
    }
}
