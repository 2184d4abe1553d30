//! # Serve Subcommand
//!
//! Runs the application API. Settings come from `SUBSI_*` environment
//! variables; `--bind` overrides `SUBSI_BIND` and `--mock` replaces the
//! remote services with the in-process demo wallet, DHI analysis and an
//! accepting gateway.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Args;
use subsi_api::{ApiConfig, AppState};
use subsi_client::{ClientConfig, RemoteServices};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Use in-process mock services instead of HTTP.
    #[arg(long)]
    pub mock: bool,
}

pub fn run_serve(args: &ServeArgs) -> Result<u8> {
    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    let services = if args.mock {
        tracing::warn!("serving with mock remote services");
        RemoteServices::mock()?
    } else {
        RemoteServices::http(&ClientConfig::from_env()?)?
    };
    let bind = config.bind;
    let state = AppState::new(config, services)?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start the async runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .with_context(|| format!("failed to bind {bind}"))?;
        subsi_api::serve(listener, state).await.context("server error")
    })?;
    Ok(0)
}
