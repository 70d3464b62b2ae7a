#![warn(missing_docs)]

//! Entry point for the `focusd` binary.

mod cli;
mod error;

use std::{io, process};

use clap::Parser;
use focus_pipeline::{ObservationService, PipelineCfg, TabResolver, config::resolve_config};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, registry};

use crate::{
    cli::{Cli, Command},
    error::{Error, Result},
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!("{err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

/// Parse CLI arguments, install logging, and dispatch to the chosen command.
async fn run() -> Result<()> {
    let Cli {
        log,
        config,
        coalesce_ms,
        command,
    } = Cli::parse();

    // Logs go to stderr; stdout carries command output.
    let env_filter = logging::env_filter_from_spec(&log.spec());
    registry()
        .with(env_filter)
        .with(fmt::layer().without_time().with_writer(io::stderr))
        .try_init()
        .ok();

    let mut cfg = resolve_config(config.as_deref())?;
    if let Some(ms) = coalesce_ms {
        cfg.coalesce_ms = ms;
    }

    match command.unwrap_or(Command::Watch) {
        Command::Watch => watch(&cfg).await,
        Command::Resolve { app_id } => resolve(&cfg, &app_id).await,
        Command::Check { dump } => {
            if dump {
                println!("{}", cfg.to_ron()?);
            } else {
                println!("configuration OK");
            }
            Ok(())
        }
    }
}

/// Run the observation service until Ctrl-C, printing one JSON line per event.
async fn watch(cfg: &PipelineCfg) -> Result<()> {
    let service = ObservationService::from_cfg(cfg);
    let mut events = service.initialize_channel()?;
    if !service.start() {
        return Err(Error::StartFailed);
    }
    info!(coalesce_ms = cfg.coalesce_ms, "watching focus changes");

    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Some(ev) => println!("{}", serde_json::to_string(&ev)?),
                None => break,
            },
            r = signal::ctrl_c() => {
                r?;
                info!("interrupt received");
                break;
            }
        }
    }
    service.stop();
    Ok(())
}

/// Resolve the active tab URL of `app_id` once.
async fn resolve(cfg: &PipelineCfg, app_id: &str) -> Result<()> {
    let resolver = TabResolver::from_cfg(&cfg.resolver);
    match resolver.resolve_active_tab_url(app_id).await {
        Some(url) => {
            println!("{url}");
            Ok(())
        }
        None => Err(Error::Unresolved(app_id.to_string())),
    }
}
