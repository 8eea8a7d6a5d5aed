// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! `zonesd`: the zones daemon binary. A thin wrapper around
//! [`zn_daemon::runner`] — argument parsing and logging setup only.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use zn_daemon::runner::{self, RunnerOptions};

/// Zones daemon: manages container-backed zones over a host bus, a
/// per-zone bus, and a local IPC socket.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the manager config JSON document.
    #[arg(long, default_value = "/etc/zonesd/manager.json")]
    config: PathBuf,

    /// Skip stopping zones on shutdown, leaving them running.
    #[arg(long)]
    detach_on_exit: bool,

    /// Log filter passed to `tracing_subscriber::EnvFilter`, overriding
    /// `RUST_LOG` if set.
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = match &args.log_filter {
        Some(f) => EnvFilter::try_new(f)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let exit_code = runner::run(RunnerOptions { config_path: args.config, detach_on_exit: args.detach_on_exit }).await;
    std::process::exit(exit_code);
}
