// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Gridmill Contributors

//! gmd: the Gridmill daemon.

use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let state_dir = match gm_daemon::env::state_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("gmd: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = std::fs::create_dir_all(state_dir.join("logs")) {
        eprintln!("gmd: cannot create log directory: {e}");
        return ExitCode::FAILURE;
    }

    let appender = tracing_appender::rolling::daily(state_dir.join("logs"), "gmd.log");
    let (writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    tracing::info!(version = gm_daemon::env::PROTOCOL_VERSION, "gmd starting");
    match gm_daemon::run_local().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("daemon failed: {e}");
            eprintln!("gmd: {e}");
            ExitCode::FAILURE
        }
    }
}
