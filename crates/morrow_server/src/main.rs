//! HTTP entry point for the Morrow backend.
//!
//! # Responsibility
//! - Wire configuration, logging, storage and the router together.
//! - Drive the once-daily planning cycle alongside the request loop.

mod routes;
mod state;

use anyhow::Context;
use chrono::{Local, Utc};
use log::{error, info};
use morrow_core::db::open_db;
use morrow_core::service::planner_service::tomorrow_window;
use morrow_core::{init_logging, plan_all_users, AppConfig, TokenService};
use state::AppState;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    init_logging(&config.log_level, config.log_dir.as_deref()).map_err(anyhow::Error::msg)?;

    let conn = open_db(&config.db_path)
        .with_context(|| format!("opening database at {}", config.db_path.display()))?;
    let tokens = TokenService::new(config.token_secret.as_bytes(), config.token_ttl_hours);
    let state = Arc::new(AppState::new(conn, tokens));

    tokio::spawn(run_midnight_planner(state.clone()));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(
        "event=server_start module=server status=ok addr={} version={}",
        config.bind_addr,
        morrow_core::core_version()
    );
    axum::serve(listener, routes::router(state))
        .await
        .context("serving http")?;
    Ok(())
}

/// Sleeps until the next local midnight, then plans tomorrow for every user.
///
/// Planning runs on a blocking thread; the cycle never retries mid-day, a
/// failed run simply waits for the next midnight.
async fn run_midnight_planner(state: Arc<AppState>) {
    loop {
        let sleep_ms = match tomorrow_window(Local::now()) {
            Ok((start_ms, _)) => (start_ms - Utc::now().timestamp_millis()).max(1_000),
            Err(err) => {
                error!("event=scheduler_sleep module=server status=error error={err}");
                60 * 60 * 1000
            }
        };
        tokio::time::sleep(Duration::from_millis(sleep_ms as u64)).await;

        let planner_state = state.clone();
        let run = tokio::task::spawn_blocking(move || {
            let mut conn = planner_state.db();
            plan_all_users(&mut conn, Local::now())
        })
        .await;
        match run {
            // plan_all_users logs its own per-user and cycle summaries.
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                error!("event=scheduler_cycle module=server status=error error={err}");
            }
            Err(err) => {
                error!("event=scheduler_cycle module=server status=error error={err}");
            }
        }
    }
}
