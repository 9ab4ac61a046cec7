use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

mod api;
mod config;
mod dashboard;
mod db;
mod filters;
mod fixtures;
mod stats;
#[cfg(test)]
mod testing;

use api::{ApiFootballClient, FootballApi};
use config::Config;
use dashboard::AppState;
use db::Database;
use filters::{FilterEngine, FilterKind, FilterRunner, RankPairTable};
use fixtures::{start_fixture_monitor, MatchBook};
use stats::StatsCache;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let api: Arc<dyn FootballApi> = Arc::new(ApiFootballClient::new(
        &config.api_url,
        &config.api_key,
        config.request_timeout(),
        config.max_retries,
        config.retry_delay(),
    )?);

    let table = RankPairTable::load(config.rank_table.as_deref())?;
    if table.is_empty() {
        warn!("Rank pair table has no groups, no rank pairs will be excluded");
    } else {
        info!("Rank pair table loaded: {} groups", table.len());
    }

    let stats = StatsCache::new(
        api.clone(),
        config.cache_capacity,
        config.cache_ttl(),
        config.form_window,
    );
    let engine = FilterEngine::new(
        api.clone(),
        stats,
        db.clone(),
        Arc::new(table),
        config.filter_workers,
    );

    let saved = db.load_filter_state()?;
    info!(
        "Live filter: {}, calendar filter: {} ({})",
        saved.live_filter,
        saved.calendar_filter,
        if saved.calendar_filter_active { "on" } else { "off" }
    );
    let (runner, mut reports) =
        FilterRunner::new(engine.clone(), config.filter_workers, saved.live_filter);

    let state = AppState {
        db: db.clone(),
        api: api.clone(),
        engine,
        runner,
        book: Arc::new(RwLock::new(MatchBook::new())),
        report: Arc::new(RwLock::new(None)),
        leagues: Arc::new(RwLock::new(Vec::new())),
        last_poll: Arc::new(RwLock::new(None)),
        request_quota: config.request_quota,
        started_at: Utc::now(),
    };

    let app = dashboard::router(state.clone());
    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("JSON API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let mut polls = start_fixture_monitor(api, config.poll_interval());
    let filter_interval = config.filter_interval();

    // Main event loop: apply polls, run periodic filter passes, keep reports
    tokio::spawn(async move {
        let mut filter_tick = tokio::time::interval(filter_interval);
        filter_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately, before any poll has landed.
        filter_tick.tick().await;

        loop {
            tokio::select! {
                Some(poll) = polls.recv() => {
                    let polled: HashSet<String> = poll.iter().map(|m| m.id.clone()).collect();
                    let outcome = {
                        let mut book = state.book.write().await;
                        let outcome = book.reconcile(poll, &state.db);
                        let pruned = book.prune_stale(&polled, Utc::now());
                        if pruned > 0 {
                            info!("Dropped {} stale matches from earlier days", pruned);
                        }
                        outcome
                    };
                    let outcome = match outcome {
                        Ok(o) => o,
                        Err(e) => {
                            error!("Failed to apply live poll: {}", e);
                            continue;
                        }
                    };
                    *state.last_poll.write().await = Some(Utc::now());
                    info!(
                        "Live list updated: +{} ~{} -{}",
                        outcome.added, outcome.updated, outcome.dropped
                    );
                    if outcome.needs_refresh && state.runner.kind() != FilterKind::None {
                        start_pass(&state).await;
                    }
                }
                _ = filter_tick.tick() => start_pass(&state).await,
                Some(report) = reports.recv() => {
                    state.apply_report(report).await;
                }
            }
        }
    });

    // Run the JSON API server (blocks until shutdown)
    axum::serve(listener, app).await?;

    Ok(())
}

async fn start_pass(state: &AppState) {
    match state.submit_live_pass().await {
        Ok(Some(pass)) => debug!("Filter pass started (generation {})", pass.generation),
        Ok(None) => {}
        Err(e) => warn!("Could not start filter pass: {}", e),
    }
}
