pub mod leagues;
pub mod normalize;
pub mod reconcile;

pub use leagues::{fetch_leagues, search_leagues};
pub use normalize::{normalize_fixtures, order_by_minute};
pub use reconcile::MatchBook;

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::api::{response_items, FootballApi};
use crate::db::models::Match;

/// Fixtures currently in play. `None` when the API gave nothing usable,
/// which is not the same as "no live matches".
pub async fn fetch_live(api: &dyn FootballApi) -> Option<Vec<Match>> {
    let payload = api.fetch("fixtures", &[("live", "all".to_string())]).await?;
    let matches = normalize_fixtures(response_items(&payload))
        .into_iter()
        .filter(|m| m.status.is_in_play())
        .collect();
    Some(matches)
}

/// Every fixture scheduled on `date`, empty when the API is unavailable.
pub async fn fetch_by_date(api: &dyn FootballApi, date: NaiveDate) -> Vec<Match> {
    let params = [("date", date.format("%Y-%m-%d").to_string())];
    match api.fetch("fixtures", &params).await {
        Some(payload) => normalize_fixtures(response_items(&payload)),
        None => {
            warn!("No fixtures for {} from {}", date, api.name());
            Vec::new()
        }
    }
}

/// Spawns a background task that polls live fixtures at `poll_interval` and
/// forwards each successful poll through the returned channel. Failed polls
/// are logged and skipped; the held list is left as it was.
pub fn start_fixture_monitor(
    api: Arc<dyn FootballApi>,
    poll_interval: Duration,
) -> mpsc::Receiver<Vec<Match>> {
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        info!(
            "Fixture monitor started ({}, interval={:?})",
            api.name(),
            poll_interval
        );
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let Some(matches) = fetch_live(api.as_ref()).await else {
                warn!("Live poll failed, keeping previous list");
                continue;
            };
            info!("Live poll: {} in-play fixtures", matches.len());
            if let Err(e) = tx.try_send(matches) {
                match e {
                    mpsc::error::TrySendError::Closed(_) => {
                        info!("Fixture monitor stopping: receiver dropped");
                        return;
                    }
                    mpsc::error::TrySendError::Full(_) => {
                        error!("Poll channel full, poll DROPPED");
                    }
                }
            }
        }
    });

    rx
}
