//! Bounded, TTL-checked cache of per-team form and standings.
//!
//! Entries are evicted oldest-inserted first once the cache grows past its
//! capacity; expiry is checked lazily on read. The lock is never held across a
//! network call, so two workers missing on the same key both fetch and the
//! later write wins.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::form::{summarize_form, FormSummary};
use super::standings::{classify_previous, find_team_row, SeasonStanding, StandingsSnapshot};
use crate::api::{response_items, FootballApi};
use crate::db::models::Role;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("no {what} data available for team {team_id}")]
    Unavailable { what: &'static str, team_id: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Form {
        team_id: u32,
        league_id: u32,
        season: i32,
        role: Role,
        lookback: usize,
    },
    Standings {
        team_id: u32,
        league_id: u32,
        season: i32,
    },
}

#[derive(Debug, Clone)]
enum CachedStats {
    Form(FormSummary),
    Standings(StandingsSnapshot),
}

struct Entry {
    value: CachedStats,
    fetched_at: Instant,
}

struct CacheInner {
    entries: HashMap<CacheKey, Entry>,
    /// Insertion order, oldest first
    order: VecDeque<CacheKey>,
}

/// Shared stats cache in front of the football API.
#[derive(Clone)]
pub struct StatsCache {
    api: Arc<dyn FootballApi>,
    inner: Arc<RwLock<CacheInner>>,
    capacity: usize,
    ttl: Duration,
    /// Fixtures requested per form lookup
    form_window: u32,
}

impl StatsCache {
    pub fn new(api: Arc<dyn FootballApi>, capacity: usize, ttl: Duration, form_window: u32) -> Self {
        StatsCache {
            api,
            inner: Arc::new(RwLock::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            })),
            capacity: capacity.max(1),
            ttl,
            form_window,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn get_or_fetch_form(
        &self,
        team_id: u32,
        league_id: u32,
        season: i32,
        role: Role,
        lookback: usize,
    ) -> Result<FormSummary, StatsError> {
        let key = CacheKey::Form {
            team_id,
            league_id,
            season,
            role,
            lookback,
        };
        if let Some(CachedStats::Form(form)) = self.lookup(&key).await {
            return Ok(form);
        }

        let params = [
            ("team", team_id.to_string()),
            ("league", league_id.to_string()),
            ("season", season.to_string()),
            ("last", self.form_window.to_string()),
        ];
        let payload = self
            .api
            .fetch("fixtures", &params)
            .await
            .ok_or(StatsError::Unavailable {
                what: "form",
                team_id,
            })?;

        let form = summarize_form(response_items(&payload), team_id, league_id, role, lookback);
        debug!(
            "Form team={} league={} season={} {}: {} goals in {}/{}",
            team_id, league_id, season, role, form.goals_for, form.matches_found, lookback
        );
        self.insert(key, CachedStats::Form(form.clone())).await;
        Ok(form)
    }

    /// Current-season row plus last season's row, found in the same league
    /// or, failing that, in whichever league the team played last season.
    pub async fn get_or_fetch_standings(
        &self,
        team_id: u32,
        league_id: u32,
        season: i32,
    ) -> Result<StandingsSnapshot, StatsError> {
        let key = CacheKey::Standings {
            team_id,
            league_id,
            season,
        };
        if let Some(CachedStats::Standings(snapshot)) = self.lookup(&key).await {
            return Ok(snapshot);
        }

        let payload = self
            .fetch_standings(team_id, league_id, season)
            .await
            .ok_or(StatsError::Unavailable {
                what: "standings",
                team_id,
            })?;
        let current = find_team_row(&payload, team_id, season);

        let previous = match self.fetch_standings(team_id, league_id, season - 1).await {
            Some(p) => find_team_row(&p, team_id, season - 1),
            None => None,
        };
        let previous = match previous {
            Some(row) => Some(row),
            None => self.find_previous_elsewhere(team_id, league_id, season - 1).await,
        };

        let snapshot = StandingsSnapshot {
            team_id,
            previous_kind: classify_previous(current.as_ref(), previous.as_ref()),
            current,
            previous,
        };
        self.insert(key, CachedStats::Standings(snapshot.clone())).await;
        Ok(snapshot)
    }

    async fn fetch_standings(
        &self,
        team_id: u32,
        league_id: u32,
        season: i32,
    ) -> Option<serde_json::Value> {
        let params = [
            ("league", league_id.to_string()),
            ("season", season.to_string()),
            ("team", team_id.to_string()),
        ];
        self.api.fetch("standings", &params).await
    }

    async fn find_previous_elsewhere(
        &self,
        team_id: u32,
        skip_league: u32,
        season: i32,
    ) -> Option<SeasonStanding> {
        let params = [("team", team_id.to_string()), ("season", season.to_string())];
        let Some(payload) = self.api.fetch("leagues", &params).await else {
            warn!("Could not list {} leagues for team {}", season, team_id);
            return None;
        };

        let league_ids: Vec<u32> = response_items(&payload)
            .iter()
            .filter_map(|l| l.get("league")?.get("id")?.as_u64())
            .map(|id| id as u32)
            .filter(|id| *id != skip_league)
            .collect();

        for id in league_ids {
            if let Some(p) = self.fetch_standings(team_id, id, season).await {
                if let Some(row) = find_team_row(&p, team_id, season) {
                    return Some(row);
                }
            }
        }
        None
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CachedStats> {
        let inner = self.inner.read().await;
        let entry = inner.entries.get(key)?;
        if entry.fetched_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.value.clone())
    }

    async fn insert(&self, key: CacheKey, value: CachedStats) {
        let mut inner = self.inner.write().await;
        if inner.entries.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(
            key,
            Entry {
                value,
                fetched_at: Instant::now(),
            },
        );
        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
    }
}
