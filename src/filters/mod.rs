pub mod conditions;
pub mod insight;
pub mod rank_gap;
pub mod rank_table;
pub mod runner;

pub use insight::MatchInsight;
pub use rank_table::RankPairTable;
pub use runner::{FilterReport, FilterRunner, PassHandle};

use anyhow::Result;
use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::FootballApi;
use crate::db::models::{FilterState, Match};
use crate::db::{Database, LeagueList, MatchList};
use crate::fixtures::fetch_by_date;
use crate::stats::StatsCache;

/// Named match filters. The snake_case names are persisted and used over HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    None,
    NoGoalsOrOneScorer,
    LoserOutscoredRecently,
    Combined,
    RankGap,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterKind::None => "none",
            FilterKind::NoGoalsOrOneScorer => "no_goals_or_one_scorer",
            FilterKind::LoserOutscoredRecently => "loser_outscored_recently",
            FilterKind::Combined => "combined",
            FilterKind::RankGap => "rank_gap",
        };
        f.write_str(name)
    }
}

/// Pass/fail for one match with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    pub passed: bool,
    pub reason: String,
}

impl FilterOutcome {
    pub fn pass(reason: impl Into<String>) -> Self {
        FilterOutcome {
            passed: true,
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        FilterOutcome {
            passed: false,
            reason: reason.into(),
        }
    }
}

/// Evaluates filters against matches using the shared stats cache.
#[derive(Clone)]
pub struct FilterEngine {
    api: Arc<dyn FootballApi>,
    stats: StatsCache,
    store: Database,
    table: Arc<RankPairTable>,
    workers: usize,
    calendar_busy: Arc<AtomicBool>,
}

/// Clears an in-flight flag when dropped.
pub(crate) struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    pub(crate) fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FilterEngine {
    pub fn new(
        api: Arc<dyn FootballApi>,
        stats: StatsCache,
        store: Database,
        table: Arc<RankPairTable>,
        workers: usize,
    ) -> Self {
        FilterEngine {
            api,
            stats,
            store,
            table,
            workers: workers.max(1),
            calendar_busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stats(&self) -> &StatsCache {
        &self.stats
    }

    pub async fn evaluate(&self, kind: FilterKind, m: &Match) -> FilterOutcome {
        match kind {
            FilterKind::None => FilterOutcome::fail("no filter"),
            FilterKind::NoGoalsOrOneScorer => conditions::no_goals_or_one_scorer(m),
            FilterKind::LoserOutscoredRecently => {
                conditions::loser_outscored_recently(m, &self.stats).await
            }
            FilterKind::Combined => {
                let first = conditions::no_goals_or_one_scorer(m);
                if !first.passed {
                    return first;
                }
                conditions::loser_outscored_recently(m, &self.stats).await
            }
            FilterKind::RankGap => rank_gap::rank_gap(m, &self.stats, &self.table).await,
        }
    }

    /// In-play held matches worth filtering: hidden ones are skipped and,
    /// when the user picked any leagues, only those leagues are kept.
    pub fn live_candidates(&self, held: &[Match]) -> Result<Vec<Match>> {
        let hidden = self.store.match_ids(MatchList::Hidden)?;
        let leagues = self.store.required_league_ids()?;
        Ok(held
            .iter()
            .filter(|m| m.status.is_in_play())
            .filter(|m| !hidden.contains(&m.id))
            .filter(|m| leagues.is_empty() || leagues.contains(&m.league_id))
            .cloned()
            .collect())
    }

    /// Fixtures for `date`, narrowed by the calendar filter when it is on.
    ///
    /// A second request while one calendar pass is running gets the
    /// unfiltered list instead of waiting.
    pub async fn calendar(&self, date: NaiveDate, state: &FilterState) -> Result<Vec<Match>> {
        let matches = fetch_by_date(self.api.as_ref(), date).await;
        if !state.calendar_filter_active || matches.is_empty() {
            return Ok(matches);
        }

        let selected = self.store.league_ids(LeagueList::Selected)?;
        if selected.is_empty() {
            debug!("Calendar filter on but no leagues selected");
            return Ok(matches);
        }

        let Some(_guard) = BusyGuard::acquire(&self.calendar_busy) else {
            debug!("Calendar pass already running, returning unfiltered list");
            return Ok(matches);
        };

        let kind = state.calendar_filter;
        let candidates: Vec<Match> = matches
            .into_iter()
            .filter(|m| selected.contains(&m.league_id))
            .collect();
        let total = candidates.len();
        let kept: Vec<Match> = stream::iter(candidates)
            .map(|m| async move {
                let outcome = self.evaluate(kind, &m).await;
                (m, outcome)
            })
            .buffered(self.workers)
            .filter_map(|(m, outcome)| async move { outcome.passed.then_some(m) })
            .collect()
            .await;

        info!(
            "Calendar {} ({}): {}/{} fixtures kept",
            date,
            kind,
            kept.len(),
            total
        );
        Ok(kept)
    }

    pub async fn insight(&self, m: &Match) -> MatchInsight {
        insight::build(m, &self.stats).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{League, MatchStatus};
    use crate::testing::{
        away_form_payload, fixture_json, home_form_payload, scored_match, MockApi,
    };
    use serde_json::json;
    use std::time::Duration;

    fn engine(api: &Arc<MockApi>, db: &Database) -> FilterEngine {
        let stats = StatsCache::new(api.clone(), 100, Duration::from_secs(60), 15);
        let table = Arc::new(RankPairTable::embedded().unwrap());
        FilterEngine::new(api.clone(), stats, db.clone(), table, 4)
    }

    fn league(id: u32) -> League {
        League {
            id,
            name: format!("League {id}"),
            kind: None,
            logo: None,
            country_name: None,
            country_code: None,
            flag: None,
            season: None,
        }
    }

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&FilterKind::LoserOutscoredRecently).unwrap(),
            "\"loser_outscored_recently\""
        );
        let kind: FilterKind = serde_json::from_str("\"rank_gap\"").unwrap();
        assert_eq!(kind, FilterKind::RankGap);
        assert_eq!(FilterKind::default().to_string(), "none");
    }

    #[tokio::test]
    async fn none_kind_always_fails() {
        let api = Arc::new(MockApi::new());
        let db = Database::open_in_memory().unwrap();
        let out = engine(&api, &db)
            .evaluate(FilterKind::None, &scored_match("1", 0, 0, MatchStatus::FirstHalf))
            .await;
        assert_eq!(out, FilterOutcome::fail("no filter"));
    }

    #[tokio::test]
    async fn combined_stops_at_first_failure() {
        let api = Arc::new(MockApi::new());
        let db = Database::open_in_memory().unwrap();
        let m = scored_match("1", 1, 1, MatchStatus::SecondHalf);
        let out = engine(&api, &db).evaluate(FilterKind::Combined, &m).await;
        assert!(!out.passed);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn combined_runs_second_condition() {
        let api = Arc::new(MockApi::new());
        let db = Database::open_in_memory().unwrap();
        // 0-1: home is losing and has no stats available
        let m = scored_match("1", 0, 1, MatchStatus::SecondHalf);
        let out = engine(&api, &db).evaluate(FilterKind::Combined, &m).await;
        assert!(!out.passed);
        assert!(api.calls() > 0);
    }

    #[test]
    fn live_candidates_respect_leagues_and_hidden() {
        let api = Arc::new(MockApi::new());
        let db = Database::open_in_memory().unwrap();
        let eng = engine(&api, &db);

        let mut other_league = scored_match("2", 0, 0, MatchStatus::FirstHalf);
        other_league.league_id = 140;
        let held = vec![
            scored_match("1", 0, 0, MatchStatus::FirstHalf),
            other_league,
            scored_match("3", 0, 0, MatchStatus::NotStarted),
            scored_match("4", 1, 0, MatchStatus::HalfTime),
        ];

        let ids = |v: Vec<Match>| v.into_iter().map(|m| m.id).collect::<Vec<_>>();
        assert_eq!(ids(eng.live_candidates(&held).unwrap()), vec!["1", "2", "4"]);

        db.add_league(LeagueList::Favorite, &league(39)).unwrap();
        db.add_match(MatchList::Hidden, &held[3]).unwrap();
        assert_eq!(ids(eng.live_candidates(&held).unwrap()), vec!["1"]);
    }

    #[tokio::test]
    async fn calendar_filters_selected_leagues_with_rank_gap() {
        let api = Arc::new(MockApi::new());
        api.route(
            "fixtures",
            &[("date", "2024-05-01")],
            json!({"response": [
                fixture_json(1, 39, 10, 11, None, None, "NS", "2024-05-01T18:00:00Z"),
                fixture_json(2, 39, 12, 13, None, None, "NS", "2024-05-01T18:00:00Z"),
                fixture_json(3, 140, 14, 15, None, None, "NS", "2024-05-01T18:00:00Z"),
            ]}),
        );
        let form = |team: &'static str| {
            [("team", team), ("league", "39"), ("season", "2024"), ("last", "15")]
        };
        // fixture 1: equal goals passes; fixture 2: no history fails
        api.route("fixtures", &form("10"), home_form_payload(10, 39, &[1, 1, 1]));
        api.route("fixtures", &form("11"), away_form_payload(11, 39, &[2, 0, 1]));

        let db = Database::open_in_memory().unwrap();
        let eng = engine(&api, &db);
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut state = FilterState::default();

        assert_eq!(eng.calendar(day, &state).await.unwrap().len(), 3);

        state.calendar_filter_active = true;
        // nothing selected: unfiltered
        assert_eq!(eng.calendar(day, &state).await.unwrap().len(), 3);

        db.add_league(LeagueList::Selected, &league(39)).unwrap();
        let kept = eng.calendar(day, &state).await.unwrap();
        let ids: Vec<_> = kept.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[tokio::test]
    async fn calendar_pass_in_flight_returns_unfiltered() {
        let api = Arc::new(MockApi::new());
        api.route(
            "fixtures",
            &[("date", "2024-05-01")],
            json!({"response": [
                fixture_json(1, 39, 10, 11, None, None, "NS", "2024-05-01T18:00:00Z"),
            ]}),
        );
        let db = Database::open_in_memory().unwrap();
        db.add_league(LeagueList::Selected, &league(39)).unwrap();
        let eng = engine(&api, &db);
        let state = FilterState {
            calendar_filter_active: true,
            ..FilterState::default()
        };

        let _held = BusyGuard::acquire(&eng.calendar_busy).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(eng.calendar(day, &state).await.unwrap().len(), 1);
        assert!(BusyGuard::acquire(&eng.calendar_busy).is_none());
    }
}
