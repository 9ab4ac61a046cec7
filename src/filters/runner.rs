//! Background filter passes over the live list.
//!
//! One pass at a time: a submission while a pass is running is dropped, not
//! queued. Finished passes are reported on a single-consumer channel and
//! stamped with the generation they started under, so the consumer can ignore
//! reports that a filter change made stale.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{BusyGuard, FilterEngine, FilterKind, FilterOutcome};
use crate::db::models::Match;

/// Result of one filter pass.
#[derive(Debug, Clone, Serialize)]
pub struct FilterReport {
    pub generation: u64,
    pub kind: FilterKind,
    /// Matches that passed, in submission order
    pub passed: Vec<Match>,
    /// Outcome per match id
    pub results: HashMap<String, FilterOutcome>,
}

/// A submitted pass. The pass runs detached; its report arrives on the
/// runner's channel.
#[derive(Debug, Clone, Copy)]
pub struct PassHandle {
    pub generation: u64,
}

#[derive(Clone)]
pub struct FilterRunner {
    engine: FilterEngine,
    workers: usize,
    busy: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    kind: Arc<RwLock<FilterKind>>,
    tx: mpsc::Sender<FilterReport>,
}

impl FilterRunner {
    pub fn new(
        engine: FilterEngine,
        workers: usize,
        kind: FilterKind,
    ) -> (Self, mpsc::Receiver<FilterReport>) {
        let (tx, rx) = mpsc::channel(8);
        let runner = FilterRunner {
            engine,
            workers: workers.max(1),
            busy: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            kind: Arc::new(RwLock::new(kind)),
            tx,
        };
        (runner, rx)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn kind(&self) -> FilterKind {
        *self.kind.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Switch the active filter. Reports from passes started before the
    /// switch become stale.
    pub fn set_kind(&self, kind: FilterKind) -> u64 {
        *self.kind.write().unwrap_or_else(PoisonError::into_inner) = kind;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!("Filter set to {} (generation {})", kind, generation);
        generation
    }

    pub fn is_current(&self, report: &FilterReport) -> bool {
        report.generation == self.generation()
    }

    /// Start a pass over `candidates`, or `None` if one is already running.
    pub fn try_submit(&self, kind: FilterKind, candidates: Vec<Match>) -> Option<PassHandle> {
        let Some(guard) = BusyGuard::acquire(&self.busy) else {
            debug!("Filter pass in flight, request dropped");
            return None;
        };

        let generation = self.generation();
        let engine = self.engine.clone();
        let workers = self.workers;
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let total = candidates.len();
            let evaluated: Vec<(Match, FilterOutcome)> = stream::iter(candidates)
                .map(|m| {
                    let engine = &engine;
                    async move {
                        let outcome = engine.evaluate(kind, &m).await;
                        (m, outcome)
                    }
                })
                .buffered(workers)
                .collect()
                .await;
            drop(guard);

            let mut results = HashMap::with_capacity(evaluated.len());
            let mut passed = Vec::new();
            for (m, outcome) in evaluated {
                if outcome.passed {
                    passed.push(m.clone());
                }
                results.insert(m.id, outcome);
            }
            info!(
                "Filter pass {} (generation {}): {}/{} passed",
                kind,
                generation,
                passed.len(),
                total
            );

            let report = FilterReport {
                generation,
                kind,
                passed,
                results,
            };
            if tx.send(report).await.is_err() {
                error!("Filter report channel closed, report DROPPED");
            }
        });

        Some(PassHandle { generation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::MatchStatus;
    use crate::db::Database;
    use crate::filters::RankPairTable;
    use crate::stats::StatsCache;
    use crate::testing::{scored_match, MockApi};
    use std::time::Duration;

    fn runner() -> (FilterRunner, mpsc::Receiver<FilterReport>) {
        let api = Arc::new(MockApi::new());
        let stats = StatsCache::new(api.clone(), 10, Duration::from_secs(60), 15);
        let engine = FilterEngine::new(
            api,
            stats,
            Database::open_in_memory().unwrap(),
            Arc::new(RankPairTable::embedded().unwrap()),
            2,
        );
        FilterRunner::new(engine, 2, FilterKind::NoGoalsOrOneScorer)
    }

    fn candidates() -> Vec<Match> {
        vec![
            scored_match("1", 0, 0, MatchStatus::FirstHalf),
            scored_match("2", 1, 1, MatchStatus::SecondHalf),
            scored_match("3", 2, 0, MatchStatus::HalfTime),
        ]
    }

    #[tokio::test]
    async fn pass_reports_outcomes_for_every_match() {
        let (runner, mut rx) = runner();
        let handle = runner
            .try_submit(FilterKind::NoGoalsOrOneScorer, candidates())
            .unwrap();

        let report = rx.recv().await.unwrap();
        assert_eq!(report.generation, handle.generation);
        assert!(runner.is_current(&report));
        assert_eq!(report.results.len(), 3);
        let ids: Vec<_> = report.passed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert!(!report.results["2"].passed);
        assert!(!runner.is_running());
    }

    #[test]
    fn poisoned_kind_lock_keeps_last_kind() {
        let (runner, _rx) = runner();
        runner.set_kind(FilterKind::RankGap);
        let kind = runner.kind.clone();
        let _ = std::thread::spawn(move || {
            let _held = kind.write().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(runner.kind.is_poisoned());
        assert_eq!(runner.kind(), FilterKind::RankGap);

        runner.set_kind(FilterKind::Combined);
        assert_eq!(runner.kind(), FilterKind::Combined);
    }

    #[tokio::test]
    async fn submission_while_running_is_dropped() {
        let (runner, _rx) = runner();
        let _held = BusyGuard::acquire(&runner.busy).unwrap();
        assert!(runner.is_running());
        assert!(runner
            .try_submit(FilterKind::NoGoalsOrOneScorer, candidates())
            .is_none());
    }

    #[tokio::test]
    async fn kind_change_makes_older_reports_stale() {
        let (runner, mut rx) = runner();
        runner
            .try_submit(FilterKind::NoGoalsOrOneScorer, candidates())
            .unwrap();
        let gen = runner.set_kind(FilterKind::RankGap);
        assert_eq!(gen, 1);
        assert_eq!(runner.kind(), FilterKind::RankGap);

        let stale = rx.recv().await.unwrap();
        assert_eq!(stale.generation, 0);
        assert!(!runner.is_current(&stale));
    }
}
