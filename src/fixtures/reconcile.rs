use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::normalize::is_on_day;
use crate::db::models::Match;
use crate::db::{Database, MatchList};

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub updated: usize,
    pub dropped: usize,
    /// A match appeared or went from in-play to finished
    pub needs_refresh: bool,
}

/// Matches currently held for the live view, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct MatchBook {
    matches: Vec<Match>,
}

impl MatchBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }

    /// Merge a fresh poll into the held list.
    ///
    /// Hidden ids are read from the store on every call so a match hidden
    /// between polls never comes back. Held matches missing from the poll
    /// are kept.
    pub fn reconcile(&mut self, poll: Vec<Match>, db: &Database) -> Result<ReconcileOutcome> {
        let hidden = db.match_ids(MatchList::Hidden)?;
        let mut incoming: HashMap<String, Match> = HashMap::with_capacity(poll.len());
        // Poll order decides where new matches land.
        let mut incoming_order = Vec::with_capacity(poll.len());
        for m in poll {
            if !incoming.contains_key(&m.id) {
                incoming_order.push(m.id.clone());
            }
            incoming.insert(m.id.clone(), m);
        }

        let mut outcome = ReconcileOutcome::default();
        let mut kept = Vec::with_capacity(self.matches.len() + incoming.len());

        for mut held in self.matches.drain(..) {
            let fresh = incoming.remove(&held.id);
            if hidden.contains(&held.id) {
                outcome.dropped += 1;
                continue;
            }
            if let Some(fresh) = fresh {
                let was_in_play = held.status.is_in_play();
                let before = held.clone();
                held.merge_from(&fresh);
                if held != before {
                    outcome.updated += 1;
                }
                if was_in_play && held.status.is_finished() {
                    outcome.needs_refresh = true;
                }
            }
            kept.push(held);
        }

        for id in incoming_order {
            let Some(m) = incoming.remove(&id) else {
                continue;
            };
            if hidden.contains(&m.id) {
                continue;
            }
            kept.push(m);
            outcome.added += 1;
            outcome.needs_refresh = true;
        }

        self.matches = kept;
        Ok(outcome)
    }

    /// Held matches that are neither hidden, favorite nor finished.
    pub fn visible(&self, db: &Database) -> Result<Vec<Match>> {
        let hidden = db.match_ids(MatchList::Hidden)?;
        let favorites = db.match_ids(MatchList::Favorite)?;
        Ok(self
            .matches
            .iter()
            .filter(|m| !hidden.contains(&m.id) && !favorites.contains(&m.id))
            .filter(|m| !m.status.is_finished())
            .cloned()
            .collect())
    }

    /// Drop a match right away, e.g. when the user hides it.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.matches.len();
        self.matches.retain(|m| m.id != id);
        self.matches.len() != before
    }

    /// Drop held matches that the latest poll no longer carries and that did
    /// not kick off on `now`'s UTC day. Returns how many were dropped.
    pub fn prune_stale(&mut self, polled: &HashSet<String>, now: DateTime<Utc>) -> usize {
        let day = now.date_naive();
        let before = self.matches.len();
        self.matches
            .retain(|m| polled.contains(&m.id) || is_on_day(m, day));
        before - self.matches.len()
    }

    /// Held matches kicking off on the same UTC day as `now`.
    pub fn today(&self, now: DateTime<Utc>) -> Vec<Match> {
        let day = now.date_naive();
        self.matches
            .iter()
            .filter(|m| is_on_day(m, day))
            .cloned()
            .collect()
    }
}
