//! Forbidden (current-rank, previous-rank) pair groups for the rank-gap filter.
//!
//! The pairs are empirical and kept as opaque data. Each pair is oriented
//! target-first: `(target rank, opponent rank)`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

const EMBEDDED: &str = include_str!("../../data/forbidden_rank_pairs.json");

pub type RankPair = (u32, u32);

#[derive(Deserialize)]
struct RawTable {
    groups: Vec<RawGroup>,
}

#[derive(Deserialize)]
struct RawGroup {
    current: Vec<RankPair>,
    previous: Vec<RankPair>,
}

/// A pair is excluded by a group only when the current-season pair is in
/// `current` and the previous-season pair is in `previous`.
#[derive(Debug, Clone)]
pub struct ExclusionGroup {
    current: HashSet<RankPair>,
    previous: HashSet<RankPair>,
}

#[derive(Debug, Clone)]
pub struct RankPairTable {
    groups: Vec<ExclusionGroup>,
}

impl RankPairTable {
    pub fn from_json(raw: &str) -> Result<Self> {
        let table: RawTable = serde_json::from_str(raw).context("Invalid rank pair table")?;
        let groups = table
            .groups
            .into_iter()
            .map(|g| ExclusionGroup {
                current: g.current.into_iter().collect(),
                previous: g.previous.into_iter().collect(),
            })
            .collect();
        Ok(RankPairTable { groups })
    }

    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED)
    }

    /// The table at `path`, or the embedded one when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read rank table {}", p.display()))?;
                Self::from_json(&raw)
            }
            None => Self::embedded(),
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Index of the first group excluding this combination.
    pub fn forbidden_group(&self, current: RankPair, previous: RankPair) -> Option<usize> {
        self.groups
            .iter()
            .position(|g| g.current.contains(&current) && g.previous.contains(&previous))
    }
}
