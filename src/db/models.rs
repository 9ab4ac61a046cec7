use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::filters::FilterKind;

/// Canonical fixture record produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Provider fixture ID, stable across polls
    pub id: String,
    pub league_id: u32,
    pub league_name: String,
    pub season: i32,
    pub home_team_id: u32,
    pub home_team: String,
    pub away_team_id: u32,
    pub away_team: String,
    /// Absent before kickoff
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub status: MatchStatus,
    /// Minutes played, when the provider reports it
    pub elapsed: Option<i32>,
    pub kickoff: Option<DateTime<Utc>>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub referee: Option<String>,
    /// Raw provider events, passed through untouched
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

impl Match {
    pub fn home_goals(&self) -> i32 {
        self.home_score.unwrap_or(0)
    }

    pub fn away_goals(&self) -> i32 {
        self.away_score.unwrap_or(0)
    }

    /// Merge a fresher poll of the same fixture into this record.
    pub fn merge_from(&mut self, newer: &Match) {
        self.home_score = newer.home_score;
        self.away_score = newer.away_score;
        self.status = newer.status.clone();
        self.elapsed = newer.elapsed;
        if newer.kickoff.is_some() {
            self.kickoff = newer.kickoff;
        }
        if !newer.events.is_empty() {
            self.events = newer.events.clone();
        }
    }
}

/// Fixture status, keyed by the provider's short code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MatchStatus {
    NotStarted,
    TimeToBeDefined,
    FirstHalf,
    HalfTime,
    SecondHalf,
    ExtraTime,
    BreakTime,
    Penalties,
    Live,
    Suspended,
    Interrupted,
    Finished,
    FinishedAfterExtraTime,
    FinishedAfterPenalties,
    Postponed,
    Cancelled,
    Abandoned,
    TechnicalLoss,
    WalkOver,
    Other(String),
}

impl MatchStatus {
    pub fn from_short(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "NS" => MatchStatus::NotStarted,
            "TBD" => MatchStatus::TimeToBeDefined,
            "1H" => MatchStatus::FirstHalf,
            "HT" => MatchStatus::HalfTime,
            "2H" => MatchStatus::SecondHalf,
            "ET" => MatchStatus::ExtraTime,
            "BT" => MatchStatus::BreakTime,
            "P" => MatchStatus::Penalties,
            "LIVE" => MatchStatus::Live,
            "SUSP" => MatchStatus::Suspended,
            "INT" => MatchStatus::Interrupted,
            "FT" => MatchStatus::Finished,
            "AET" => MatchStatus::FinishedAfterExtraTime,
            "PEN" => MatchStatus::FinishedAfterPenalties,
            "PST" => MatchStatus::Postponed,
            "CANC" => MatchStatus::Cancelled,
            "ABD" => MatchStatus::Abandoned,
            "AWD" => MatchStatus::TechnicalLoss,
            "WO" => MatchStatus::WalkOver,
            other => MatchStatus::Other(other.to_string()),
        }
    }

    pub fn short(&self) -> &str {
        match self {
            MatchStatus::NotStarted => "NS",
            MatchStatus::TimeToBeDefined => "TBD",
            MatchStatus::FirstHalf => "1H",
            MatchStatus::HalfTime => "HT",
            MatchStatus::SecondHalf => "2H",
            MatchStatus::ExtraTime => "ET",
            MatchStatus::BreakTime => "BT",
            MatchStatus::Penalties => "P",
            MatchStatus::Live => "LIVE",
            MatchStatus::Suspended => "SUSP",
            MatchStatus::Interrupted => "INT",
            MatchStatus::Finished => "FT",
            MatchStatus::FinishedAfterExtraTime => "AET",
            MatchStatus::FinishedAfterPenalties => "PEN",
            MatchStatus::Postponed => "PST",
            MatchStatus::Cancelled => "CANC",
            MatchStatus::Abandoned => "ABD",
            MatchStatus::TechnicalLoss => "AWD",
            MatchStatus::WalkOver => "WO",
            MatchStatus::Other(code) => code,
        }
    }

    /// Ball in play or a scheduled break inside the match.
    pub fn is_in_play(&self) -> bool {
        matches!(
            self,
            MatchStatus::FirstHalf
                | MatchStatus::HalfTime
                | MatchStatus::SecondHalf
                | MatchStatus::ExtraTime
                | MatchStatus::BreakTime
                | MatchStatus::Penalties
                | MatchStatus::Live
        )
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            MatchStatus::Finished
                | MatchStatus::FinishedAfterExtraTime
                | MatchStatus::FinishedAfterPenalties
        )
    }
}

impl From<String> for MatchStatus {
    fn from(code: String) -> Self {
        MatchStatus::from_short(&code)
    }
}

impl From<MatchStatus> for String {
    fn from(status: MatchStatus) -> Self {
        status.short().to_string()
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// Venue role of a team in a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Home,
    Away,
}

impl Role {
    pub fn opposite(self) -> Self {
        match self {
            Role::Home => Role::Away,
            Role::Away => Role::Home,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Home => f.write_str("home"),
            Role::Away => f.write_str("away"),
        }
    }
}

/// A competition as listed by the provider's leagues endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub id: u32,
    pub name: String,
    /// "League" | "Cup"
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub season: Option<i32>,
}

impl League {
    pub fn display_name(&self) -> String {
        match self.country_name.as_deref() {
            Some(country) if !country.is_empty() => format!("{} ({})", self.name, country),
            _ => self.name.clone(),
        }
    }
}

/// Persisted filter toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub live_filter: FilterKind,
    #[serde(default)]
    pub calendar_filter_active: bool,
    #[serde(default = "default_calendar_filter")]
    pub calendar_filter: FilterKind,
}

fn default_calendar_filter() -> FilterKind {
    FilterKind::RankGap
}

impl Default for FilterState {
    fn default() -> Self {
        FilterState {
            live_filter: FilterKind::None,
            calendar_filter_active: false,
            calendar_filter: default_calendar_filter(),
        }
    }
}
