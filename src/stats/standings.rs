use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::api::response_items;

/// A table position, or "N/A" when the provider has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Position(u32),
    NotAvailable,
}

impl Rank {
    pub fn from_value(v: Option<&Value>) -> Self {
        let parsed = v.and_then(|v| {
            v.as_u64()
                .map(|n| n as u32)
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        });
        match parsed {
            Some(n) if n > 0 => Rank::Position(n),
            _ => Rank::NotAvailable,
        }
    }

    pub fn position(self) -> Option<u32> {
        match self {
            Rank::Position(n) => Some(n),
            Rank::NotAvailable => None,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::Position(n) => write!(f, "{n}"),
            Rank::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for Rank {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rank::Position(n) => serializer.serialize_u32(*n),
            Rank::NotAvailable => serializer.serialize_str("N/A"),
        }
    }
}

/// One team's row in one league table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonStanding {
    pub league_id: u32,
    pub league_name: String,
    pub season: i32,
    pub rank: Rank,
    pub points: Option<i32>,
    pub played: Option<i32>,
    pub won: Option<i32>,
    pub drawn: Option<i32>,
    pub lost: Option<i32>,
}

/// How last season relates to the current competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "rank", rename_all = "snake_case")]
pub enum PreviousSeason {
    /// Same competition both seasons
    Normal(Rank),
    /// Top six of a different competition
    Promoted(u32),
    /// Outside the top six of a different competition
    Relegated(u32),
    /// No table row anywhere last season
    NewTeam,
    /// Different competition with an unusable rank
    Unknown,
}

/// Current and previous-season standing for one team.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandingsSnapshot {
    pub team_id: u32,
    pub current: Option<SeasonStanding>,
    pub previous: Option<SeasonStanding>,
    pub previous_kind: PreviousSeason,
}

impl StandingsSnapshot {
    pub fn current_rank(&self) -> Rank {
        self.current
            .as_ref()
            .map(|s| s.rank)
            .unwrap_or(Rank::NotAvailable)
    }
}

/// Scan a `standings` response for `team_id` across every table group.
pub fn find_team_row(payload: &Value, team_id: u32, season: i32) -> Option<SeasonStanding> {
    let entry = response_items(payload).first()?;
    let league = entry.get("league")?;
    let league_id = league.get("id").and_then(Value::as_u64).unwrap_or(0) as u32;
    let league_name = league
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let groups = league.get("standings")?.as_array()?;
    let row = groups
        .iter()
        .filter_map(Value::as_array)
        .flatten()
        .find(|row| {
            row.get("team")
                .and_then(|t| t.get("id"))
                .and_then(Value::as_u64)
                == Some(team_id as u64)
        })?;

    let all = row.get("all");
    let stat = |key: &str| {
        all.and_then(|a| a.get(key))
            .and_then(Value::as_i64)
            .map(|n| n as i32)
    };
    Some(SeasonStanding {
        league_id,
        league_name,
        season,
        rank: Rank::from_value(row.get("rank")),
        points: row.get("points").and_then(Value::as_i64).map(|n| n as i32),
        played: stat("played"),
        won: stat("win"),
        drawn: stat("draw"),
        lost: stat("lose"),
    })
}

/// Classify last season's row against the current competition.
pub fn classify_previous(
    current: Option<&SeasonStanding>,
    previous: Option<&SeasonStanding>,
) -> PreviousSeason {
    let Some(prev) = previous else {
        return PreviousSeason::NewTeam;
    };
    let same_league = current
        .map(|cur| cur.league_id == prev.league_id || cur.league_name == prev.league_name)
        .unwrap_or(false);
    if same_league {
        return PreviousSeason::Normal(prev.rank);
    }
    match prev.rank.position() {
        Some(n) if n <= 6 => PreviousSeason::Promoted(n),
        Some(n) => PreviousSeason::Relegated(n),
        None => PreviousSeason::Unknown,
    }
}
