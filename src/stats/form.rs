use serde::Serialize;
use serde_json::Value;

use crate::db::models::{Match, MatchStatus, Role};
use crate::fixtures::normalize::parse_fixture;

/// Goals over the last `lookback` finished matches at one venue role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSummary {
    pub goals_for: i32,
    pub goals_against: i32,
    pub matches_found: usize,
    /// Matches in the window where the team failed to score
    pub scoreless_matches: usize,
    pub lookback: usize,
}

impl FormSummary {
    /// Usable for rank-based filtering only when the whole window was found.
    pub fn is_complete(&self) -> bool {
        self.matches_found >= self.lookback
    }

    pub fn goals_per_match(&self) -> f64 {
        if self.matches_found == 0 {
            return 0.0;
        }
        self.goals_for as f64 / self.matches_found as f64
    }

    pub fn badge(&self) -> FormBadge {
        let color = if self.goals_for >= 6 {
            match self.scoreless_matches {
                0 => BadgeColor::Green,
                1 => BadgeColor::Blue,
                _ => BadgeColor::Red,
            }
        } else {
            BadgeColor::Green
        };
        FormBadge {
            color,
            goals_for: self.goals_for.min(9),
            goals_against: self.goals_against.min(9),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor {
    Green,
    Blue,
    Red,
}

/// Compact form indicator shown next to a team name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormBadge {
    pub color: BadgeColor,
    pub goals_for: i32,
    pub goals_against: i32,
}

/// Aggregate a `fixtures?team&league&season&last` response.
///
/// Only `FT` fixtures in `league_id` with `team_id` playing `role` count.
/// The most recent `lookback` of those are summed.
pub fn summarize_form(
    items: &[Value],
    team_id: u32,
    league_id: u32,
    role: Role,
    lookback: usize,
) -> FormSummary {
    let mut played: Vec<Match> = items
        .iter()
        .filter_map(parse_fixture)
        .filter(|m| m.status == MatchStatus::Finished && m.league_id == league_id)
        .filter(|m| match role {
            Role::Home => m.home_team_id == team_id,
            Role::Away => m.away_team_id == team_id,
        })
        .collect();

    played.sort_by(|a, b| {
        b.kickoff
            .cmp(&a.kickoff)
            .then_with(|| fixture_number(&b.id).cmp(&fixture_number(&a.id)))
    });

    let mut summary = FormSummary {
        goals_for: 0,
        goals_against: 0,
        matches_found: 0,
        scoreless_matches: 0,
        lookback,
    };
    for m in played.iter().take(lookback) {
        let (scored, conceded) = match role {
            Role::Home => (m.home_goals(), m.away_goals()),
            Role::Away => (m.away_goals(), m.home_goals()),
        };
        summary.goals_for += scored;
        summary.goals_against += conceded;
        summary.matches_found += 1;
        if scored == 0 {
            summary.scoreless_matches += 1;
        }
    }
    summary
}

fn fixture_number(id: &str) -> u64 {
    id.parse().unwrap_or(0)
}
