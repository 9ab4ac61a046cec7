use serde::Serialize;

use super::conditions::LOSER_LOOKBACK;
use crate::db::models::{Match, MatchStatus, Role};
use crate::stats::{FormBadge, FormSummary, StandingsSnapshot, StatsCache};

#[derive(Debug, Clone, Serialize)]
pub struct TeamInsight {
    pub team_id: u32,
    pub name: String,
    pub role: Role,
    /// `None` when the form lookup failed
    pub form: Option<FormBadge>,
    pub goals_per_match: Option<f64>,
    pub standings: Option<StandingsSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchInsight {
    pub match_id: String,
    pub first: TeamInsight,
    pub second: TeamInsight,
}

/// Before kickoff or at 0-0 the side with more recent goals goes first
/// (home on ties); otherwise the side behind goes first.
pub async fn build(m: &Match, stats: &StatsCache) -> MatchInsight {
    let home_form = stats
        .get_or_fetch_form(m.home_team_id, m.league_id, m.season, Role::Home, LOSER_LOOKBACK)
        .await
        .ok();
    let away_form = stats
        .get_or_fetch_form(m.away_team_id, m.league_id, m.season, Role::Away, LOSER_LOOKBACK)
        .await
        .ok();

    let (home, away) = (m.home_goals(), m.away_goals());
    let home_first = if m.status == MatchStatus::NotStarted || (home == 0 && away == 0) {
        let goals = |f: &Option<FormSummary>| f.as_ref().map_or(0, |f| f.goals_for);
        goals(&home_form) >= goals(&away_form)
    } else {
        home <= away
    };

    let home_standings = stats
        .get_or_fetch_standings(m.home_team_id, m.league_id, m.season)
        .await
        .ok();
    let away_standings = stats
        .get_or_fetch_standings(m.away_team_id, m.league_id, m.season)
        .await
        .ok();

    let home_side = TeamInsight {
        team_id: m.home_team_id,
        name: m.home_team.clone(),
        role: Role::Home,
        form: home_form.as_ref().map(FormSummary::badge),
        goals_per_match: home_form.as_ref().map(FormSummary::goals_per_match),
        standings: home_standings,
    };
    let away_side = TeamInsight {
        team_id: m.away_team_id,
        name: m.away_team.clone(),
        role: Role::Away,
        form: away_form.as_ref().map(FormSummary::badge),
        goals_per_match: away_form.as_ref().map(FormSummary::goals_per_match),
        standings: away_standings,
    };

    let (first, second) = if home_first {
        (home_side, away_side)
    } else {
        (away_side, home_side)
    };
    MatchInsight {
        match_id: m.id.clone(),
        first,
        second,
    }
}
