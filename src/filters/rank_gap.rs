//! Rank-gap exclusion: compares recent venue form, then rejects table
//! positions that fall into a forbidden current/previous-season pattern.

use super::rank_table::RankPairTable;
use super::FilterOutcome;
use crate::db::models::{Match, Role};
use crate::stats::{PreviousSeason, Rank, StatsCache, StandingsSnapshot};

/// Finished venue matches required per side.
pub const RANK_GAP_LOOKBACK: usize = 3;

pub async fn rank_gap(m: &Match, stats: &StatsCache, table: &RankPairTable) -> FilterOutcome {
    if m.home_team_id == 0 || m.away_team_id == 0 || m.league_id == 0 {
        return FilterOutcome::fail("missing team or league id");
    }

    let home_form = stats
        .get_or_fetch_form(m.home_team_id, m.league_id, m.season, Role::Home, RANK_GAP_LOOKBACK)
        .await;
    let away_form = stats
        .get_or_fetch_form(m.away_team_id, m.league_id, m.season, Role::Away, RANK_GAP_LOOKBACK)
        .await;
    let (home_form, away_form) = match (home_form, away_form) {
        (Ok(h), Ok(a)) if h.is_complete() && a.is_complete() => (h, a),
        (Ok(_), Ok(_)) => {
            return FilterOutcome::fail("insufficient data: fewer than 3 finished matches")
        }
        (Err(e), _) | (_, Err(e)) => {
            return FilterOutcome::fail(format!("insufficient data: {e}"))
        }
    };

    let (h, a) = (home_form.goals_for, away_form.goals_for);
    if h == a {
        return FilterOutcome::pass(format!("Goals Equal: {h}-{a}"));
    }

    let target_is_home = h > a;
    let (target_goals, other_goals) = if target_is_home { (h, a) } else { (a, h) };
    let target_name = if target_is_home { &m.home_team } else { &m.away_team };

    let home = stats
        .get_or_fetch_standings(m.home_team_id, m.league_id, m.season)
        .await;
    let away = stats
        .get_or_fetch_standings(m.away_team_id, m.league_id, m.season)
        .await;
    let (home, away) = match (home, away) {
        (Ok(h), Ok(a)) => (h, a),
        (Err(e), _) | (_, Err(e)) => {
            return FilterOutcome::fail(format!(
                "Goals: {target_goals}-{other_goals} - standings unavailable: {e}"
            ))
        }
    };

    let (Some(ch), Some(ca)) = (
        home.current_rank().position(),
        away.current_rank().position(),
    ) else {
        return FilterOutcome::fail(format!(
            "Goals: {target_goals}-{other_goals} - No current rank for one team"
        ));
    };

    let (lh, la) = match (previous_rank(&home), previous_rank(&away)) {
        (Ok(lh), Ok(la)) => (lh, la),
        (Err(why), _) | (_, Err(why)) => {
            return FilterOutcome::fail(format!("Goals: {target_goals}-{other_goals} - {why}"))
        }
    };

    let (current, previous) = if target_is_home {
        ((ch, ca), (lh, la))
    } else {
        ((ca, ch), (la, lh))
    };

    if table.forbidden_group(current, previous).is_some() {
        return FilterOutcome::fail(format!(
            "Forbidden: {target_name} with {target_goals} goals vs {other_goals}, Current: {current:?}, Last: {previous:?}"
        ));
    }

    let (target_rank, other_rank) = current;
    if target_rank < other_rank {
        FilterOutcome::pass(format!(
            "Goals: {target_goals}-{other_goals} | Target Rank: {target_rank} | Other Rank: {other_rank}"
        ))
    } else {
        FilterOutcome::fail(format!(
            "Goals: {target_goals}-{other_goals} - Target Rank {target_rank} is not better than Other Rank {other_rank}"
        ))
    }
}

/// Last season's position, usable only when the team stayed in the league.
fn previous_rank(s: &StandingsSnapshot) -> Result<u32, &'static str> {
    match s.previous_kind {
        PreviousSeason::Normal(Rank::Position(n)) => Ok(n),
        PreviousSeason::Promoted(_) | PreviousSeason::Relegated(_) | PreviousSeason::NewTeam => {
            Err("Promoted/Relegated/New Team")
        }
        PreviousSeason::Normal(Rank::NotAvailable) | PreviousSeason::Unknown => {
            Err("Invalid last rank format")
        }
    }
}
