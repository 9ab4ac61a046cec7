use tracing::debug;

use super::FilterOutcome;
use crate::db::models::{Match, MatchStatus, Role};
use crate::stats::StatsCache;

/// Finished matches the loser filter looks back over.
pub const LOSER_LOOKBACK: usize = 3;
/// Losing side may not have conceded more than this over the lookback.
pub const LOSER_CONCEDED_CEILING: i32 = 7;
/// Maximum extra goals the loser may have conceded compared to the leader.
pub const CONCEDED_GAP_LIMIT: i32 = 4;

fn recognized(status: &MatchStatus) -> bool {
    matches!(
        status,
        MatchStatus::NotStarted
            | MatchStatus::FirstHalf
            | MatchStatus::SecondHalf
            | MatchStatus::HalfTime
            | MatchStatus::ExtraTime
            | MatchStatus::Live
    )
}

/// Passes before kickoff, at 0-0, or while only one side has scored.
pub fn no_goals_or_one_scorer(m: &Match) -> FilterOutcome {
    if !recognized(&m.status) {
        return FilterOutcome::fail(format!("status {} not eligible", m.status));
    }
    if m.status == MatchStatus::NotStarted {
        return FilterOutcome::pass("not started");
    }
    match (m.home_goals(), m.away_goals()) {
        (0, 0) => FilterOutcome::pass("0-0"),
        (h, a) if (h > 0) != (a > 0) => FilterOutcome::pass(format!("one scorer {h}-{a}")),
        (h, a) => FilterOutcome::fail(format!("both sides scored {h}-{a}")),
    }
}

/// Passes when the side currently losing has scored at least as many goals
/// as the leader over their recent matches at the same venue role.
pub async fn loser_outscored_recently(m: &Match, stats: &StatsCache) -> FilterOutcome {
    let (home, away) = (m.home_goals(), m.away_goals());

    if m.status.is_finished() {
        if home == 0 && away == 0 {
            return FilterOutcome::fail("انتهت بالتعادل السلبي 0-0");
        }
        return FilterOutcome::fail("انتهت: FT/AET/PEN");
    }
    if home > 0 && away > 0 {
        return FilterOutcome::fail("سجلوا كلاهما");
    }
    if !recognized(&m.status) {
        return FilterOutcome::fail(format!("status {} not eligible", m.status));
    }
    if m.status == MatchStatus::NotStarted {
        return FilterOutcome::pass("not started");
    }
    if home == away {
        return FilterOutcome::pass(format!("level {home}-{away}"));
    }
    if m.home_team_id == 0 || m.away_team_id == 0 || m.league_id == 0 {
        return FilterOutcome::fail("missing team or league id");
    }

    let (loser_id, leader_id, loser_role) = if home < away {
        (m.home_team_id, m.away_team_id, Role::Home)
    } else {
        (m.away_team_id, m.home_team_id, Role::Away)
    };

    let loser = stats
        .get_or_fetch_form(loser_id, m.league_id, m.season, loser_role, LOSER_LOOKBACK)
        .await;
    let leader = stats
        .get_or_fetch_form(
            leader_id,
            m.league_id,
            m.season,
            loser_role.opposite(),
            LOSER_LOOKBACK,
        )
        .await;
    let (loser, leader) = match (loser, leader) {
        (Ok(l), Ok(w)) => (l, w),
        (Err(e), _) | (_, Err(e)) => {
            debug!("Match {}: {}", m.id, e);
            return FilterOutcome::fail(format!("cannot evaluate: {e}"));
        }
    };

    if loser.goals_against > LOSER_CONCEDED_CEILING {
        return FilterOutcome::fail("الخاسر استقبل أكثر من 7 أهداف");
    }
    if loser.goals_against - leader.goals_against > CONCEDED_GAP_LIMIT {
        return FilterOutcome::fail("الخاسر استقبل عدد أهداف مرتفع");
    }
    if loser.goals_for >= leader.goals_for {
        return FilterOutcome::pass(format!(
            "loser scored {} vs {}",
            loser.goals_for, leader.goals_for
        ));
    }
    FilterOutcome::fail("الأهداف المسجلة للخاسر أقل")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture_json, home_form_payload, scored_match, MockApi};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn form_route(api: &MockApi, team: u32, payload: serde_json::Value) {
        let team = team.to_string();
        api.route(
            "fixtures",
            &[
                ("team", team.as_str()),
                ("league", "39"),
                ("season", "2024"),
                ("last", "15"),
            ],
            payload,
        );
    }

    /// Away fixtures for `team_id` with explicit (for, against) per match.
    fn away_results(team_id: u32, results: &[(i32, i32)]) -> serde_json::Value {
        let fixtures: Vec<_> = results
            .iter()
            .enumerate()
            .map(|(i, (gf, ga))| {
                fixture_json(
                    7000 + i as u64,
                    39,
                    300 + i as u32,
                    team_id,
                    Some(*ga),
                    Some(*gf),
                    "FT",
                    &format!("2024-04-{:02}T15:00:00Z", 20 - i),
                )
            })
            .collect();
        json!({"errors": [], "response": fixtures})
    }

    fn stats(api: &Arc<MockApi>) -> StatsCache {
        StatsCache::new(api.clone(), 100, Duration::from_secs(60), 15)
    }

    #[test]
    fn one_scorer_table() {
        let pass = |h, a, s| no_goals_or_one_scorer(&scored_match("1", h, a, s)).passed;
        assert!(pass(0, 0, MatchStatus::FirstHalf));
        assert!(pass(2, 0, MatchStatus::SecondHalf));
        assert!(pass(0, 1, MatchStatus::HalfTime));
        assert!(pass(3, 3, MatchStatus::NotStarted));
        assert!(!pass(1, 1, MatchStatus::SecondHalf));
        assert!(!pass(2, 1, MatchStatus::Live));
        assert!(!pass(0, 0, MatchStatus::Finished));
        assert!(!pass(0, 0, MatchStatus::Penalties));
    }

    #[test]
    fn level_scoring_draw_always_fails_one_scorer() {
        for n in 1..5 {
            for status in [MatchStatus::FirstHalf, MatchStatus::ExtraTime, MatchStatus::Live] {
                let out = no_goals_or_one_scorer(&scored_match("1", n, n, status));
                assert!(!out.passed);
            }
        }
    }

    #[tokio::test]
    async fn loser_with_fewer_recent_goals_fails() {
        let api = Arc::new(MockApi::new());
        // home leads 1-0: home side 5 goals over its last 3 home games,
        // away side 2 over its last 3 away games
        form_route(&api, 1, home_form_payload(1, 39, &[2, 2, 1]));
        form_route(&api, 2, away_results(2, &[(1, 1), (1, 0), (0, 2)]));
        let m = scored_match("1", 1, 0, MatchStatus::SecondHalf);

        let out = loser_outscored_recently(&m, &stats(&api)).await;
        assert!(!out.passed);
        assert_eq!(out.reason, "الأهداف المسجلة للخاسر أقل");
    }

    #[tokio::test]
    async fn loser_matching_leader_passes() {
        let api = Arc::new(MockApi::new());
        form_route(&api, 1, home_form_payload(1, 39, &[1, 1, 1]));
        form_route(&api, 2, away_results(2, &[(2, 1), (1, 1), (0, 0)]));
        let m = scored_match("1", 1, 0, MatchStatus::FirstHalf);

        let out = loser_outscored_recently(&m, &stats(&api)).await;
        assert!(out.passed, "{}", out.reason);
    }

    #[tokio::test]
    async fn loser_conceding_too_much_fails() {
        let api = Arc::new(MockApi::new());
        form_route(&api, 1, home_form_payload(1, 39, &[1, 1, 1]));
        form_route(&api, 2, away_results(2, &[(3, 3), (2, 3), (1, 2)]));
        let m = scored_match("1", 1, 0, MatchStatus::SecondHalf);

        let out = loser_outscored_recently(&m, &stats(&api)).await;
        assert_eq!(out.reason, "الخاسر استقبل أكثر من 7 أهداف");
    }

    #[tokio::test]
    async fn conceded_gap_over_limit_fails() {
        let api = Arc::new(MockApi::new());
        form_route(&api, 1, home_form_payload(1, 39, &[1, 1, 1]));
        form_route(&api, 2, away_results(2, &[(3, 2), (2, 2), (1, 1)]));
        let m = scored_match("1", 1, 0, MatchStatus::SecondHalf);

        let out = loser_outscored_recently(&m, &stats(&api)).await;
        assert_eq!(out.reason, "الخاسر استقبل عدد أهداف مرتفع");
    }

    #[tokio::test]
    async fn short_circuits_without_network() {
        let api = Arc::new(MockApi::new());
        let cache = stats(&api);
        let cases = [
            (scored_match("1", 0, 0, MatchStatus::NotStarted), true),
            (scored_match("2", 0, 0, MatchStatus::FirstHalf), true),
            (scored_match("3", 1, 1, MatchStatus::SecondHalf), false),
            (scored_match("4", 2, 0, MatchStatus::Finished), false),
            (scored_match("5", 1, 0, MatchStatus::Suspended), false),
        ];
        for (m, expected) in cases {
            assert_eq!(loser_outscored_recently(&m, &cache).await.passed, expected, "{}", m.id);
        }
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn short_form_window_is_summed_as_found() {
        let api = Arc::new(MockApi::new());
        form_route(&api, 1, home_form_payload(1, 39, &[1, 1, 0]));
        // a single finished away game carrying two goals
        form_route(&api, 2, away_results(2, &[(2, 0)]));
        let m = scored_match("1", 1, 0, MatchStatus::SecondHalf);
        let out = loser_outscored_recently(&m, &stats(&api)).await;
        assert!(out.passed, "{}", out.reason);
        assert_eq!(out.reason, "loser scored 2 vs 2");

        // no finished away games at all counts as zero goals
        let api = Arc::new(MockApi::new());
        form_route(&api, 1, home_form_payload(1, 39, &[1, 1, 0]));
        form_route(&api, 2, away_results(2, &[]));
        let out = loser_outscored_recently(&m, &stats(&api)).await;
        assert!(!out.passed);
        assert_eq!(out.reason, "الأهداف المسجلة للخاسر أقل");
    }

    #[tokio::test]
    async fn unavailable_stats_fail_closed() {
        let api = Arc::new(MockApi::new());
        let m = scored_match("1", 0, 1, MatchStatus::SecondHalf);
        let out = loser_outscored_recently(&m, &stats(&api)).await;
        assert!(!out.passed);
        assert!(out.reason.starts_with("cannot evaluate"));
    }
}
