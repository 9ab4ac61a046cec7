use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::api::{FootballApi, Params};
use crate::db::models::{Match, MatchStatus};

/// Answers from a route table keyed by endpoint plus sorted params and
/// counts every call.
#[derive(Default)]
pub struct MockApi {
    routes: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<String>>,
    total: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, endpoint: &str, params: &[(&str, &str)], body: Value) {
        let key = route_key(endpoint, params.iter().map(|(k, v)| (*k, *v)));
        self.routes.lock().unwrap().insert(key, body);
    }

    pub fn calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.split('?').next() == Some(endpoint))
            .count()
    }
}

fn route_key<'a>(endpoint: &str, params: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut pairs: Vec<String> = params.map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    format!("{}?{}", endpoint, pairs.join("&"))
}

#[async_trait]
impl FootballApi for MockApi {
    async fn fetch(&self, endpoint: &str, params: &Params) -> Option<Value> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let key = route_key(endpoint, params.iter().map(|(k, v)| (*k, v.as_str())));
        self.calls.lock().unwrap().push(key.clone());
        self.routes.lock().unwrap().get(&key).cloned()
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn requests_made(&self) -> u64 {
        self.calls() as u64
    }
}

/// A raw API-Football fixture object.
#[allow(clippy::too_many_arguments)]
pub fn fixture_json(
    id: u64,
    league_id: u32,
    home_id: u32,
    away_id: u32,
    home_goals: Option<i32>,
    away_goals: Option<i32>,
    status: &str,
    date: &str,
) -> Value {
    json!({
        "fixture": {
            "id": id,
            "date": date,
            "referee": null,
            "venue": {"name": "Stadium"},
            "status": {"short": status, "elapsed": null}
        },
        "league": {"id": league_id, "name": "Test League", "season": 2024},
        "teams": {
            "home": {"id": home_id, "name": format!("Team {home_id}")},
            "away": {"id": away_id, "name": format!("Team {away_id}")}
        },
        "goals": {"home": home_goals, "away": away_goals}
    })
}

/// Finished home fixtures of `team_id` with the given goals-for values,
/// most recent first.
pub fn home_form_payload(team_id: u32, league_id: u32, goals: &[i32]) -> Value {
    let fixtures: Vec<Value> = goals
        .iter()
        .enumerate()
        .map(|(i, g)| {
            fixture_json(
                9000 + i as u64,
                league_id,
                team_id,
                500 + i as u32,
                Some(*g),
                Some(0),
                "FT",
                &format!("2024-05-{:02}T15:00:00+00:00", 28 - i),
            )
        })
        .collect();
    json!({"errors": [], "response": fixtures})
}

/// Finished away fixtures of `team_id` with the given goals-for values,
/// most recent first.
pub fn away_form_payload(team_id: u32, league_id: u32, goals: &[i32]) -> Value {
    let fixtures: Vec<Value> = goals
        .iter()
        .enumerate()
        .map(|(i, g)| {
            fixture_json(
                8000 + i as u64,
                league_id,
                600 + i as u32,
                team_id,
                Some(0),
                Some(*g),
                "FT",
                &format!("2024-05-{:02}T15:00:00+00:00", 28 - i),
            )
        })
        .collect();
    json!({"errors": [], "response": fixtures})
}

/// A standings payload with one group of `(team_id, rank)` rows.
pub fn standings_payload(league_id: u32, league_name: &str, rows: &[(u32, u32)]) -> Value {
    let table: Vec<Value> = rows
        .iter()
        .map(|(team, rank)| {
            json!({
                "rank": rank,
                "team": {"id": team, "name": format!("Team {team}")},
                "points": 40,
                "all": {"played": 20, "win": 12, "draw": 4, "lose": 4}
            })
        })
        .collect();
    json!({
        "errors": [],
        "response": [{
            "league": {"id": league_id, "name": league_name, "standings": [table]}
        }]
    })
}

/// A canonical match with both teams and no score.
pub fn sample_match(id: &str) -> Match {
    Match {
        id: id.to_string(),
        league_id: 39,
        league_name: "Premier League".into(),
        season: 2024,
        home_team_id: 1,
        home_team: "Arsenal".into(),
        away_team_id: 2,
        away_team: "Chelsea".into(),
        home_score: None,
        away_score: None,
        status: MatchStatus::NotStarted,
        elapsed: None,
        kickoff: None,
        venue: None,
        referee: None,
        events: vec![],
    }
}

/// `sample_match` with a score and status.
pub fn scored_match(id: &str, home: i32, away: i32, status: MatchStatus) -> Match {
    Match {
        home_score: Some(home),
        away_score: Some(away),
        status,
        ..sample_match(id)
    }
}
