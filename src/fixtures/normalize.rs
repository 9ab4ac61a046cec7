use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::Value;
use tracing::warn;

use crate::db::models::{Match, MatchStatus};

/// Normalize a batch. Malformed entries are skipped and logged; the rest of
/// the batch still comes through.
pub fn normalize_fixtures(items: &[Value]) -> Vec<Match> {
    items
        .iter()
        .filter_map(|item| {
            let m = parse_fixture(item);
            if m.is_none() {
                let id = item
                    .get("fixture")
                    .and_then(|f| f.get("id"))
                    .map(Value::to_string)
                    .unwrap_or_else(|| "?".to_string());
                warn!("Skipping malformed fixture {}", id);
            }
            m
        })
        .collect()
}

/// One raw fixture object; `None` when the identifying fields are missing.
pub fn parse_fixture(item: &Value) -> Option<Match> {
    let fixture = item.get("fixture")?;
    let id = id_string(fixture.get("id")?)?;

    let league = item.get("league");
    let league_id = league
        .and_then(|l| l.get("id"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let league_name = league
        .and_then(|l| l.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown League")
        .to_string();

    let kickoff = fixture
        .get("date")
        .and_then(Value::as_str)
        .and_then(parse_kickoff);

    let season = league
        .and_then(|l| l.get("season"))
        .and_then(Value::as_i64)
        .map(|s| s as i32)
        .or_else(|| {
            league
                .and_then(|l| l.get("seasons"))
                .and_then(Value::as_array)
                .and_then(|s| s.first())
                .and_then(|s| s.get("year"))
                .and_then(Value::as_i64)
                .map(|y| y as i32)
        })
        .unwrap_or_else(|| kickoff.unwrap_or_else(Utc::now).year());

    let teams = item.get("teams")?;
    let home = teams.get("home")?;
    let away = teams.get("away")?;
    let home_team_id = home.get("id")?.as_u64()? as u32;
    let away_team_id = away.get("id")?.as_u64()? as u32;
    let home_team = home
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("Home Team")
        .to_string();
    let away_team = away
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("Away Team")
        .to_string();

    let goals = item.get("goals");
    let home_score = goals.and_then(|g| score(g.get("home")));
    let away_score = goals.and_then(|g| score(g.get("away")));

    let status_obj = fixture.get("status");
    let status = status_obj
        .and_then(|s| s.get("short"))
        .and_then(Value::as_str)
        .map(MatchStatus::from_short)
        .unwrap_or(MatchStatus::NotStarted);
    let elapsed = status_obj
        .and_then(|s| s.get("elapsed"))
        .and_then(Value::as_i64)
        .map(|e| e as i32);

    let venue = fixture
        .get("venue")
        .and_then(|v| v.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let referee = fixture
        .get("referee")
        .and_then(Value::as_str)
        .map(str::to_string);
    let events = item
        .get("events")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Some(Match {
        id,
        league_id,
        league_name,
        season,
        home_team_id,
        home_team,
        away_team_id,
        away_team,
        home_score,
        away_score,
        status,
        elapsed,
        kickoff,
        venue,
        referee,
        events,
    })
}

fn id_string(v: &Value) -> Option<String> {
    v.as_u64()
        .map(|n| n.to_string())
        .or_else(|| v.as_str().filter(|s| !s.is_empty()).map(str::to_string))
}

fn score(v: Option<&Value>) -> Option<i32> {
    let v = v?;
    v.as_i64()
        .map(|n| n as i32)
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn parse_kickoff(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// True when the match kicks off on `day` (UTC).
pub fn is_on_day(m: &Match, day: NaiveDate) -> bool {
    m.kickoff.map(|k| k.date_naive() == day).unwrap_or(false)
}

/// Live matches grouped by minute bucket, latest stage first.
pub fn order_by_minute(matches: &[Match]) -> Vec<Match> {
    const ORDER: [&str; 11] = [
        "76+", "61-75", "46-60", "HT", "31-45", "16-30", "1-15", "ET", "PEN", "LIVE", "OTHER",
    ];
    let mut ordered: Vec<(usize, i32, Match)> = matches
        .iter()
        .map(|m| {
            let bucket = minute_bucket(m);
            let rank = ORDER.iter().position(|b| *b == bucket).unwrap_or(ORDER.len());
            (rank, m.elapsed.unwrap_or(0), m.clone())
        })
        .collect();
    // Stable sort keeps poll order for equal minutes.
    ordered.sort_by_key(|(rank, elapsed, _)| (*rank, *elapsed));
    ordered.into_iter().map(|(_, _, m)| m).collect()
}

fn minute_bucket(m: &Match) -> &'static str {
    match m.status {
        MatchStatus::FirstHalf | MatchStatus::SecondHalf | MatchStatus::Live => match m.elapsed {
            Some(e) if e <= 15 => "1-15",
            Some(e) if e <= 30 => "16-30",
            Some(e) if e <= 45 => "31-45",
            Some(e) if e <= 60 => "46-60",
            Some(e) if e <= 75 => "61-75",
            Some(_) => "76+",
            None => "LIVE",
        },
        MatchStatus::HalfTime => "HT",
        MatchStatus::ExtraTime => "ET",
        MatchStatus::Penalties => "PEN",
        _ => "OTHER",
    }
}
