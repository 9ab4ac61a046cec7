use serde_json::Value;
use tracing::warn;

use crate::api::{response_items, FootballApi};
use crate::db::models::League;

/// Competitions the search never offers.
const EXCLUDED_MARKERS: [&str; 5] = ["women", "feminine", "u19", "u20", "u17"];

/// All leagues with a current season.
pub async fn fetch_leagues(api: &dyn FootballApi) -> Vec<League> {
    match api.fetch("leagues", &[("current", "true".to_string())]).await {
        Some(payload) => response_items(&payload).iter().filter_map(parse_league).collect(),
        None => {
            warn!("League list unavailable from {}", api.name());
            Vec::new()
        }
    }
}

pub fn parse_league(item: &Value) -> Option<League> {
    let league = item.get("league")?;
    let country = item.get("country");
    let text = |v: Option<&Value>, key: &str| {
        v.and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    Some(League {
        id: league.get("id")?.as_u64()? as u32,
        name: text(Some(league), "name")?,
        kind: text(Some(league), "type"),
        logo: text(Some(league), "logo"),
        country_name: text(country, "name"),
        country_code: text(country, "code"),
        flag: text(country, "flag"),
        season: item
            .get("seasons")
            .and_then(Value::as_array)
            .and_then(|s| s.first())
            .and_then(|s| s.get("year"))
            .and_then(Value::as_i64)
            .map(|y| y as i32),
    })
}

/// Case-insensitive match on league or country name, minus women's and
/// youth competitions. An empty keyword keeps everything else.
pub fn search_leagues(leagues: &[League], keyword: &str) -> Vec<League> {
    let keyword = keyword.trim().to_lowercase();
    leagues
        .iter()
        .filter(|l| {
            let name = l.name.to_lowercase();
            if EXCLUDED_MARKERS.iter().any(|x| name.contains(x)) {
                return false;
            }
            if keyword.is_empty() {
                return true;
            }
            let country = l.country_name.as_deref().unwrap_or_default().to_lowercase();
            name.contains(&keyword) || country.contains(&keyword)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockApi;
    use serde_json::json;

    fn league(id: u32, name: &str, country: &str) -> League {
        League {
            id,
            name: name.to_string(),
            kind: Some("League".to_string()),
            logo: None,
            country_name: Some(country.to_string()),
            country_code: None,
            flag: None,
            season: Some(2024),
        }
    }

    #[tokio::test]
    async fn fetches_and_parses_current_leagues() {
        let api = MockApi::new();
        api.route(
            "leagues",
            &[("current", "true")],
            json!({"errors": [], "response": [
                {
                    "league": {"id": 39, "name": "Premier League", "type": "League", "logo": "pl.png"},
                    "country": {"name": "England", "code": "GB", "flag": "gb.svg"},
                    "seasons": [{"year": 2024, "current": true}]
                },
                {"league": {"name": "No id"}}
            ]}),
        );
        let leagues = fetch_leagues(&api).await;
        assert_eq!(leagues.len(), 1);
        assert_eq!(leagues[0].display_name(), "Premier League (England)");
        assert_eq!(leagues[0].season, Some(2024));
        assert_eq!(leagues[0].kind.as_deref(), Some("League"));
    }

    #[tokio::test]
    async fn unavailable_api_yields_empty_list() {
        let api = MockApi::new();
        assert!(fetch_leagues(&api).await.is_empty());
    }

    #[test]
    fn search_matches_name_or_country_and_skips_youth() {
        let all = vec![
            league(39, "Premier League", "England"),
            league(44, "FA WSL Women", "England"),
            league(140, "La Liga", "Spain"),
            league(700, "Premier League U20", "England"),
            league(61, "Ligue 1", "France"),
        ];
        let ids = |v: Vec<League>| v.into_iter().map(|l| l.id).collect::<Vec<_>>();
        assert_eq!(ids(search_leagues(&all, "england")), vec![39]);
        assert_eq!(ids(search_leagues(&all, "LIGA")), vec![140]);
        assert_eq!(ids(search_leagues(&all, "")), vec![39, 140, 61]);
    }
}
