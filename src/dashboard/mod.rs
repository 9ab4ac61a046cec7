use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::api::FootballApi;
use crate::db::models::{FilterState, League, Match};
use crate::db::{Database, LeagueList, MatchList};
use crate::filters::{FilterEngine, FilterKind, FilterOutcome, FilterReport, FilterRunner, PassHandle};
use crate::fixtures::{fetch_leagues, order_by_minute, search_leagues, MatchBook};

/// State shared by the HTTP handlers and the event loop.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub api: Arc<dyn FootballApi>,
    pub engine: FilterEngine,
    pub runner: FilterRunner,
    pub book: Arc<RwLock<MatchBook>>,
    /// Latest report of the current filter generation
    pub report: Arc<RwLock<Option<FilterReport>>>,
    /// League catalogue, fetched on first search
    pub leagues: Arc<RwLock<Vec<League>>>,
    pub last_poll: Arc<RwLock<Option<DateTime<Utc>>>>,
    pub request_quota: u64,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Submit a pass of the active live filter over the held list.
    /// `Ok(None)` when no filter is active or a pass is already running.
    pub async fn submit_live_pass(&self) -> anyhow::Result<Option<PassHandle>> {
        let kind = self.runner.kind();
        if kind == FilterKind::None {
            return Ok(None);
        }
        let candidates = {
            let book = self.book.read().await;
            if book.is_empty() {
                debug!("No held matches, filter pass skipped");
                return Ok(None);
            }
            self.engine.live_candidates(book.matches())?
        };
        Ok(self.runner.try_submit(kind, candidates))
    }

    /// Keep `report` if it belongs to the current filter generation.
    pub async fn apply_report(&self, report: FilterReport) -> bool {
        if !self.runner.is_current(&report) {
            debug!(
                "Discarding stale filter report (generation {}, current {})",
                report.generation,
                self.runner.generation()
            );
            return false;
        }
        *self.report.write().await = Some(report);
        true
    }
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn not_found(what: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

/// Build the Axum router for the JSON API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/live", get(live_handler))
        .route("/api/today", get(today_handler))
        .route(
            "/api/favorites",
            get(list_favorites_handler)
                .put(replace_favorites_handler)
                .post(add_favorite_handler),
        )
        .route("/api/favorites/:id", delete(remove_favorite_handler))
        .route(
            "/api/hidden",
            get(list_hidden_handler)
                .put(replace_hidden_handler)
                .post(hide_handler)
                .delete(clear_hidden_handler),
        )
        .route("/api/hidden/:id", delete(unhide_handler))
        .route("/api/leagues", get(search_leagues_handler))
        .route(
            "/api/leagues/selected",
            get(list_selected_handler)
                .put(replace_selected_handler)
                .post(add_selected_handler),
        )
        .route("/api/leagues/selected/:id", delete(remove_selected_handler))
        .route(
            "/api/leagues/favorites",
            get(list_favorite_leagues_handler).post(add_favorite_league_handler),
        )
        .route(
            "/api/leagues/favorites/:id",
            delete(remove_favorite_league_handler),
        )
        .route("/api/filter", get(get_filter_handler).put(set_filter_handler))
        .route("/api/calendar/:date", get(calendar_handler))
        .route("/api/calendar/filter", put(calendar_filter_handler))
        .route("/api/matches/:id/insight", get(insight_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

// ── Status and match views ───────────────────────────────────────────────────

#[derive(Serialize)]
struct StatusView {
    started_at: DateTime<Utc>,
    last_poll: Option<DateTime<Utc>>,
    provider: String,
    api_requests: u64,
    request_quota: u64,
    held_matches: usize,
    cached_stats: usize,
    live_filter: FilterKind,
    filter_generation: u64,
    filter_running: bool,
}

/// GET /api/status
async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let held_matches = state.book.read().await.len();
    Json(StatusView {
        started_at: state.started_at,
        last_poll: *state.last_poll.read().await,
        provider: state.api.name().to_string(),
        api_requests: state.api.requests_made(),
        request_quota: state.request_quota,
        held_matches,
        cached_stats: state.engine.stats().len().await,
        live_filter: state.runner.kind(),
        filter_generation: state.runner.generation(),
        filter_running: state.runner.is_running(),
    })
}

#[derive(Serialize)]
struct LiveView {
    filter: FilterKind,
    filtering: bool,
    matches: Vec<Match>,
    results: HashMap<String, FilterOutcome>,
}

/// GET /api/live
///
/// Visible live matches ordered by minute. With a live filter active only
/// matches that passed the latest current-generation pass are listed.
async fn live_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let visible = state.book.read().await.visible(&state.db).map_err(internal)?;
    let filter = state.runner.kind();
    let filtering = state.runner.is_running();

    if filter == FilterKind::None {
        return Ok(Json(LiveView {
            filter,
            filtering,
            matches: order_by_minute(&visible),
            results: HashMap::new(),
        }));
    }

    let report = state.report.read().await;
    let (matches, results) = match report.as_ref() {
        Some(r) if r.kind == filter => {
            let passed: Vec<Match> = visible
                .into_iter()
                .filter(|m| r.results.get(&m.id).map(|o| o.passed).unwrap_or(false))
                .collect();
            (order_by_minute(&passed), r.results.clone())
        }
        _ => (Vec::new(), HashMap::new()),
    };
    Ok(Json(LiveView {
        filter,
        filtering,
        matches,
        results,
    }))
}

/// GET /api/today
async fn today_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.book.read().await.today(Utc::now()))
}

// ── Favorite and hidden matches ──────────────────────────────────────────────

/// GET /api/favorites
async fn list_favorites_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    state
        .db
        .list_matches(MatchList::Favorite)
        .map(Json)
        .map_err(internal)
}

/// PUT /api/favorites (full replace)
async fn replace_favorites_handler(
    State(state): State<Arc<AppState>>,
    Json(matches): Json<Vec<Match>>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .save_matches(MatchList::Favorite, &matches)
        .map_err(internal)?;
    info!("Favorite matches saved: {}", matches.len());
    Ok(Json(matches))
}

/// POST /api/favorites
async fn add_favorite_handler(
    State(state): State<Arc<AppState>>,
    Json(m): Json<Match>,
) -> ApiResult<impl IntoResponse> {
    if state
        .db
        .contains_match(MatchList::Favorite, &m.id)
        .map_err(internal)?
    {
        return Ok(StatusCode::OK);
    }
    state
        .db
        .add_match(MatchList::Favorite, &m)
        .map_err(internal)?;
    info!("Favorited match {} ({} vs {})", m.id, m.home_team, m.away_team);
    Ok(StatusCode::CREATED)
}

/// DELETE /api/favorites/:id
async fn remove_favorite_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    match state.db.remove_match(MatchList::Favorite, &id) {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(not_found("favorite match")),
        Err(e) => Err(internal(e)),
    }
}

/// GET /api/hidden
async fn list_hidden_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    state
        .db
        .list_matches(MatchList::Hidden)
        .map(Json)
        .map_err(internal)
}

/// PUT /api/hidden (full replace)
async fn replace_hidden_handler(
    State(state): State<Arc<AppState>>,
    Json(matches): Json<Vec<Match>>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .save_matches(MatchList::Hidden, &matches)
        .map_err(internal)?;
    let mut book = state.book.write().await;
    for m in &matches {
        book.remove(&m.id);
    }
    info!("Hidden matches saved: {}", matches.len());
    Ok(Json(matches))
}

/// POST /api/hidden
async fn hide_handler(
    State(state): State<Arc<AppState>>,
    Json(m): Json<Match>,
) -> ApiResult<impl IntoResponse> {
    state.db.add_match(MatchList::Hidden, &m).map_err(internal)?;
    state.book.write().await.remove(&m.id);
    info!("Hid match {}", m.id);
    Ok(StatusCode::CREATED)
}

/// DELETE /api/hidden/:id
async fn unhide_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    match state.db.remove_match(MatchList::Hidden, &id) {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(not_found("hidden match")),
        Err(e) => Err(internal(e)),
    }
}

/// DELETE /api/hidden
async fn clear_hidden_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    state
        .db
        .clear_matches(MatchList::Hidden)
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Leagues ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

/// GET /api/leagues?q=
async fn search_leagues_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    {
        let cached = state.leagues.read().await;
        if !cached.is_empty() {
            return Json(search_leagues(&cached, &query.q));
        }
    }
    let fetched = fetch_leagues(state.api.as_ref()).await;
    let found = search_leagues(&fetched, &query.q);
    if !fetched.is_empty() {
        info!("League catalogue loaded: {} leagues", fetched.len());
        *state.leagues.write().await = fetched;
    }
    Json(found)
}

fn list_leagues(state: &AppState, list: LeagueList) -> ApiResult<Json<Vec<League>>> {
    state.db.list_leagues(list).map(Json).map_err(internal)
}

fn remove_league(state: &AppState, list: LeagueList, id: u32) -> ApiResult<StatusCode> {
    match state.db.remove_league(list, id) {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(not_found("league")),
        Err(e) => Err(internal(e)),
    }
}

/// GET /api/leagues/selected
async fn list_selected_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    list_leagues(&state, LeagueList::Selected)
}

/// PUT /api/leagues/selected (full replace)
async fn replace_selected_handler(
    State(state): State<Arc<AppState>>,
    Json(leagues): Json<Vec<League>>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .save_leagues(LeagueList::Selected, &leagues)
        .map_err(internal)?;
    info!("Selected leagues saved: {}", leagues.len());
    Ok(Json(leagues))
}

/// POST /api/leagues/selected
async fn add_selected_handler(
    State(state): State<Arc<AppState>>,
    Json(league): Json<League>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .add_league(LeagueList::Selected, &league)
        .map_err(internal)?;
    Ok(StatusCode::CREATED)
}

/// DELETE /api/leagues/selected/:id
async fn remove_selected_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> ApiResult<impl IntoResponse> {
    remove_league(&state, LeagueList::Selected, id)
}

/// GET /api/leagues/favorites
async fn list_favorite_leagues_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    list_leagues(&state, LeagueList::Favorite)
}

/// POST /api/leagues/favorites
async fn add_favorite_league_handler(
    State(state): State<Arc<AppState>>,
    Json(league): Json<League>,
) -> ApiResult<impl IntoResponse> {
    if state
        .db
        .contains_league(LeagueList::Favorite, league.id)
        .map_err(internal)?
    {
        return Ok(StatusCode::OK);
    }
    state
        .db
        .add_league(LeagueList::Favorite, &league)
        .map_err(internal)?;
    info!("Favorite league added: {}", league.display_name());
    Ok(StatusCode::CREATED)
}

/// DELETE /api/leagues/favorites/:id
async fn remove_favorite_league_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> ApiResult<impl IntoResponse> {
    remove_league(&state, LeagueList::Favorite, id)
}

// ── Filters ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct FilterView {
    #[serde(flatten)]
    state: FilterState,
    generation: u64,
    running: bool,
}

fn filter_view(state: &AppState, filter: FilterState) -> FilterView {
    FilterView {
        state: filter,
        generation: state.runner.generation(),
        running: state.runner.is_running(),
    }
}

/// GET /api/filter
async fn get_filter_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let filter = state.db.load_filter_state().map_err(internal)?;
    Ok(Json(filter_view(&state, filter)))
}

#[derive(Deserialize)]
struct SetFilter {
    kind: FilterKind,
}

/// PUT /api/filter
///
/// Switches the live filter, drops the previous report and starts a pass
/// right away when a filter is active.
async fn set_filter_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetFilter>,
) -> ApiResult<impl IntoResponse> {
    let mut filter = state.db.load_filter_state().map_err(internal)?;
    filter.live_filter = body.kind;
    state.db.save_filter_state(&filter).map_err(internal)?;

    state.runner.set_kind(body.kind);
    *state.report.write().await = None;
    state.submit_live_pass().await.map_err(internal)?;
    Ok(Json(filter_view(&state, filter)))
}

#[derive(Deserialize)]
struct CalendarFilter {
    active: bool,
    #[serde(default)]
    kind: Option<FilterKind>,
}

/// PUT /api/calendar/filter
async fn calendar_filter_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CalendarFilter>,
) -> ApiResult<impl IntoResponse> {
    let mut filter = state.db.load_filter_state().map_err(internal)?;
    filter.calendar_filter_active = body.active;
    if let Some(kind) = body.kind {
        filter.calendar_filter = kind;
    }
    state.db.save_filter_state(&filter).map_err(internal)?;
    info!(
        "Calendar filter {} ({})",
        if filter.calendar_filter_active { "on" } else { "off" },
        filter.calendar_filter
    );
    Ok(Json(filter_view(&state, filter)))
}

/// GET /api/calendar/:date (YYYY-MM-DD)
async fn calendar_handler(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid date: {e}")))?;
    let filter = state.db.load_filter_state().map_err(internal)?;
    state
        .engine
        .calendar(date, &filter)
        .await
        .map(Json)
        .map_err(internal)
}

/// GET /api/matches/:id/insight
async fn insight_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let held = state.book.read().await.get(&id).cloned();
    let m = match held {
        Some(m) => m,
        None => {
            let mut stored = state.db.list_matches(MatchList::Favorite).map_err(internal)?;
            stored.extend(state.db.list_matches(MatchList::Hidden).map_err(internal)?);
            stored
                .into_iter()
                .find(|m| m.id == id)
                .ok_or_else(|| not_found("match"))?
        }
    };
    Ok(Json(state.engine.insight(&m).await))
}
