use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, get_service, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    fmt,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::bracket::BracketTree;
use crate::config::append_commit_log;
use crate::error::EngineError;
use crate::mutator::{BracketDraft, ScoreDelta};
use crate::odds::{compute_odds, what_if_bracket, ParticipantOdds, TrialBudget};
use crate::participants::{ratings_for_participant, ratings_for_team, validate_rating};
use crate::scoring::{compute_scores, ParticipantScore};
use crate::store::DataStore;
use crate::types::*;

// ── State ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DataStore>,
    pub config: Arc<AppConfig>,
    pub session: SharedDraftSession,
}

impl AppState {
    pub fn new(store: DataStore, config: AppConfig) -> Self {
        AppState {
            store: Arc::new(store),
            config: Arc::new(config),
            session: Arc::new(Mutex::new(DraftSession::default())),
        }
    }
}

/// Lock the session, then call `f` with it and the store.
fn with_session<F, R>(state: &AppState, f: F) -> Result<R, ApiError>
where
    F: FnOnce(&mut DraftSession, &DataStore) -> Result<R, ApiError>,
{
    let mut guard = state.session.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard, &state.store)
}

/// Draft of the session, loaded from the committed bracket on first use.
fn draft_of<'a>(session: &'a mut DraftSession, store: &DataStore) -> Result<&'a mut BracketDraft, ApiError> {
    if session.draft.is_none() {
        let bracket = store.load_bracket().map_err(ApiError::Internal)?;
        session.draft = Some(BracketDraft::new(bracket));
    }
    session
        .draft
        .as_mut()
        .ok_or_else(|| ApiError::Internal("Draft failed to initialize.".to_string()))
}

/// Lock the session, then call `f` with the draft.
fn with_draft<F, R>(state: &AppState, f: F) -> Result<R, ApiError>
where
    F: FnOnce(&mut BracketDraft) -> Result<R, ApiError>,
{
    with_session(state, |session, store| f(draft_of(session, store)?))
}

/// Marks the committed pool as changed; cached what-if reports are dropped.
fn bump_generation(session: &mut DraftSession) {
    session.generation += 1;
    session.what_if.sync(session.generation);
}

// ── Errors ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidTrialCount(_) | EngineError::TrialCountAboveLimit { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg.clone(),
            ApiError::Internal(msg) => {
                error!("Request failed: {msg}");
                msg.clone()
            }
        };
        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

/// Budget from `?trials=`, capped at the authoritative budget; `fallback` when absent.
fn budget_or(
    config: &AppConfig,
    trials: Option<i64>,
    fallback: Result<TrialBudget, EngineError>,
) -> Result<TrialBudget, ApiError> {
    match trials {
        Some(trials) => Ok(TrialBudget::at_most(trials, config.authoritative_budget()?)?),
        None => Ok(fallback?),
    }
}

async fn run_blocking<F, R>(f: F) -> Result<R, ApiError>
where
    F: FnOnce() -> Result<R, ApiError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("worker failed: {e}")))?
}

// ── Request / response shapes ──────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct GamesQuery {
    pub status: Option<String>,
    pub id: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateParticipant {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingsQuery {
    pub team_id: Option<TeamId>,
    pub family_member_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingUpdate {
    pub family_member_id: Option<String>,
    pub team_id: Option<TeamId>,
    pub rating: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MatchupsQuery {
    pub round: Option<u32>,
    pub id: Option<MatchupId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsQuery {
    pub family_member_id: Option<String>,
    pub include_names: Option<bool>,
    pub trials: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfQuery {
    pub matchup_id: Option<MatchupId>,
    pub winner_id: Option<TeamId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrialsQuery {
    pub trials: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub matchup_id: MatchupId,
    pub side: Slot,
    pub direction: ScoreDelta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub changed: bool,
    pub dirty: bool,
    pub matchups: Vec<Matchup>,
}

impl DraftView {
    fn of(draft: &BracketDraft, changed: bool) -> Self {
        DraftView {
            changed,
            dirty: draft.is_dirty(),
            matchups: draft.working().matchups().to_vec(),
        }
    }
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

// ── Handlers: pool data ────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_teams(State(state): State<AppState>) -> Result<Json<Vec<Team>>, ApiError> {
    let mut teams = state.store.load_teams().map_err(ApiError::Internal)?;
    match state.store.load_bracket() {
        Ok(bracket) => {
            let eliminated = bracket.eliminated_teams();
            for team in &mut teams {
                team.is_eliminated = eliminated.contains(&team.id);
            }
        }
        Err(e) => warn!("Serving stored elimination flags: {e}"),
    }
    Ok(Json(teams))
}

async fn list_games(
    State(state): State<AppState>,
    Query(query): Query<GamesQuery>,
) -> Result<Response, ApiError> {
    let games = state.store.load_games().map_err(ApiError::Internal)?;
    if let Some(id) = query.id {
        let game = games
            .into_iter()
            .find(|g| g.id == id)
            .ok_or_else(|| ApiError::NotFound("Game not found".to_string()))?;
        return Ok(Json(game).into_response());
    }
    let filtered: Vec<Game> = match query.status.as_deref().and_then(GameStatus::from_filter) {
        Some(status) => games.into_iter().filter(|g| g.status == status).collect(),
        None => games,
    };
    Ok(Json(filtered).into_response())
}

async fn list_participants(State(state): State<AppState>) -> Result<Json<Vec<Participant>>, ApiError> {
    Ok(Json(state.store.load_participants().map_err(ApiError::Internal)?))
}

async fn create_participant(
    State(state): State<AppState>,
    Json(body): Json<CreateParticipant>,
) -> Result<(StatusCode, Json<Participant>), ApiError> {
    let name = body
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Name is required and must be a string".to_string()))?;
    with_session(&state, |session, store| {
        let participant = store.add_participant(&name).map_err(ApiError::Internal)?;
        bump_generation(session);
        Ok((StatusCode::CREATED, Json(participant)))
    })
}

async fn delete_participant(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Family member ID is required".to_string()))?;
    with_session(&state, |session, store| {
        store.remove_participant(&id).map_err(ApiError::Internal)?;
        bump_generation(session);
        Ok(success())
    })
}

async fn list_ratings(
    State(state): State<AppState>,
    Query(query): Query<RatingsQuery>,
) -> Result<Json<Vec<ConfidenceRating>>, ApiError> {
    let ratings = state.store.load_ratings().map_err(ApiError::Internal)?;
    let ratings = if let Some(team_id) = query.team_id {
        ratings_for_team(&ratings, team_id)
    } else if let Some(participant_id) = query.family_member_id {
        ratings_for_participant(&ratings, &participant_id)
    } else {
        ratings
    };
    Ok(Json(ratings))
}

async fn put_rating(
    State(state): State<AppState>,
    Json(body): Json<RatingUpdate>,
) -> Result<Json<Value>, ApiError> {
    let participant_id = body
        .family_member_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Family member ID is required and must be a string".to_string()))?;
    let team_id = body
        .team_id
        .filter(|id| *id != 0)
        .ok_or_else(|| ApiError::BadRequest("Team ID is required and must be a number".to_string()))?;
    let rating = body
        .rating
        .ok_or_else(|| ApiError::BadRequest("Rating is required".to_string()))
        .and_then(|raw| validate_rating(raw).map_err(ApiError::BadRequest))?;

    with_session(&state, |session, store| {
        store
            .upsert_rating(ConfidenceRating {
                participant_id,
                team_id,
                rating,
            })
            .map_err(ApiError::Internal)?;
        bump_generation(session);
        Ok(success())
    })
}

async fn delete_ratings(
    State(state): State<AppState>,
    Query(query): Query<RatingsQuery>,
) -> Result<Json<Value>, ApiError> {
    let participant_id = query
        .family_member_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Family member ID is required".to_string()))?;
    with_session(&state, |session, store| {
        store.remove_ratings_for(&participant_id).map_err(ApiError::Internal)?;
        bump_generation(session);
        Ok(success())
    })
}

// ── Handlers: bracket ──────────────────────────────────────────────────

async fn list_matchups(
    State(state): State<AppState>,
    Query(query): Query<MatchupsQuery>,
) -> Result<Response, ApiError> {
    let matchups = state.store.load_matchups().map_err(ApiError::Internal)?;
    if let Some(id) = query.id {
        let matchup = matchups
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| ApiError::NotFound("Matchup not found".to_string()))?;
        return Ok(Json(matchup).into_response());
    }
    let matchups: Vec<Matchup> = match query.round {
        Some(round) => matchups.into_iter().filter(|m| m.round == round).collect(),
        None => matchups,
    };
    Ok(Json(matchups).into_response())
}

/// Replaces the committed bracket; only the array shape is checked.
async fn put_matchups(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    if !body.is_array() {
        return Err(ApiError::BadRequest(
            "Invalid data format. Expected an array of matchups.".to_string(),
        ));
    }
    let matchups: Vec<Matchup> =
        serde_json::from_value(body).map_err(|e| ApiError::BadRequest(format!("Invalid matchup: {e}")))?;

    with_session(&state, |session, store| {
        store.save_matchups(&matchups).map_err(ApiError::Internal)?;
        session.draft = None;
        bump_generation(session);
        info!("Bracket replaced with {} matchups", matchups.len());
        Ok(success())
    })
}

async fn family_scores(State(state): State<AppState>) -> Result<Json<Vec<ParticipantScore>>, ApiError> {
    let bracket = state.store.load_bracket().map_err(ApiError::Internal)?;
    let (participants, table) = state.store.load_pool().map_err(ApiError::Internal)?;
    Ok(Json(compute_scores(&bracket, &participants, &table)))
}

async fn bracket_odds(
    State(state): State<AppState>,
    Query(query): Query<OddsQuery>,
) -> Result<Response, ApiError> {
    let budget = budget_or(&state.config, query.trials, state.config.authoritative_budget())?;
    let store = state.store.clone();
    let report = run_blocking(move || {
        let bracket = store.load_bracket().map_err(ApiError::Internal)?;
        let (participants, table) = store.load_pool().map_err(ApiError::Internal)?;
        Ok(compute_odds(&bracket, &participants, &table, budget)?)
    })
    .await?;

    if let Some(participant_id) = query.family_member_id {
        let row = report
            .for_participant(&participant_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Odds not found".to_string()))?;
        return Ok(Json(ParticipantOdds { name: None, ..row }).into_response());
    }
    let report = if query.include_names.unwrap_or(false) {
        report
    } else {
        report.without_names()
    };
    Ok(Json(report.odds).into_response())
}

async fn what_if_odds(
    State(state): State<AppState>,
    Query(query): Query<WhatIfQuery>,
) -> Result<Json<Vec<ParticipantOdds>>, ApiError> {
    let (Some(matchup_id), Some(winner_id)) = (query.matchup_id, query.winner_id) else {
        return Err(ApiError::BadRequest("matchupId and winnerId are required".to_string()));
    };

    let (generation, cached) = with_session(&state, |session, _| {
        let generation = session.generation;
        Ok((generation, session.what_if.lookup(generation, matchup_id, winner_id)))
    })?;
    if let Some(report) = cached {
        return Ok(Json(report.odds));
    }

    let budget = state.config.interactive_budget()?;
    let store = state.store.clone();
    let report = run_blocking(move || {
        let bracket = store.load_bracket().map_err(ApiError::Internal)?;
        let forced = what_if_bracket(&bracket, matchup_id, winner_id).ok_or_else(|| {
            ApiError::NotFound(format!("No matchup {matchup_id} with team {winner_id}"))
        })?;
        let (participants, table) = store.load_pool().map_err(ApiError::Internal)?;
        Ok(compute_odds(&forced, &participants, &table, budget)?)
    })
    .await?;

    with_session(&state, |session, _| {
        session.what_if.store(generation, matchup_id, winner_id, report.clone());
        Ok(())
    })?;
    Ok(Json(report.odds))
}

// ── Handlers: draft session ────────────────────────────────────────────

async fn get_draft(State(state): State<AppState>) -> Result<Json<DraftView>, ApiError> {
    with_draft(&state, |draft| Ok(Json(DraftView::of(draft, false))))
}

async fn post_draft_score(
    State(state): State<AppState>,
    Json(body): Json<ScoreRequest>,
) -> Result<Json<DraftView>, ApiError> {
    with_draft(&state, |draft| {
        let changed = draft.apply_score_delta(body.matchup_id, body.side, body.direction);
        Ok(Json(DraftView::of(draft, changed)))
    })
}

async fn post_draft_reset(State(state): State<AppState>) -> Result<Json<DraftView>, ApiError> {
    with_draft(&state, |draft| {
        let changed = draft.is_dirty();
        draft.reset();
        Ok(Json(DraftView::of(draft, changed)))
    })
}

async fn post_draft_commit(State(state): State<AppState>) -> Result<Json<DraftView>, ApiError> {
    let view = with_session(&state, |session, store| {
        let draft = draft_of(session, store)?;
        let changed = draft.is_dirty();
        draft.commit(store).map_err(ApiError::Internal)?;
        let view = DraftView::of(draft, changed);
        bump_generation(session);
        Ok(view)
    })?;

    let decided = view.matchups.iter().filter(|m| m.is_completed).count();
    info!("Draft committed ({decided}/{} series decided)", view.matchups.len());
    append_commit_log(
        &state.config.log_path(),
        "commit",
        &format!("{decided} of {} series decided", view.matchups.len()),
    );
    Ok(Json(view))
}

fn working_copy(state: &AppState) -> Result<BracketTree, ApiError> {
    with_draft(state, |draft| Ok(draft.working().clone()))
}

async fn draft_scores(State(state): State<AppState>) -> Result<Json<Vec<ParticipantScore>>, ApiError> {
    let bracket = working_copy(&state)?;
    let (participants, table) = state.store.load_pool().map_err(ApiError::Internal)?;
    Ok(Json(compute_scores(&bracket, &participants, &table)))
}

async fn draft_odds(
    State(state): State<AppState>,
    Query(query): Query<TrialsQuery>,
) -> Result<Json<Vec<ParticipantOdds>>, ApiError> {
    let budget = budget_or(&state.config, query.trials, state.config.interactive_budget())?;
    let bracket = working_copy(&state)?;
    let store = state.store.clone();
    let report = run_blocking(move || {
        let (participants, table) = store.load_pool().map_err(ApiError::Internal)?;
        Ok(compute_odds(&bracket, &participants, &table, budget)?)
    })
    .await?;
    Ok(Json(report.odds))
}

// ── Router ─────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    let static_files = get_service(ServeDir::new(state.config.static_path()));

    Router::new()
        .route("/health", get(health))
        .route("/api/teams", get(list_teams))
        .route("/api/games", get(list_games))
        .route(
            "/api/family-members",
            get(list_participants).post(create_participant).delete(delete_participant),
        )
        .route(
            "/api/confidence-ratings",
            get(list_ratings).put(put_rating).delete(delete_ratings),
        )
        .route("/api/bracket-matchups", get(list_matchups).put(put_matchups))
        .route("/api/family-scores", get(family_scores))
        .route("/api/bracket-odds", get(bracket_odds))
        .route("/api/bracket-odds/what-if", get(what_if_odds))
        .route("/api/draft", get(get_draft))
        .route("/api/draft/score", post(post_draft_score))
        .route("/api/draft/reset", post(post_draft_reset))
        .route("/api/draft/commit", post(post_draft_commit))
        .route("/api/draft/scores", get(draft_scores))
        .route("/api/draft/odds", get(draft_odds))
        .fallback_service(static_files)
        .with_state(state)
}

pub async fn serve(state: AppState) {
    let addr = state.config.bind_addr.clone();
    let app = router(state);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Pool server failed to bind {addr}: {e}");
            return;
        }
    };
    info!("Pool server listening at http://{addr}/");
    if let Err(e) = axum::serve(listener, app).await {
        error!("Pool server error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::eight_team_matchups;
    use std::fs;

    fn make_test_state(name: &str) -> AppState {
        let dir = std::env::temp_dir().join(format!("pool-server-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let store = DataStore::new(&dir);
        store.save_matchups(&eight_team_matchups()).unwrap();
        let teams: Vec<Team> = (1..=8)
            .map(|id| Team {
                id,
                name: format!("Team {id}"),
                conference: if id <= 4 { "East" } else { "West" }.to_string(),
                division: "Central".to_string(),
                seed: id,
                is_eliminated: false,
            })
            .collect();
        fs::write(dir.join("teams.json"), serde_json::to_string(&teams).unwrap()).unwrap();

        let config = AppConfig {
            data_dir: dir.to_string_lossy().into_owned(),
            static_dir: dir.join("public").to_string_lossy().into_owned(),
            log_dir: dir.join("logs").to_string_lossy().into_owned(),
            bind_addr: "127.0.0.1:0".to_string(),
            authoritative_trials: 200,
            interactive_trials: 100,
        };
        AppState::new(store, config)
    }

    fn cleanup(state: &AppState) {
        let _ = fs::remove_dir_all(state.store.dir());
    }

    fn generation(state: &AppState) -> u64 {
        state.session.lock().unwrap().generation
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_participant_lifecycle() {
        let state = make_test_state("participants");
        let err = create_participant(State(state.clone()), Json(CreateParticipant { name: None }))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let (status, Json(ann)) =
            create_participant(State(state.clone()), Json(CreateParticipant { name: Some("Ann".into()) }))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(ann.id, "1");

        let Json(ratings) = list_ratings(
            State(state.clone()),
            Query(RatingsQuery {
                family_member_id: Some("1".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(ratings.len(), 8);

        delete_participant(State(state.clone()), Query(IdQuery { id: Some("1".into()) }))
            .await
            .unwrap();
        let Json(ratings) = list_ratings(State(state.clone()), Query(RatingsQuery::default()))
            .await
            .unwrap();
        assert!(ratings.is_empty());
        assert_eq!(generation(&state), 2);
        cleanup(&state);
    }

    #[tokio::test]
    async fn test_rating_validation() {
        let state = make_test_state("ratings");
        let update = |rating| RatingUpdate {
            family_member_id: Some("1".into()),
            team_id: Some(3),
            rating,
        };
        for bad in [Some(0), Some(11), None] {
            let err = put_rating(State(state.clone()), Json(update(bad))).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
        put_rating(State(state.clone()), Json(update(Some(7)))).await.unwrap();
        let Json(ratings) = list_ratings(
            State(state.clone()),
            Query(RatingsQuery {
                team_id: Some(3),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].rating, 7);
        cleanup(&state);
    }

    #[tokio::test]
    async fn test_matchup_lookup_and_replace() {
        let state = make_test_state("matchups");
        let err = list_matchups(
            State(state.clone()),
            Query(MatchupsQuery {
                id: Some(99),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = put_matchups(State(state.clone()), Json(json!({ "id": 1 })))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let mut matchups = eight_team_matchups();
        matchups[0].score1 = 2;
        put_matchups(State(state.clone()), Json(serde_json::to_value(&matchups).unwrap()))
            .await
            .unwrap();
        assert_eq!(state.store.load_matchups().unwrap()[0].score1, 2);
        assert_eq!(generation(&state), 1);
        cleanup(&state);
    }

    #[tokio::test]
    async fn test_draft_edit_reset_commit() {
        let state = make_test_state("draft");
        let score = |side, direction| ScoreRequest {
            matchup_id: 1,
            side,
            direction,
        };

        for _ in 0..4 {
            post_draft_score(State(state.clone()), Json(score(Slot::Team1, ScoreDelta::Increment)))
                .await
                .unwrap();
        }
        let Json(view) = get_draft(State(state.clone())).await.unwrap();
        assert!(view.dirty);
        assert_eq!(view.matchups[4].team1_id, Some(1));

        let Json(view) = post_draft_reset(State(state.clone())).await.unwrap();
        assert!(view.changed);
        assert!(!view.dirty);

        let Json(view) = post_draft_score(
            State(state.clone()),
            Json(ScoreRequest {
                matchup_id: 42,
                side: Slot::Team2,
                direction: ScoreDelta::Increment,
            }),
        )
        .await
        .unwrap();
        assert!(!view.changed);

        post_draft_score(State(state.clone()), Json(score(Slot::Team2, ScoreDelta::Increment)))
            .await
            .unwrap();
        post_draft_commit(State(state.clone())).await.unwrap();
        assert_eq!(state.store.load_matchups().unwrap()[0].score2, 1);
        assert_eq!(generation(&state), 1);
        assert!(state.config.log_path().join("commits.log").is_file());
        cleanup(&state);
    }

    #[tokio::test]
    async fn test_odds_endpoints() {
        let state = make_test_state("odds");
        create_participant(State(state.clone()), Json(CreateParticipant { name: Some("Ann".into()) }))
            .await
            .unwrap();

        let err = bracket_odds(
            State(state.clone()),
            Query(OddsQuery {
                trials: Some(0),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = bracket_odds(
            State(state.clone()),
            Query(OddsQuery {
                trials: Some(i64::MAX),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err = draft_odds(State(state.clone()), Query(TrialsQuery { trials: Some(201) }))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = bracket_odds(
            State(state.clone()),
            Query(OddsQuery {
                family_member_id: Some("9".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let Json(draft) = draft_odds(State(state.clone()), Query(TrialsQuery { trials: Some(20) }))
            .await
            .unwrap();
        assert_eq!(draft.len(), 1);
        assert_eq!(draft[0].odds, 100.0);
        cleanup(&state);
    }

    #[tokio::test]
    async fn test_what_if_is_memoized() {
        let state = make_test_state("what-if");
        let err = what_if_odds(State(state.clone()), Query(WhatIfQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = what_if_odds(
            State(state.clone()),
            Query(WhatIfQuery {
                matchup_id: Some(1),
                winner_id: Some(4),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let query = || WhatIfQuery {
            matchup_id: Some(1),
            winner_id: Some(8),
        };
        let Json(first) = what_if_odds(State(state.clone()), Query(query())).await.unwrap();
        let Json(second) = what_if_odds(State(state.clone()), Query(query())).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(state.session.lock().unwrap().what_if.len(), 1);
        cleanup(&state);
    }

    #[tokio::test]
    async fn test_teams_reflect_committed_eliminations() {
        let state = make_test_state("teams");
        let mut matchups = eight_team_matchups();
        crate::fixtures::finish(&mut matchups[0], 4, 2);
        matchups[4].team1_id = Some(1);
        state.store.save_matchups(&matchups).unwrap();

        let Json(teams) = list_teams(State(state.clone())).await.unwrap();
        let eliminated: Vec<TeamId> = teams.iter().filter(|t| t.is_eliminated).map(|t| t.id).collect();
        assert_eq!(eliminated, vec![8]);

        let Json(scores) = family_scores(State(state.clone())).await.unwrap();
        assert!(scores.is_empty());
        cleanup(&state);
    }
}
