use crate::collaborators::RatingEntry;
use crate::error::{EngineError, EngineResult};
use crate::service::TournamentService;
use crate::standings::GroupStanding;
use crate::types::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub type SharedService = Arc<TournamentService>;

/// Request failure rendered as `{ "error": kind, "message": text }`.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    /// The blocking task running the operation panicked or was cancelled.
    Task(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        ApiError::Task(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ApiError::Engine(err) => {
                let status = match err {
                    EngineError::Validation(_) => StatusCode::BAD_REQUEST,
                    EngineError::InvalidResult(_) => StatusCode::CONFLICT,
                    EngineError::InconsistentBracket(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    EngineError::Collaborator { .. } => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, err.kind(), err.to_string())
            }
            ApiError::Task(message) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", message.clone()),
        };
        if status.is_server_error() {
            error!("request failed: {message}");
        }
        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/tournaments", get(list_tournaments).post(create_tournament))
        .route("/tournaments/:id", get(get_tournament))
        .route("/tournaments/:id/bracket", post(generate_bracket))
        .route("/tournaments/:id/matches/:match_id/result", post(record_result))
        .route("/tournaments/:id/standings", get(get_standings))
        .route("/ratings", get(get_ratings))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

pub async fn serve(service: SharedService, addr: &str) -> Result<(), String> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bracket server failed to bind {addr}: {e}"))?;
    info!("bracket server listening at http://{addr}/");
    axum::serve(listener, router(service)).await.map_err(|e| {
        error!("bracket server error: {e}");
        format!("bracket server error: {e}")
    })
}

// ── Handlers ───────────────────────────────────────────────────────────

/// Runs a service call on the blocking pool. The service takes
/// per-tournament locks and the JSON store writes to disk on commit.
async fn blocking<T, F>(service: SharedService, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&TournamentService) -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || op(&service)).await?;
    Ok(outcome?)
}

async fn create_tournament(
    State(service): State<SharedService>,
    Json(request): Json<CreateTournamentRequest>,
) -> Result<(StatusCode, Json<Tournament>), ApiError> {
    let tournament = blocking(service, move |s| s.create_tournament(request)).await?;
    Ok((StatusCode::CREATED, Json(tournament)))
}

async fn list_tournaments(State(service): State<SharedService>) -> ApiResult<Vec<Tournament>> {
    Ok(Json(blocking(service, |s| s.list_tournaments()).await?))
}

async fn get_tournament(
    State(service): State<SharedService>,
    Path(id): Path<TournamentId>,
) -> ApiResult<TournamentView> {
    Ok(Json(blocking(service, move |s| s.tournament(id)).await?))
}

async fn generate_bracket(
    State(service): State<SharedService>,
    Path(id): Path<TournamentId>,
) -> ApiResult<TournamentView> {
    Ok(Json(blocking(service, move |s| s.generate_bracket(id)).await?))
}

async fn record_result(
    State(service): State<SharedService>,
    Path((id, match_id)): Path<(TournamentId, MatchId)>,
    Json(result): Json<MatchResult>,
) -> ApiResult<ResultView> {
    Ok(Json(blocking(service, move |s| s.record_result(id, match_id, result)).await?))
}

async fn get_standings(
    State(service): State<SharedService>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Vec<GroupStanding>> {
    Ok(Json(blocking(service, move |s| s.standings(id)).await?))
}

async fn get_ratings(State(service): State<SharedService>) -> ApiResult<Vec<RatingEntry>> {
    Ok(Json(blocking(service, |s| s.ratings()).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{EloLedger, InMemoryHistory, TracingNotifier};
    use crate::generator::Seeding;
    use crate::progression::ChangeSet;
    use crate::repository::{InMemoryRepository, Repository};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::{thread, time::Duration};
    use tower::ServiceExt;

    /// In-memory store whose commits park while `hold` is set.
    #[derive(Default)]
    struct GatedRepository {
        inner: InMemoryRepository,
        hold: AtomicBool,
        parked: AtomicBool,
    }

    impl Repository for GatedRepository {
        fn create_tournament(&self, name: &str, format: Format, participants: &[ParticipantId]) -> EngineResult<Tournament> {
            self.inner.create_tournament(name, format, participants)
        }
        fn fetch_tournament(&self, id: TournamentId) -> EngineResult<Option<Tournament>> {
            self.inner.fetch_tournament(id)
        }
        fn list_tournaments(&self) -> EngineResult<Vec<Tournament>> {
            self.inner.list_tournaments()
        }
        fn fetch_participants(&self, id: TournamentId) -> EngineResult<Vec<ParticipantId>> {
            self.inner.fetch_participants(id)
        }
        fn fetch_matches(&self, id: TournamentId) -> EngineResult<Vec<Match>> {
            self.inner.fetch_matches(id)
        }
        fn insert_matches(&self, id: TournamentId, matches: &[Match]) -> EngineResult<()> {
            self.inner.insert_matches(id, matches)
        }
        fn update_match(&self, id: TournamentId, m: &Match) -> EngineResult<()> {
            self.inner.update_match(id, m)
        }
        fn commit(&self, changes: &ChangeSet) -> EngineResult<()> {
            while self.hold.load(Ordering::SeqCst) {
                self.parked.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1));
            }
            self.inner.commit(changes)
        }
    }

    fn app() -> Router {
        let service = TournamentService::new(
            Arc::new(InMemoryRepository::new()),
            Arc::new(EloLedger::default()),
            Arc::new(InMemoryHistory::new()),
            Arc::new(TracingNotifier),
        )
        .with_seeding(Seeding::AsListed);
        router(Arc::new(service))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_knockout_over_http() {
        let app = app();
        let (status, created) = call(
            &app,
            "POST",
            "/tournaments",
            Some(json!({ "name": "Friday", "format": "single_elimination", "participants": [1, 2, 3, 4] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        let id = created["id"].as_u64().unwrap();

        let (status, view) = call(&app, "POST", &format!("/tournaments/{id}/bracket"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["matches"].as_array().unwrap().len(), 3);
        assert_eq!(view["matches"][0]["nextMatchId"], 3);

        let (status, result) = call(
            &app,
            "POST",
            &format!("/tournaments/{id}/matches/1/result"),
            Some(json!({ "score1": 11, "score2": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["recorded"]["winnerId"], 1);
        assert_eq!(result["recorded"]["status"], "completed");

        let (status, ratings) = call(&app, "GET", "/ratings", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ratings.as_array().unwrap().len(), 2);

        let (status, list) = call(&app, "GET", "/tournaments", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_errors_map_to_status_codes() {
        let app = app();
        let (status, body) = call(&app, "GET", "/tournaments/9", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");

        call(
            &app,
            "POST",
            "/tournaments",
            Some(json!({ "format": "single_elimination", "participants": [1, 2] })),
        )
        .await;
        call(&app, "POST", "/tournaments/1/bracket", None).await;

        let (status, body) = call(
            &app,
            "POST",
            "/tournaments/1/matches/1/result",
            Some(json!({ "score1": 2, "score2": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "invalid_result");

        let (status, body) = call(&app, "GET", "/tournaments/1/standings", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("elimination"));
    }

    #[tokio::test]
    async fn test_round_robin_standings_over_http() {
        let app = app();
        call(
            &app,
            "POST",
            "/tournaments",
            Some(json!({ "format": "round_robin", "participants": [5, 6, 7] })),
        )
        .await;
        call(&app, "POST", "/tournaments/1/bracket", None).await;
        call(
            &app,
            "POST",
            "/tournaments/1/matches/2/result",
            Some(json!({ "score1": 2, "score2": 1, "sets": [{ "player1": 11, "player2": 4 }, { "player1": 8, "player2": 11 }, { "player1": 11, "player2": 9 }] })),
        )
        .await;

        let (status, table) = call(&app, "GET", "/tournaments/1/standings", None).await;
        assert_eq!(status, StatusCode::OK);
        let top = &table[0]["rows"][0];
        assert_eq!(top["participantId"], 5);
        assert_eq!(top["smallPointsWon"], 30);
        assert_eq!(top["headToHead"]["7"], 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_parked_commit_leaves_runtime_free() {
        let repo = Arc::new(GatedRepository::default());
        let service = TournamentService::new(
            repo.clone(),
            Arc::new(EloLedger::default()),
            Arc::new(InMemoryHistory::new()),
            Arc::new(TracingNotifier),
        )
        .with_seeding(Seeding::AsListed);
        let app = router(Arc::new(service));
        call(
            &app,
            "POST",
            "/tournaments",
            Some(json!({ "format": "single_elimination", "participants": [1, 2] })),
        )
        .await;
        call(&app, "POST", "/tournaments/1/bracket", None).await;

        repo.hold.store(true, Ordering::SeqCst);
        let slow_app = app.clone();
        let slow = tokio::spawn(async move {
            call(
                &slow_app,
                "POST",
                "/tournaments/1/matches/1/result",
                Some(json!({ "score1": 3, "score2": 1 })),
            )
            .await
        });
        while !repo.parked.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        // the only runtime thread still answers while the commit is parked
        let (status, list) = call(&app, "GET", "/tournaments", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["status"], "active");

        repo.hold.store(false, Ordering::SeqCst);
        let (status, result) = slow.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["tournament"]["championId"], 1);
    }
}
