use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use gitplay_core::{
    Backend, CommitDetails, CommitId, CommitListing, Error, SizeSeries, DEFAULT_BATCH_SIZE,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/repository/open", post(open_repository))
        .route("/repository/prepare-cache", post(prepare_cache))
        .route("/commits", get(get_commits))
        .route("/commits/:id", get(get_commit_details))
        .route("/objects/:id", get(read_file_contents))
        .route("/sizes", post(get_sizes_for_paths))
        .route("/most-modified", get(get_most_modified))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

type ApiError = (StatusCode, String);

/// Status and body for a backend error. The body carries the inner message
/// so the client can rebuild the same variant.
fn api_error(err: Error) -> ApiError {
    match err {
        Error::PathInvalid(message) => (StatusCode::BAD_REQUEST, message),
        Error::NotFound(message) => (StatusCode::NOT_FOUND, message),
        other => {
            warn!("Backend request failed: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenRequest {
    pub path: String,
}

async fn open_repository(
    State(state): State<AppState>,
    Json(req): Json<OpenRequest>,
) -> Result<StatusCode, ApiError> {
    state.backend.open(&req.path).await.map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn prepare_cache(State(state): State<AppState>) -> Result<Json<CommitListing>, ApiError> {
    state.backend.prepare_cache().await.map(Json).map_err(api_error)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitsQuery {
    pub start_index: usize,
    pub count: Option<usize>,
}

async fn get_commits(
    State(state): State<AppState>,
    Query(query): Query<CommitsQuery>,
) -> Result<Json<HashMap<CommitId, String>>, ApiError> {
    let count = query.count.unwrap_or(DEFAULT_BATCH_SIZE);
    state
        .backend
        .get_commits(query.start_index, count)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn get_commit_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CommitDetails>, ApiError> {
    state
        .backend
        .get_commit_details(&id)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn read_file_contents(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    state
        .backend
        .read_file_contents(&id)
        .await
        .map(Json)
        .map_err(api_error)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SizesRequest {
    pub folders: Vec<String>,
    pub start_index: usize,
    pub count: usize,
}

async fn get_sizes_for_paths(
    State(state): State<AppState>,
    Json(req): Json<SizesRequest>,
) -> Result<Json<SizeSeries>, ApiError> {
    state
        .backend
        .get_sizes_for_paths(&req.folders, req.start_index, req.count)
        .await
        .map(Json)
        .map_err(api_error)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MostModifiedQuery {
    pub start_index: usize,
}

async fn get_most_modified(
    State(state): State<AppState>,
    Query(query): Query<MostModifiedQuery>,
) -> Result<Json<Vec<(String, usize)>>, ApiError> {
    state
        .backend
        .get_files_ordered_by_most_modifications(query.start_index)
        .await
        .map(Json)
        .map_err(api_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use gitplay_core::{History, MemoryBackend};
    use tower::ServiceExt;

    fn router() -> Router {
        let history = History::new()
            .commit("init", [("README.md", "hello\n")])
            .commit("add lib", [("src/lib.rs", "pub fn f() {}\n")]);
        let backend = MemoryBackend::new().with_repository("demo", &history);
        create_router(AppState {
            backend: Arc::new(backend),
        })
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn open_request(path: &str) -> Request<Body> {
        Request::post("/repository/open")
            .header("content-type", "application/json")
            .body(Body::from(format!(r#"{{"path": "{}"}}"#, path)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(
            &router(),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, br#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_open_invalid_path_is_bad_request() {
        let (status, body) = send(&router(), open_request("nowhere")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(String::from_utf8(body).unwrap(), "no repository at nowhere");
    }

    #[tokio::test]
    async fn test_listing_and_commits() {
        let router = router();
        let (status, _) = send(&router, open_request("demo")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(
            &router,
            Request::post("/repository/prepare-cache").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let listing: CommitListing = serde_json::from_slice(&body).unwrap();
        assert_eq!(listing.commits_count, 2);

        let (_, body) = send(
            &router,
            Request::get("/commits?start_index=1").body(Body::empty()).unwrap(),
        )
        .await;
        let commits: HashMap<CommitId, String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(commits[&listing.ordered_id_list[1]], "add lib");

        let uri = format!("/commits/{}", listing.ordered_id_list[1]);
        let (status, body) = send(&router, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let details: CommitDetails = serde_json::from_slice(&body).unwrap();
        assert!(details.file_tree.unwrap().find("src/lib.rs").is_some());
    }

    #[tokio::test]
    async fn test_unknown_object_is_not_found() {
        let router = router();
        send(&router, open_request("demo")).await;
        let (status, _) = send(
            &router,
            Request::get("/objects/0000").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
