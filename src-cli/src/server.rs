//! Read-only HTTP query server over the cache directory.
//!
//! Routes:
//! - `GET /playlists`: playlist summaries
//! - `GET /playlists/:id`: one playlist's cached tracks
//! - `GET /search?q=`: tracks matching a query, with their playlists

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use rotation_core::{
    Error as CoreError, PlaylistId, PlaylistLibrary, PlaylistSummaries, PlaylistTrack,
    SearchResults,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{error, info};

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Nothing cached under the requested ID.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request is missing or has invalid parameters.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Anything else. Never shown to clients.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidQuery(message) => Self::BadRequest(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(ref msg) => {
                error!("Request failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    library: Arc<Mutex<PlaylistLibrary>>,
}

impl AppState {
    /// Wrap a library for sharing between handlers.
    pub fn new(library: PlaylistLibrary) -> Self {
        Self {
            library: Arc::new(Mutex::new(library)),
        }
    }

    /// Run `f` against the library on the blocking pool.
    async fn with_library<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PlaylistLibrary) -> rotation_core::Result<T> + Send + 'static,
    {
        let library = Arc::clone(&self.library);
        tokio::task::spawn_blocking(move || {
            let mut library = library
                .lock()
                .map_err(|_| ServerError::Internal("library lock poisoned".to_string()))?;
            f(&mut library).map_err(ServerError::from)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("library task failed: {e}")))?
    }
}

/// Query string of `/search`.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Free-text query.
    pub q: Option<String>,
}

async fn list_playlists(
    State(state): State<AppState>,
) -> Result<Json<PlaylistSummaries>, ServerError> {
    let summaries = state
        .with_library(|library| {
            library.load_if_necessary()?;
            Ok(library.summaries().clone())
        })
        .await?;
    Ok(Json(summaries))
}

async fn get_playlist(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PlaylistTrack>>, ServerError> {
    let playlist_id = PlaylistId::new(id);
    let lookup = playlist_id.clone();
    let tracks = state
        .with_library(move |library| {
            library.load_if_necessary()?;
            library.playlist_tracks(&lookup)
        })
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("playlist {playlist_id}")))?;
    Ok(Json(tracks))
}

async fn search(
    Query(params): Query<SearchParams>,
    State(state): State<AppState>,
) -> Result<Json<SearchResults>, ServerError> {
    let query = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("missing query parameter q".to_string()))?;

    let results = state
        .with_library(move |library| library.search(&query))
        .await?;
    Ok(Json(results))
}

/// Build the router.
pub fn router(library: PlaylistLibrary) -> Router {
    Router::new()
        .route("/playlists", get(list_playlists))
        .route("/playlists/:id", get(get_playlist))
        .route("/search", get(search))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(AppState::new(library))
}

/// Serve until Ctrl-C.
pub async fn serve(address: &str, library: PlaylistLibrary) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(library))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down");
            }
        })
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use rotation_core::{EntityCache, Playlist, SUMMARIES_FILE, summarize};
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn entry(id: &str, name: &str) -> PlaylistTrack {
        serde_json::from_value(json!({
            "added_at": "2023-03-01T10:00:00Z",
            "track": {
                "id": id,
                "name": name,
                "album": {"id": format!("al-{id}"), "name": "Power, Corruption & Lies"},
                "artists": [{"id": "ar-1", "name": "New Order"}]
            }
        }))
        .expect("entry")
    }

    fn seeded_app() -> (Router, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let tracks = vec![entry("t1", "Age of Consent"), entry("t2", "Your Silent Face")];

        let mut entities = EntityCache::new(temp_dir.path()).expect("cache");
        entities.put("p1", &tracks).expect("put");

        let playlist = Playlist {
            id: PlaylistId::new("p1"),
            user: "me".to_string(),
            owner: "me".to_string(),
            name: "2023 march".to_string(),
            images: Vec::new(),
            snapshot_id: "s1".to_string(),
        };
        PlaylistSummaries {
            playlists: vec![summarize(&playlist, &tracks).expect("summary")],
        }
        .save(&temp_dir.path().join(SUMMARIES_FILE))
        .expect("save");

        (router(PlaylistLibrary::new(temp_dir.path())), temp_dir)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_list_playlists() {
        let (app, _temp_dir) = seeded_app();
        let (status, body) = get_json(app, "/playlists").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["playlists"][0]["id"], "p1");
        assert_eq!(body["playlists"][0]["numberOfTracks"], 2);
    }

    #[tokio::test]
    async fn test_get_playlist() {
        let (app, _temp_dir) = seeded_app();
        let (status, body) = get_json(app, "/playlists/p1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_unknown_playlist_is_not_found() {
        let (app, _temp_dir) = seeded_app();
        let (status, _) = get_json(app, "/playlists/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search() {
        let (app, _temp_dir) = seeded_app();
        let (status, body) = get_json(app, "/search?q=silent").await;

        assert_eq!(status, StatusCode::OK);
        let tracks = body["tracks"].as_array().expect("tracks");
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0]["id"], "t2");
        assert_eq!(tracks[0]["playlists"][0]["name"], "2023 march");
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let (app, _temp_dir) = seeded_app();
        let (status, _) = get_json(app.clone(), "/search").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(app, "/search?q=%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_corrupt_cache_hides_details() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join(SUMMARIES_FILE), "{ not json").unwrap();
        let app = router(PlaylistLibrary::new(temp_dir.path()));

        let (status, body) = get_json(app, "/playlists").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "internal error" }));
    }
}
