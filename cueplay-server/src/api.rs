//! Router and request handlers.

use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use cueplay_core::library::is_cue_path;
use cueplay_core::{
    CueTrackEntry, Library, Listing, PlaybackSession, SeekTarget, StatusReport, TransportOutcome,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<PlaybackSession>,
    pub library: Arc<Library>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    /// Path relative to the music library
    pub filename: String,
    /// Track to start when `filename` is a cue sheet
    pub track: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SeekRequest {
    /// Fraction of the current length, `0.0..=1.0`
    pub position: Option<f64>,
    /// Milliseconds, track-relative for cue tracks
    pub position_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct Success {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct TransportResponse {
    pub status: TransportOutcome,
}

#[derive(Debug, Serialize)]
pub struct CueListing {
    pub path: String,
    pub tracks: Vec<CueTrackEntry>,
}

/// Build the remote control router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/browse", get(browse))
        .route("/cue", get(cue_tracks))
        .route("/play", post(play))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/stop", post(stop))
        .route("/seek", post(seek))
        .route("/status", get(status))
        .with_state(state)
}

/// Run filesystem work off the async workers
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> cueplay_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

async fn browse(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Listing>, ApiError> {
    let library = state.library;
    let listing = blocking(move || library.browse(&query.path)).await?;
    Ok(Json(listing))
}

async fn cue_tracks(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<CueListing>, ApiError> {
    let library = state.library;
    let path = query.path.clone();
    let tracks = blocking(move || library.cue_tracks(&path)).await?;
    Ok(Json(CueListing {
        path: query.path,
        tracks,
    }))
}

async fn play(
    State(state): State<AppState>,
    body: Result<Json<PlayRequest>, JsonRejection>,
) -> Result<Json<Success>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let library = state.library;
    let filename = request.filename.clone();
    let path = blocking(move || library.resolve(&filename)).await?;
    info!("Play request for {}", request.filename);

    if is_cue_path(&path) {
        state.session.load_cue(&path, request.track).await?;
    } else {
        if request.track.is_some() {
            debug!("Ignoring track number for plain file {}", request.filename);
        }
        state.session.load_plain(&path).await?;
    }

    Ok(Json(Success { success: true }))
}

async fn pause(State(state): State<AppState>) -> Result<Json<TransportResponse>, ApiError> {
    let status = state.session.pause().await?;
    Ok(Json(TransportResponse { status }))
}

async fn resume(State(state): State<AppState>) -> Result<Json<TransportResponse>, ApiError> {
    let status = state.session.resume().await?;
    Ok(Json(TransportResponse { status }))
}

async fn stop(State(state): State<AppState>) -> Result<Json<TransportResponse>, ApiError> {
    let status = state.session.stop().await?;
    Ok(Json(TransportResponse { status }))
}

async fn seek(
    State(state): State<AppState>,
    body: Result<Json<SeekRequest>, JsonRejection>,
) -> Result<Json<Success>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let target = match (request.position_ms, request.position) {
        (Some(ms), _) => SeekTarget::AbsoluteMs(ms),
        (None, Some(fraction)) => SeekTarget::Fraction(fraction),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "expected position or position_ms".to_string(),
            ))
        }
    };

    state.session.seek(target).await?;
    Ok(Json(Success { success: true }))
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.session.status().await)
}
