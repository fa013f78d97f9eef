/// API route handlers for the vidpipe queue UI.
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use vidpipe_downloader::metadata::InfoProvider;
use vidpipe_downloader::relay;
use vidpipe_downloader::resolver::{DownloadResult, Resolver};
use vidpipe_shared::models::{sanitize_title, MediaFormat};

/// Shared application state for all handlers.
pub struct AppState {
    pub info: Arc<dyn InfoProvider>,
    pub resolver: Arc<dyn Resolver>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/download", get(download))
        .route("/api/info", post(batch_info))
        .with_state(state)
}

// ====== REQUEST TYPES ======

#[derive(Deserialize)]
pub struct DownloadParams {
    pub url: Option<String>,
    pub format: Option<String>,
}

#[derive(Deserialize)]
pub struct InfoBody {
    #[serde(default)]
    pub urls: Vec<String>,
}

// ====== ROUTES ======

/// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/download?url=...&format=mp4|mp3
async fn download(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> Response {
    let Some(url) = params.url.filter(|u| !u.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing url parameter").into_response();
    };

    // Validated before any upstream call is made.
    let format = match params.format.as_deref().map(MediaFormat::parse) {
        Some(Ok(format)) => format,
        _ => return (StatusCode::BAD_REQUEST, "Invalid format. Use mp4 or mp3").into_response(),
    };

    // Resolve metadata and the download before touching the response, so a
    // failure here still produces a clean error status. Once streaming has
    // begun, a failure can only terminate the body abruptly.
    let video_info = match state.info.resolve_info(&url).await {
        Ok(info) => info,
        Err(e) => {
            warn!("info resolution failed for {}: {}", url, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let resolved = match state.resolver.resolve(&url, format).await {
        Ok(result) => result,
        Err(e) => {
            warn!("download resolution failed for {}: {}", url, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    match resolved {
        DownloadResult::Redirect { url: direct } => {
            info!("redirect download for {} ({})", video_info.id, format);
            Json(serde_json::json!({ "url": direct })).into_response()
        }
        DownloadResult::Stream { source, content_type } => {
            let filename = format!("{}.{}", sanitize_title(&video_info.title), format.extension());
            info!("streaming download for {} as {}", video_info.id, filename);

            let body = Body::from_stream(relay::relay(source));
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", filename),
                    ),
                ],
                body,
            )
                .into_response()
        }
    }
}

/// POST /api/info - resolve metadata for a batch of URLs.
///
/// Every URL is attempted independently; one failure never aborts its
/// siblings, and the response preserves input order.
async fn batch_info(
    State(state): State<Arc<AppState>>,
    body: Result<Json<InfoBody>, JsonRejection>,
) -> Response {
    let urls = match body {
        Ok(Json(InfoBody { urls })) if !urls.is_empty() => urls,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Please provide an array of URLs" })),
            )
                .into_response();
        }
    };

    let lookups = urls.iter().map(|u| state.info.resolve_info(u));
    let results = futures_util::future::join_all(lookups).await;

    let videos: Vec<serde_json::Value> = results
        .into_iter()
        .zip(&urls)
        .map(|(result, url)| match result {
            Ok(data) => serde_json::json!({ "success": true, "data": data }),
            Err(e) => serde_json::json!({ "success": false, "url": url, "error": e.to_string() }),
        })
        .collect();

    Json(serde_json::json!({ "videos": videos })).into_response()
}
