use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Request, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use pvscan_ocr::{CompiledProfile, ExtractionPipeline, ExtractionProfile, PipelineError, PreprocessError};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ApiError;

pub const HEALTH_PATH: &str = "/health";
/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: ExtractionPipeline,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub text: Option<String>,
    pub probability: Option<f32>,
}

struct Upload {
    filename: String,
    data: Bytes,
}

/// One `POST` route per profile plus `GET /health`.
pub fn router(state: AppState, profiles: Vec<ExtractionProfile>, max_request_bytes: usize) -> Router {
    let mut router = Router::new().route(HEALTH_PATH, get(health));

    for profile in profiles {
        let path = profile.path.clone();
        let profile = Arc::new(CompiledProfile::from(profile));
        router = router.route(
            &path,
            post(
                move |State(state): State<AppState>,
                      multipart: Result<Multipart, MultipartRejection>| {
                    let profile = Arc::clone(&profile);
                    async move { extract(state, profile, multipart).await }
                },
            ),
        );
    }

    router
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            tracing::info_span!(
                "request",
                id = %uuid::Uuid::new_v4(),
                method = %req.method(),
                uri = %req.uri(),
            )
        }))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "engine": state.pipeline.engine_name() }))
}

async fn extract(
    state: AppState,
    profile: Arc<CompiledProfile>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractResponse>, ApiError> {
    // A body that is not multipart at all carries no file part either.
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("not a multipart request: {e}");
        ApiError::NoFileProvided
    })?;
    let max_upload = state.pipeline.limits().max_bytes;
    let upload = read_file_field(&mut multipart)
        .await
        .map_err(|e| body_error(e, max_upload))?;

    info!(
        filename = %upload.filename,
        bytes = upload.data.len(),
        route = %profile.profile.path,
        "received upload"
    );

    let pipeline = state.pipeline.clone();
    let route_profile = Arc::clone(&profile);
    let result = tokio::task::spawn_blocking(move || pipeline.process_bytes(&upload.data, &route_profile))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    info!(
        identifier = %result.identifier,
        confidence = result.confidence,
        route = %profile.profile.path,
        "identifier extracted"
    );
    Ok(Json(ExtractResponse {
        text: Some(result.identifier),
        probability: Some(result.confidence),
    }))
}

/// First part named `file` that carries a filename. Parts without a
/// filename are plain form fields, not uploads.
async fn read_file_field(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if filename.is_empty() {
            return Err(ApiError::EmptyFilename);
        }
        let data = field.bytes().await?;
        return Ok(Upload { filename, data });
    }
    Err(ApiError::NoFileProvided)
}

/// The request limit is never below the upload limit, so a body cut off by
/// it is reported with the upload size message rather than a bare 413.
fn body_error(err: ApiError, max_upload: usize) -> ApiError {
    match err {
        ApiError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::debug!("request body over limit: {e}");
            PipelineError::from(PreprocessError::SizeLimitExceeded { limit: max_upload }).into()
        }
        other => other,
    }
}
