//! Pull management handlers.
//!
//! Model references may contain `/` (e.g. `library/llama3:8b`); path
//! parameters are percent-decoded, so clients send them as `%2F`.

use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::{ArtifactRef, PullRequest, SessionSnapshot};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// GET /pulls - List all tracked pulls
#[utoipa::path(
    get,
    path = "/pulls",
    tag = "pulls",
    responses(
        (status = 200, description = "Snapshots of all tracked pulls, ordered by model", body = Vec<SessionSnapshot>)
    )
)]
pub async fn list_pulls(State(state): State<AppState>) -> Json<Vec<SessionSnapshot>> {
    Json(state.puller.list())
}

/// GET /pulls/:model - Get one pull
#[utoipa::path(
    get,
    path = "/pulls/{model}",
    tag = "pulls",
    params(
        ("model" = String, Path, description = "Model reference")
    ),
    responses(
        (status = 200, description = "Pull snapshot", body = SessionSnapshot),
        (status = 404, description = "No pull tracked for the model", body = crate::error::ApiError)
    )
)]
pub async fn get_pull(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> Result<Json<SessionSnapshot>> {
    let artifact = ArtifactRef::new(model);
    state
        .puller
        .snapshot(&artifact)
        .map(Json)
        .ok_or_else(|| Error::NotFound(artifact.to_string()))
}

/// POST /pulls - Start a pull or attach to the one in flight
#[utoipa::path(
    post,
    path = "/pulls",
    tag = "pulls",
    request_body = PullRequest,
    responses(
        (status = 202, description = "Pull started or already in flight", body = SessionSnapshot),
        (status = 400, description = "No model named", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_pull(
    State(state): State<AppState>,
    Json(request): Json<PullRequest>,
) -> Result<impl IntoResponse> {
    let snapshot = state.puller.pull(request).await?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// POST /pulls/:model/cancel - Cancel an in-flight pull
#[utoipa::path(
    post,
    path = "/pulls/{model}/cancel",
    tag = "pulls",
    params(
        ("model" = String, Path, description = "Model reference")
    ),
    responses(
        (status = 204, description = "Pull canceled (or already finished)"),
        (status = 404, description = "No pull tracked for the model", body = crate::error::ApiError)
    )
)]
pub async fn cancel_pull(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> Result<StatusCode> {
    state.puller.cancel(&ArtifactRef::new(model)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /pulls/:model - Dismiss a finished pull
#[utoipa::path(
    delete,
    path = "/pulls/{model}",
    tag = "pulls",
    params(
        ("model" = String, Path, description = "Model reference")
    ),
    responses(
        (status = 204, description = "Pull dismissed"),
        (status = 404, description = "No pull tracked for the model", body = crate::error::ApiError),
        (status = 409, description = "Pull still in flight", body = crate::error::ApiError)
    )
)]
pub async fn dismiss_pull(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> Result<StatusCode> {
    state.puller.dismiss(&ArtifactRef::new(model))?;
    Ok(StatusCode::NO_CONTENT)
}
