//! Status transition handlers

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        ctx::Ctx,
        error::{ErrorResponse, IntoErrorResponse},
    },
    db,
    models::StatusTransition,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct TransitionsResponse {
    pub data: Vec<StatusTransition>,
}

/// Handler for the `GET /api/jobs/transitions/all` endpoint
///
/// Returns every recorded transition, oldest first.
#[tracing::instrument(skip_all, err)]
pub async fn all_handler(State(ctx): State<Ctx>) -> Result<Json<TransitionsResponse>, ErrorResponse> {
    let data = ctx
        .store
        .run(|db| db.list_transitions())
        .await
        .map_err(|err| {
            tracing::error!(error=?err, "failed to list transitions");
            Error::Storage(err)
        })?;

    Ok(Json(TransitionsResponse { data }))
}

/// Handler for the `GET /api/jobs/{id}/transitions` endpoint
///
/// ## Response
/// - **200 OK**: the job's transitions, oldest first
/// - **400 Bad Request**: `id` is not an integer
/// - **404 Not Found**: no job with that id
/// - **500 Internal Server Error**: storage failure
#[tracing::instrument(skip_all, err)]
pub async fn by_job_handler(
    State(ctx): State<Ctx>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<TransitionsResponse>, ErrorResponse> {
    let id = match path {
        Ok(Path(id)) => id,
        Err(err) => {
            tracing::debug!(error=?err, "invalid job ID in path");
            return Err(Error::InvalidId { err }.into());
        }
    };

    let data = ctx
        .store
        .run(move |db| match db.get_job(id)? {
            Some(_) => db.list_transitions_for_job(id).map(Some),
            None => Ok(None),
        })
        .await
        .map_err(|err| {
            tracing::error!(error=?err, job_id=id, "failed to list transitions");
            Error::Storage(err)
        })?
        .ok_or(Error::NotFound { id })?;

    Ok(Json(TransitionsResponse { data }))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid job ID: {err}")]
    InvalidId { err: PathRejection },

    #[error("job '{id}' not found")]
    NotFound { id: i64 },

    #[error("internal storage error")]
    Storage(#[source] db::Error),
}

impl IntoErrorResponse for Error {
    fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidId { .. } => "INVALID_JOB_ID",
            Error::NotFound { .. } => "JOB_NOT_FOUND",
            Error::Storage(_) => "STORAGE_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidId { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
