//! Jobs get by ID handler

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
};

use crate::{
    api::{
        ctx::Ctx,
        error::{ErrorResponse, IntoErrorResponse},
    },
    db,
    models::JobApplication,
};

/// Handler for the `GET /api/jobs/{id}` endpoint
///
/// ## Response
/// - **200 OK**: the job
/// - **400 Bad Request**: `id` is not an integer
/// - **404 Not Found**: no job with that id
/// - **500 Internal Server Error**: storage failure
#[tracing::instrument(skip_all, err)]
pub async fn handler(
    State(ctx): State<Ctx>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<JobApplication>, ErrorResponse> {
    let id = match path {
        Ok(Path(id)) => id,
        Err(err) => {
            tracing::debug!(error=?err, "invalid job ID in path");
            return Err(Error::InvalidId { err }.into());
        }
    };

    match ctx.store.run(move |db| db.get_job(id)).await {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(Error::NotFound { id }.into()),
        Err(err) => {
            tracing::error!(error=?err, job_id=id, "failed to get job");
            Err(Error::Storage(err).into())
        }
    }
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
