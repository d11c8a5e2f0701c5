//! Jobs delete by ID handler

use axum::{
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
};

use crate::{
    api::{
        ctx::Ctx,
        error::{ErrorResponse, IntoErrorResponse},
    },
    db,
};

/// Handler for the `DELETE /api/jobs/{id}` endpoint
///
/// Hard delete. The job's status transitions are removed with it.
///
/// ## Response
/// - **204 No Content**: deleted
/// - **400 Bad Request**: `id` is not an integer
/// - **404 Not Found**: no job with that id (nothing is written)
/// - **500 Internal Server Error**: storage failure
#[tracing::instrument(skip_all, err)]
pub async fn handler(
    State(ctx): State<Ctx>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ErrorResponse> {
    let id = match path {
        Ok(Path(id)) => id,
        Err(err) => {
            tracing::debug!(error=?err, "invalid job ID in path");
            return Err(Error::InvalidId { err }.into());
        }
    };

    let deleted = ctx
        .store
        .run(move |db| db.delete_job(id))
        .await
        .map_err(|err| {
            tracing::error!(error=?err, job_id=id, "failed to delete job");
            Error::Storage(err)
        })?;

    if !deleted {
        tracing::debug!(job_id = id, "job not found");
        return Err(Error::NotFound { id }.into());
    }

    tracing::info!(job_id = id, "job deleted");
    Ok(StatusCode::NO_CONTENT)
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
