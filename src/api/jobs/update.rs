//! Jobs update handler

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::Value;

use crate::{
    api::{
        ctx::Ctx,
        error::{ErrorResponse, IntoErrorResponse},
    },
    db,
    models::JobApplication,
    validate::{FieldError, ValidationErrors, validate_job},
};

/// Handler for the `PUT /api/jobs/{id}` endpoint
///
/// Full replace: the body is validated like a create payload, with the same
/// defaults for omitted `status` and `appliedDate`. When the stored status
/// differs from the incoming one a status transition is recorded in the same
/// transaction as the update.
///
/// ## Response
/// - **200 OK**: the updated job
/// - **400 Bad Request**: invalid id, non-JSON body, or validation failure
/// - **404 Not Found**: no job with that id (nothing is written)
/// - **500 Internal Server Error**: storage failure (nothing is written)
#[tracing::instrument(skip_all, err)]
pub async fn handler(
    State(ctx): State<Ctx>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<JobApplication>, ErrorResponse> {
    let id = match path {
        Ok(Path(id)) => id,
        Err(err) => {
            tracing::debug!(error=?err, "invalid job ID in path");
            return Err(Error::InvalidId { err }.into());
        }
    };

    let payload = match body {
        Ok(Json(payload)) => payload,
        Err(err) => {
            tracing::debug!(error=?err, job_id=id, "invalid request body");
            return Err(Error::InvalidBody { err }.into());
        }
    };

    let input = validate_job(&payload, Utc::now()).map_err(|err| {
        tracing::debug!(error=%err, job_id=id, "job payload rejected");
        Error::Validation(err)
    })?;

    let updated = ctx
        .store
        .run(move |db| db.update_job(id, &input))
        .await
        .map_err(|err| {
            tracing::error!(error=?err, job_id=id, "failed to update job");
            Error::Storage(err)
        })?;

    let Some((job, transition)) = updated else {
        return Err(Error::NotFound { id }.into());
    };

    match transition {
        Some(t) => tracing::info!(job_id=id, from=%t.from, to=%t.to, "job updated, status changed"),
        None => tracing::info!(job_id = id, "job updated"),
    }

    Ok(Json(job))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid job ID: {err}")]
    InvalidId { err: PathRejection },

    #[error("invalid request body: {err}")]
    InvalidBody { err: JsonRejection },

    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("job '{id}' not found")]
    NotFound { id: i64 },

    #[error("internal storage error")]
    Storage(#[source] db::Error),
}

impl IntoErrorResponse for Error {
    fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidId { .. } => "INVALID_JOB_ID",
            Error::InvalidBody { .. } => "INVALID_REQUEST_BODY",
            Error::Validation(_) => "VALIDATION_FAILED",
            Error::NotFound { .. } => "JOB_NOT_FOUND",
            Error::Storage(_) => "STORAGE_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidId { .. } | Error::InvalidBody { .. } | Error::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<Vec<FieldError>> {
        match self {
            Error::Validation(errors) => Some(errors.details.clone()),
            _ => None,
        }
    }
}
