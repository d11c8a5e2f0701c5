//! Jobs create handler

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
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

/// Handler for the `POST /api/jobs` endpoint
///
/// `status` defaults to `APPLIED` and `appliedDate` to the time of the request.
///
/// ## Response
/// - **201 Created**: the stored job
/// - **400 Bad Request**: body is not JSON, or fails validation (`details` lists every field)
/// - **500 Internal Server Error**: storage failure
#[tracing::instrument(skip_all, err)]
pub async fn handler(
    State(ctx): State<Ctx>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<JobApplication>), ErrorResponse> {
    let payload = match body {
        Ok(Json(payload)) => payload,
        Err(err) => {
            tracing::debug!(error=?err, "invalid request body");
            return Err(Error::InvalidBody { err }.into());
        }
    };

    let input = validate_job(&payload, Utc::now()).map_err(|err| {
        tracing::debug!(error=%err, "job payload rejected");
        Error::Validation(err)
    })?;

    let job = ctx
        .store
        .run(move |db| db.create_job(&input))
        .await
        .map_err(|err| {
            tracing::error!(error=?err, "failed to create job");
            Error::Storage(err)
        })?;

    tracing::info!(job_id = job.id, company = %job.company, "job created");

    Ok((StatusCode::CREATED, Json(job)))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid request body: {err}")]
    InvalidBody { err: JsonRejection },

    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("internal storage error")]
    Storage(#[source] db::Error),
}

impl IntoErrorResponse for Error {
    fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidBody { .. } => "INVALID_REQUEST_BODY",
            Error::Validation(_) => "VALIDATION_FAILED",
            Error::Storage(_) => "STORAGE_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidBody { .. } | Error::Validation(_) => StatusCode::BAD_REQUEST,
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
