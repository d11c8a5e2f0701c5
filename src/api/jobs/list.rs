//! Jobs list handler

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        ctx::Ctx,
        error::{ErrorResponse, IntoErrorResponse},
    },
    db,
    models::JobApplication,
    query::{JobQuery, ListParams, PageMeta},
    validate::{FieldError, ValidationErrors},
};

/// Handler for the `GET /api/jobs` endpoint
///
/// ## Query Parameters
/// - `q`: free-text term matched against company and position (case-insensitive
///   substring) or against tags (exact element)
/// - `status`: exact status filter
/// - `sort`: `<field>_<asc|desc>` with field one of `appliedDate`, `company`,
///   `position`, `status` (default `appliedDate_desc`)
/// - `page`: 1-based page number (default 1)
/// - `limit`: page size (default 10)
///
/// ## Response
/// - **200 OK**: `{ data, meta: { total, page, limit, pages } }`
/// - **400 Bad Request**: invalid parameters, with per-field `details`
/// - **500 Internal Server Error**: storage failure
#[tracing::instrument(skip_all, err)]
pub async fn handler(
    State(ctx): State<Ctx>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<JobsPage>, ErrorResponse> {
    let params = match params {
        Ok(Query(params)) => params,
        Err(err) => {
            tracing::debug!(error=?err, "malformed query string");
            return Err(Error::MalformedQuery { err }.into());
        }
    };

    let query = JobQuery::parse(&params, ctx.limits).map_err(|err| {
        tracing::debug!(error=%err, "invalid list parameters");
        Error::InvalidParams(err)
    })?;

    let (data, total) = {
        let query = query.clone();
        ctx.store
            .run(move |db| db.list_jobs(&query))
            .await
            .map_err(|err| {
                tracing::error!(error=?err, "failed to list jobs");
                Error::Storage(err)
            })?
    };

    Ok(Json(JobsPage {
        data,
        meta: PageMeta::new(total, &query),
    }))
}

/// One page of jobs with pagination metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct JobsPage {
    pub data: Vec<JobApplication>,
    pub meta: PageMeta,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The query string could not be decoded at all
    #[error("invalid query parameters: {err}")]
    MalformedQuery { err: QueryRejection },

    /// One or more parameters failed validation
    #[error("invalid query parameters")]
    InvalidParams(ValidationErrors),

    #[error("internal storage error")]
    Storage(#[source] db::Error),
}

impl IntoErrorResponse for Error {
    fn error_code(&self) -> &'static str {
        match self {
            Error::MalformedQuery { .. } | Error::InvalidParams(_) => "INVALID_QUERY_PARAMETERS",
            Error::Storage(_) => "STORAGE_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::MalformedQuery { .. } | Error::InvalidParams(_) => StatusCode::BAD_REQUEST,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<Vec<FieldError>> {
        match self {
            Error::InvalidParams(errors) => Some(errors.details.clone()),
            _ => None,
        }
    }
}
