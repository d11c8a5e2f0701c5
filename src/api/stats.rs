//! Stats handler

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use crate::{
    api::{
        ctx::Ctx,
        error::{ErrorResponse, IntoErrorResponse},
    },
    db,
    models::JobStats,
};

/// Handler for the `GET /api/stats` endpoint
///
/// Totals per status and the number of applications dated within the last week.
#[tracing::instrument(skip_all, err)]
pub async fn handler(State(ctx): State<Ctx>) -> Result<Json<JobStats>, ErrorResponse> {
    let now = Utc::now();
    let stats = ctx
        .store
        .run(move |db| db.stats(now))
        .await
        .map_err(|err| {
            tracing::error!(error=?err, "failed to compute stats");
            Error::Storage(err)
        })?;

    Ok(Json(stats))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("internal storage error")]
    Storage(#[source] db::Error),
}

impl IntoErrorResponse for Error {
    fn error_code(&self) -> &'static str {
        "STORAGE_ERROR"
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
