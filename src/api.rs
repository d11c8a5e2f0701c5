//! Job tracker REST API

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod ctx;
pub mod error;
pub mod jobs;
pub mod stats;

use ctx::Ctx;

pub fn router(ctx: Ctx) -> Router {
    Router::new()
        .route("/", get(|| async { "Job Tracker API is running!" }))
        .route("/healthz", get(|| async { StatusCode::OK }))
        .route(
            "/api/jobs",
            get(jobs::list::handler).post(jobs::create::handler),
        )
        .route(
            "/api/jobs/transitions/all",
            get(jobs::transitions::all_handler),
        )
        .route(
            "/api/jobs/{id}",
            get(jobs::get_by_id::handler)
                .put(jobs::update::handler)
                .delete(jobs::delete_by_id::handler),
        )
        .route(
            "/api/jobs/{id}/transitions",
            get(jobs::transitions::by_job_handler),
        )
        .route("/api/stats", get(stats::handler))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind `at` and serve until SIGINT/SIGTERM.
pub async fn serve(at: SocketAddr, ctx: Ctx) -> Result<()> {
    let listener = TcpListener::bind(at)
        .await
        .with_context(|| format!("failed to bind to {at}"))?;
    let addr = listener.local_addr().context("failed to read local address")?;
    tracing::info!(%addr, "job tracker API listening");

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let (mut sigint, mut sigterm) = match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(err), _) | (_, Err(err)) => {
                tracing::error!(error=?err, "failed to install signal handlers");
                std::future::pending::<()>().await;
                return;
            }
        };
        tokio::select! {
            _ = sigint.recv() => tracing::info!(signal="SIGINT", "shutdown signal"),
            _ = sigterm.recv() => tracing::info!(signal="SIGTERM", "shutdown signal"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error=?err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, Store};
    use crate::query::PageLimits;
    use axum::body::Body;
    use axum::http::{Method, Request, header};
    use chrono::{DateTime, Utc};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app() -> Router {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        router(Ctx {
            store: Store::new(db),
            limits: PageLimits::default(),
        })
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    async fn create(app: &Router, body: Value) -> Value {
        let (status, job) = send(app, Method::POST, "/api/jobs", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{job}");
        job
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("Job Tracker API is running!"));
        let (status, _) = send(&app, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_defaults_status_and_applied_date() {
        let app = app();
        let before = Utc::now();
        let job = create(
            &app,
            json!({"company": "Acme", "position": "Engineer", "location": "Remote"}),
        )
        .await;

        assert_eq!(job["status"], "APPLIED");
        assert_eq!(job["company"], "Acme");
        assert_eq!(job["tags"], json!([]));
        let applied: DateTime<Utc> = job["appliedDate"].as_str().unwrap().parse().unwrap();
        assert!((applied - before).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn test_create_keeps_supplied_status() {
        let app = app();
        let job = create(
            &app,
            json!({"company": "Acme", "position": "Engineer", "location": "Remote", "status": "OFFER"}),
        )
        .await;
        assert_eq!(job["status"], "OFFER");
    }

    #[tokio::test]
    async fn test_create_validation_lists_all_fields() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/jobs",
            Some(json!({"company": "", "status": "HIRED", "url": "not a url"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["error_code"], "VALIDATION_FAILED");
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["company", "position", "location", "status", "url"]);

        let (_, list) = send(&app, Method::GET, "/api/jobs", None).await;
        assert_eq!(list["meta"]["total"], 0);
    }

    #[tokio::test]
    async fn test_create_rejects_non_json_body() {
        let app = app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/jobs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error_code"], "INVALID_REQUEST_BODY");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let app = app();
        let job = create(
            &app,
            json!({"company": "Acme", "position": "Engineer", "location": "Remote"}),
        )
        .await;

        let (status, fetched) = send(&app, Method::GET, &format!("/api/jobs/{}", job["id"]), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, job);

        let (status, body) = send(&app, Method::GET, "/api/jobs/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "JOB_NOT_FOUND");

        let (status, body) = send(&app, Method::GET, "/api/jobs/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "INVALID_JOB_ID");
    }

    #[tokio::test]
    async fn test_update_status_records_one_transition() {
        let app = app();
        let job = create(
            &app,
            json!({"company": "Acme", "position": "Engineer", "location": "Remote"}),
        )
        .await;
        let uri = format!("/api/jobs/{}", job["id"]);

        let mut payload = job.clone();
        payload["status"] = json!("INTERVIEW");
        let (status, updated) = send(&app, Method::PUT, &uri, Some(payload.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "INTERVIEW");
        assert_eq!(updated["appliedDate"], job["appliedDate"]);

        let (_, transitions) = send(&app, Method::GET, "/api/jobs/transitions/all", None).await;
        let data = transitions["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["jobId"], job["id"]);
        assert_eq!(data[0]["from"], "APPLIED");
        assert_eq!(data[0]["to"], "INTERVIEW");

        // Same status again: no new transition.
        let (status, _) = send(&app, Method::PUT, &uri, Some(payload)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, transitions) = send(&app, Method::GET, "/api/jobs/transitions/all", None).await;
        assert_eq!(transitions["data"].as_array().unwrap().len(), 1);

        let (status, history) = send(&app, Method::GET, &format!("{uri}/transitions"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_is_full_replace() {
        let app = app();
        let job = create(
            &app,
            json!({
                "company": "Acme", "position": "Engineer", "location": "Remote",
                "status": "INTERVIEW", "tags": ["rust"], "notes": "call back"
            }),
        )
        .await;

        // Omitted status falls back to APPLIED, which is a change.
        let (status, updated) = send(
            &app,
            Method::PUT,
            &format!("/api/jobs/{}", job["id"]),
            Some(json!({"company": "Acme", "position": "Staff Engineer", "location": "Berlin"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["position"], "Staff Engineer");
        assert_eq!(updated["status"], "APPLIED");
        assert_eq!(updated["tags"], json!([]));
        assert_eq!(updated["notes"], Value::Null);

        let (_, transitions) = send(&app, Method::GET, "/api/jobs/transitions/all", None).await;
        assert_eq!(transitions["data"][0]["from"], "INTERVIEW");
        assert_eq!(transitions["data"][0]["to"], "APPLIED");
    }

    #[tokio::test]
    async fn test_update_errors_write_nothing() {
        let app = app();
        let job = create(
            &app,
            json!({"company": "Acme", "position": "Engineer", "location": "Remote"}),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/jobs/4242",
            Some(json!({"company": "Acme", "position": "Engineer", "location": "Remote", "status": "OFFER"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "JOB_NOT_FOUND");

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/jobs/{}", job["id"]),
            Some(json!({"company": "Acme", "position": "", "location": "Remote", "status": "OFFER"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "position");

        let (_, transitions) = send(&app, Method::GET, "/api/jobs/transitions/all", None).await;
        assert_eq!(transitions["data"], json!([]));
        let (_, fetched) = send(&app, Method::GET, &format!("/api/jobs/{}", job["id"]), None).await;
        assert_eq!(fetched["status"], "APPLIED");
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let app = app();
        let job = create(
            &app,
            json!({"company": "Acme", "position": "Engineer", "location": "Remote"}),
        )
        .await;
        let uri = format!("/api/jobs/{}", job["id"]);

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], format!("job '{}' not found", job["id"]));

        let (status, _) = send(&app, Method::GET, &format!("{uri}/transitions"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_paginates_filtered_rows() {
        let app = app();
        for i in 0..12 {
            create(
                &app,
                json!({
                    "company": format!("Offer Co {i:02}"), "position": "Engineer",
                    "location": "Remote", "status": "OFFER",
                    "appliedDate": format!("2025-01-{:02}", i + 1)
                }),
            )
            .await;
        }
        create(
            &app,
            json!({"company": "Pending", "position": "Engineer", "location": "Remote"}),
        )
        .await;

        let (status, body) = send(&app, Method::GET, "/api/jobs?status=OFFER&page=2&limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"], json!({"total": 12, "page": 2, "limit": 5, "pages": 3}));
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 5);
        assert_eq!(data[0]["company"], "Offer Co 06");

        let (_, body) = send(&app, Method::GET, "/api/jobs?status=OFFER&page=3&limit=5", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (_, body) = send(&app, Method::GET, "/api/jobs", None).await;
        assert_eq!(body["meta"], json!({"total": 13, "page": 1, "limit": 10, "pages": 2}));
        assert_eq!(body["data"][0]["company"], "Pending");
    }

    #[tokio::test]
    async fn test_search_ignores_parameter_order() {
        let app = app();
        create(
            &app,
            json!({"company": "Acme", "position": "Engineer", "location": "Remote", "status": "INTERVIEW"}),
        )
        .await;
        create(
            &app,
            json!({"company": "Globex", "position": "Engineer", "location": "Remote", "tags": ["Acme"]}),
        )
        .await;
        create(
            &app,
            json!({"company": "Initech", "position": "Engineer", "location": "Remote"}),
        )
        .await;

        let (_, a) = send(&app, Method::GET, "/api/jobs?q=Acme&sort=company_asc&limit=5", None).await;
        let (_, b) = send(&app, Method::GET, "/api/jobs?limit=5&sort=company_asc&q=Acme", None).await;
        assert_eq!(a, b);
        assert_eq!(a["meta"]["total"], 2);

        let (_, body) = send(&app, Method::GET, "/api/jobs?q=acme&status=INTERVIEW", None).await;
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["data"][0]["company"], "Acme");
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_beyond_ascii() {
        let app = app();
        create(
            &app,
            json!({"company": "Émile GmbH", "position": "Ingénieur", "location": "Lyon"}),
        )
        .await;
        create(
            &app,
            json!({"company": "Initech", "position": "Engineer", "location": "Remote"}),
        )
        .await;

        // "Émile" and "émile", percent-encoded.
        for q in ["%C3%89mile", "%C3%A9mile"] {
            let (status, body) = send(&app, Method::GET, &format!("/api/jobs?q={q}"), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["meta"]["total"], 1, "q={q}");
            assert_eq!(body["data"][0]["company"], "Émile GmbH");
        }
    }

    #[tokio::test]
    async fn test_out_of_range_applied_date_is_rejected_and_stores_nothing() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/jobs",
            Some(json!({
                "company": "Acme", "position": "Engineer", "location": "Remote",
                "appliedDate": "+10000-01-01"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "VALIDATION_FAILED");
        assert_eq!(body["details"][0]["field"], "appliedDate");

        let job = create(
            &app,
            json!({"company": "Globex", "position": "Engineer", "location": "Remote"}),
        )
        .await;
        let (status, list) = send(&app, Method::GET, "/api/jobs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["meta"]["total"], 1);
        assert_eq!(list["data"][0], job);

        let (status, _) = send(&app, Method::GET, &format!("/api/jobs/{}", job["id"]), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_sort_and_bad_paging() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/api/jobs?sort=salary_desc&page=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "INVALID_QUERY_PARAMETERS");
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["sort", "page"]);

        let (status, _) = send(&app, Method::GET, "/api/jobs?sort=company", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, Method::GET, "/api/jobs?limit=5000", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats() {
        let app = app();
        create(
            &app,
            json!({"company": "Acme", "position": "Engineer", "location": "Remote"}),
        )
        .await;
        create(
            &app,
            json!({
                "company": "Globex", "position": "Engineer", "location": "Remote",
                "status": "REJECTED", "appliedDate": "2001-01-01"
            }),
        )
        .await;

        let (status, body) = send(&app, Method::GET, "/api/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["byStatus"]["APPLIED"], 1);
        assert_eq!(body["byStatus"]["REJECTED"], 1);
        assert_eq!(body["byStatus"]["OFFER"], 0);
        assert_eq!(body["appliedThisWeek"], 1);
    }
}
