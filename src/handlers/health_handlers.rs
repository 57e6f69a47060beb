//! Health, readiness & status handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the storage root and disk I/O
//! - GET /status   -> storage root diagnostics for operators

use crate::{
    errors::AppError,
    services::storage_service::{RootDiagnostics, StorageService},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe: always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Verifies the storage root exists and is a directory.
/// 2. Performs a write/read/delete round trip of a reserved probe file in it.
///
/// HTTP 200 when all checks pass, HTTP 503 when any check fails.
pub async fn readyz(State(service): State<StorageService>) -> impl IntoResponse {
    let root_check = match service.base_dir() {
        Ok(_) => (true, None::<String>),
        Err(e) => (false, Some(e.to_string())),
    };

    // reserved name keeps the probe out of bucket listings
    let probe_path = service
        .base_path()
        .join(format!("__readyz-{}", Uuid::new_v4()));
    let disk_check = if !root_check.0 {
        (false, Some("skipped: storage root unusable".to_string()))
    } else {
        match fs::write(&probe_path, b"readyz").await {
            Ok(_) => {
                let read = fs::read(&probe_path).await;
                let removed = fs::remove_file(&probe_path).await;
                match (read, removed) {
                    (Ok(bytes), Ok(_)) if bytes == b"readyz" => (true, None),
                    (Ok(bytes), Err(e)) if bytes == b"readyz" => {
                        (true, Some(format!("could not remove probe file: {}", e)))
                    }
                    (Ok(_), _) => (false, Some("probe file content mismatch".to_string())),
                    (Err(e), _) => (false, Some(format!("could not read probe file: {}", e))),
                }
            }
            Err(e) => (false, Some(format!("could not write probe file: {}", e))),
        }
    };

    let overall_ok = root_check.0 && disk_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "storage_root",
        CheckStatus {
            ok: root_check.0,
            error: root_check.1,
        },
    );
    checks.insert(
        "disk",
        CheckStatus {
            ok: disk_check.0,
            error: disk_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// `GET /status`
///
/// Storage root diagnostics, the rendered one-line summary, the autocreate
/// policy and the number of buckets. Credentials are never included.
pub async fn status(State(service): State<StorageService>) -> Result<Json<StatusResponse>, AppError> {
    let response = tokio::task::spawn_blocking(move || {
        let storage = service.root_diagnostics()?;
        Ok::<_, crate::errors::StorageError>(StatusResponse {
            summary: storage.to_string(),
            storage,
            autocreate_buckets: service.autocreate_buckets(),
            buckets: service.list_buckets().len(),
        })
    })
    .await
    .map_err(|err| AppError::internal(format!("status task failed: {}", err)))??;
    Ok(Json(response))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub storage: RootDiagnostics,
    pub summary: String,
    pub autocreate_buckets: bool,
    pub buckets: usize,
}
