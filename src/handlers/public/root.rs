use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;

/// GET / - service information
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "ORCID++ API",
            "version": version,
            "description": "Researcher profiles backed by the public ORCID registry",
            "endpoints": {
                "health": "/health (public)",
                "auth": "/auth/orcid/callback (public - token acquisition)",
                "orcid": "/api/orcid/search[/all], /api/orcid/:orcid[/works|/fundings[/:put_code]] (public - live ORCID data)",
                "researchers": "/api/researchers[/:orcid[/publications|/projects|/sync]] (reads public, writes protected)",
                "publications": "/api/publications/:id (reads public, writes protected)",
                "projects": "/api/projects/:id[/members|/publications] (reads public, writes protected)",
            }
        }
    }))
}

/// GET /health - database ping
pub async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": e.to_string()
                    }
                })),
            )
        }
    }
}
