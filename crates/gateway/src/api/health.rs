//! GET /v1/health — lightweight health probe (public, no auth).

use axum::response::{IntoResponse, Json};

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
