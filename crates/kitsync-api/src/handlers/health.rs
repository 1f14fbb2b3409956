use axum::{extract::State, response::IntoResponse, Json};

use crate::AppState;

/// Liveness plus the current global kit, so health checks also confirm the store
/// answers.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = match state.kits.global_kit().await {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };
    Json(serde_json::json!({
        "status": if store == "ok" { "healthy" } else { "degraded" },
        "store": store,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
