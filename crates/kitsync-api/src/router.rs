use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    documents, health, heartbeat, imports, kits, queue, templates, tokens, transfer,
};
use crate::AppState;

/// All API routes under `/api/v1`, plus `/health`.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Remote catalog
        .route("/templates", get(templates::list_templates))
        .route("/templates/:id", get(templates::get_template))
        // Editor kit operations
        .route("/tokens/get", post(tokens::get_tokens))
        .route("/tokens/apply", post(tokens::apply_tokens))
        .route("/tokens/save", post(tokens::save_tokens))
        .route("/tokens/update", post(tokens::update_tokens))
        .route("/tokens/reset", post(tokens::reset_tokens))
        // Stale queue
        .route("/kit-queue/remove", post(queue::remove_from_queue))
        .route("/kit-queue/:document_id", get(queue::queue_status))
        .route("/heartbeat", get(heartbeat::heartbeat_events))
        .route("/heartbeat/snapshot", get(heartbeat::heartbeat_snapshot))
        // Kits
        .route("/kits", get(kits::list_kits))
        .route("/kits/global", get(kits::get_global).put(kits::set_global))
        .route("/kits/import", post(transfer::import_kits))
        .route("/kits/export", post(transfer::export_kits))
        .route("/kits/:id", get(kits::get_kit).delete(kits::delete_kit))
        .route("/kits/:id/export", get(transfer::export_kit))
        // Documents
        .route("/documents/:id/binding", get(documents::get_binding))
        .route("/documents/migrate", post(documents::migrate_document))
        // Template imports
        .route(
            "/imports",
            get(imports::list_imports).post(imports::record_import),
        );

    // Zip imports arrive base64-encoded inside JSON.
    let body_limit = state.config.max_import_bytes / 3 * 4 + 64 * 1024;

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
