pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::export::handlers as export_handlers;
use crate::state::AppState;
use crate::surface::handlers as surface_handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Surface API: the UI layer parks rendered previews here
        .route(
            "/api/v1/surfaces",
            post(surface_handlers::handle_register_surface),
        )
        .route(
            "/api/v1/surfaces/:id",
            get(surface_handlers::handle_get_surface)
                .delete(surface_handlers::handle_remove_surface),
        )
        // Export API: the pipeline itself
        .route("/api/v1/export", post(export_handlers::handle_export))
        .route(
            "/api/v1/export/:surface_id/last",
            get(export_handlers::handle_last_export),
        )
        .route(
            "/api/v1/export/files/:filename",
            get(export_handlers::handle_download),
        )
        .with_state(state)
}
