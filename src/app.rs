use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/health", get(handlers::health))
        .route(
            "/api/students",
            get(handlers::list_roster)
                .post(handlers::create_student)
                .delete(handlers::remove_student),
        )
        .route("/api/students/all", delete(handlers::remove_all_students))
        .route("/api/students/:id", patch(handlers::edit_student))
        .route("/api/students/:id/events", get(handlers::get_events))
        .route("/api/students/:id/stats", get(handlers::get_stats))
        .route("/api/attendance", post(handlers::record))
        .route("/api/admin/settings", put(handlers::update_settings))
        .with_state(state)
}
