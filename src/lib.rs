// Library exports for the API binary, the CLI tools and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use config::Config;
use db::PgStore;
use middleware::auth::JwtSecret;
use services::scheduler::NotificationClock;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<PgStore>,
    pub clock: Arc<NotificationClock>,
}

pub fn router(state: AppState) -> Router {
    let jwt_secret = JwtSecret(state.config.jwt_secret.clone());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Weekly menus
        .route("/menus", get(routes::menu::list_menus).post(routes::menu::create_menu))
        .route("/menus/current", get(routes::menu::get_current))
        .route("/menus/week/{start}", get(routes::menu::get_week))
        .route(
            "/menus/{id}",
            get(routes::menu::get_menu)
                .put(routes::menu::update_menu)
                .delete(routes::menu::delete_menu),
        )
        .route("/menus/{id}/duplicate", post(routes::menu::duplicate_menu))
        .route("/menus/slots/assign", post(routes::menu::assign_slot))
        .route("/menus/slots/move", post(routes::menu::move_slot))
        .route("/menus/slots/notes", post(routes::menu::update_slot_notes))
        .route("/menus/slots/remove", post(routes::menu::remove_from_slot))
        .route("/menus/auto-assign", post(routes::menu::auto_assign))
        .route("/menus/fill-missing", post(routes::menu::fill_missing))
        // Notifications
        .route(
            "/notifications/preferences",
            get(routes::notifications::get_preferences).put(routes::notifications::update_preferences),
        )
        .route("/notifications/toggle", post(routes::notifications::toggle))
        .route("/notifications/meal-times", put(routes::notifications::update_meal_times))
        .route("/notifications/timezone", put(routes::notifications::update_timezone))
        .route("/notifications/test", post(routes::notifications::send_test))
        .route("/notifications/next-meal", post(routes::notifications::send_next_meal))
        .route("/notifications/status", get(routes::notifications::status))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
