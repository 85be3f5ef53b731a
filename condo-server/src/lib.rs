//! condo-server library - REST API and browser UI for the condo ledger

use axum::Router;
use condo_common::config::AuthSettings;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod extract;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Session and access settings
    pub auth: AuthSettings,
}

impl AppState {
    pub fn new(db: SqlitePool, auth: AuthSettings) -> Self {
        Self { db, auth }
    }
}

/// Build application router
///
/// Health, build info, login and the UI are public; every other `/api`
/// route goes through the session middleware.
pub fn build_router(state: AppState, cors_permissive: bool) -> Router {
    use axum::middleware;
    use axum::routing::{get, post, put};

    let protected = Router::new()
        .route("/api/units", get(api::units::list_units).post(api::units::create_unit))
        .route(
            "/api/units/:id",
            get(api::units::get_unit)
                .put(api::units::update_unit)
                .delete(api::units::delete_unit),
        )
        .route("/api/units/:id/people", get(api::units::unit_people))
        .route("/api/people", get(api::people::list_people).post(api::people::create_person))
        .route(
            "/api/people/:id",
            get(api::people::get_person)
                .put(api::people::update_person)
                .delete(api::people::delete_person),
        )
        .route(
            "/api/expenses",
            get(api::expenses::list_expenses).post(api::expenses::create_expense),
        )
        .route("/api/expenses/categories", get(api::expenses::category_totals))
        .route(
            "/api/expenses/:id",
            get(api::expenses::get_expense)
                .put(api::expenses::update_expense)
                .delete(api::expenses::delete_expense),
        )
        .route(
            "/api/revenue",
            get(api::revenue::list_revenue).post(api::revenue::create_revenue),
        )
        .route(
            "/api/revenue/:id",
            get(api::revenue::get_revenue)
                .put(api::revenue::update_revenue)
                .delete(api::revenue::delete_revenue),
        )
        .route("/api/budget/:year/lines", get(api::budget::list_lines))
        .route(
            "/api/budget/:year/lines/:category",
            put(api::budget::upsert_line).delete(api::budget::delete_line),
        )
        .route("/api/budget/:year/summary", get(api::budget::summary))
        .route("/api/reports/balances", get(api::reports::balances))
        .route("/api/reports/delinquent", get(api::reports::delinquent))
        .route("/api/auth/logout", post(api::auth::logout))
        .route("/api/auth/me", get(api::auth::me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::require_session,
        ));

    let public = Router::new()
        .route("/", get(api::ui::serve_index))
        .route("/static/app.js", get(api::ui::serve_app_js))
        .route("/api/buildinfo", get(api::buildinfo::get_build_info))
        .route("/api/auth/login", post(api::auth::login))
        .merge(api::health::health_routes());

    let router = Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
