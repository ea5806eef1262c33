//! Blood Bridge Backend
//!
//! REST backend that matches blood donors to blood requests, with SQLite persistence.

mod api;
mod auth;
mod compat;
mod config;
mod db;
mod errors;
mod geo;
mod lifecycle;
mod matching;
mod models;
mod notify;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::TokenVerifier;
use config::Config;
use db::Repository;
use geo::{DisabledGeocoder, Geocoder, HttpGeocoder};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub geocoder: Arc<dyn Geocoder>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Blood Bridge Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Match radius: {} km", config.match_radius_km);

    if config.jwt_secret.is_none() {
        tracing::warn!(
            "No JWT secret configured (BLOODBRIDGE_JWT_SECRET). All API requests will be rejected!"
        );
    }

    let geocoder: Arc<dyn Geocoder> = match &config.geocoder_url {
        Some(url) => {
            tracing::info!("Geocoder: {}", url);
            Arc::new(HttpGeocoder::new(url.clone(), config.geocoder_api_key.clone())?)
        }
        None => {
            tracing::warn!("No geocoder configured (BLOODBRIDGE_GEOCODER_URL). Addresses will not be resolved");
            Arc::new(DisabledGeocoder)
        }
    };

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool).with_cooldown(config.cooldown()));

    let state = AppState {
        repo,
        geocoder,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let verifier = state.config.jwt_secret.as_deref().map(TokenVerifier::new);

    // API routes
    let api_routes = Router::new()
        // Compatibility
        .route("/compatibility", get(api::get_compatibility))
        // Donors
        .route("/donors", get(api::list_donors))
        .route("/donors", post(api::upsert_donor))
        .route("/donors", delete(api::delete_my_donor))
        .route("/donors/me", get(api::get_my_donor))
        .route("/donors/availability", patch(api::update_availability))
        .route("/donors/last-donation", patch(api::update_last_donation))
        .route("/donors/donations", post(api::record_donation))
        .route("/donors/{id}", get(api::get_donor))
        .route("/donors/{id}", delete(api::delete_donor))
        // Requests
        .route("/requests", post(api::create_request))
        .route("/requests", get(api::list_requests))
        .route("/requests/{id}", get(api::get_request))
        .route("/requests/{id}/status", patch(api::update_request_status))
        .route("/requests/{id}/units", patch(api::record_units))
        .route("/requests/{id}/respond", post(api::respond_to_request))
        .route("/requests/{id}/close", patch(api::close_request))
        // Notifications
        .route("/notifications", get(api::list_notifications))
        .route(
            "/notifications/read-all",
            patch(api::mark_all_notifications_read),
        )
        .route(
            "/notifications/{id}/read",
            patch(api::mark_notification_read),
        )
        .route("/notifications/{id}", delete(api::delete_notification))
        // Maps
        .route("/maps/geocode", get(api::geocode_address))
        .route("/maps/hospitals", get(api::nearby_hospitals))
        .route("/maps/hospitals", post(api::create_hospital))
        // Apply bearer auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::bearer_auth_layer(verifier.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
