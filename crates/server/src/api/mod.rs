//! HTTP API.
//!
//! - `users`, `clinics`, `user_cards`, `diseases`, `appointments`, `shifts` -
//!   clinic management under `/api/*`, authenticated with OAuth2 access tokens
//! - `/oauth2/*` and `/.well-known/openid-configuration` - token issuance
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod appointments;
pub mod auth;
pub mod clinics;
pub mod diseases;
pub mod health;
pub mod openapi;
pub mod shifts;
pub mod user_cards;
pub mod users;

pub use health::MISC_TAG;

use crate::AppResources;
use crate::oauth2::{self, OAuth2State};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Assemble the full application router, including the Redoc UI at `/api-docs`.
pub fn app(app_resources: AppResources) -> axum::Router {
    let oauth2_state = OAuth2State::new(app_resources.db.clone(), &app_resources.config.oauth2);

    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/api/users", users::router())
        .nest("/api/clinics", clinics::router())
        .nest("/api/user-cards", user_cards::router())
        .nest("/api/diseases", diseases::router())
        .nest("/api/appointments", appointments::router())
        .nest("/api/shifts", shifts::router())
        .nest("/oauth2", oauth2::router(oauth2_state.clone()))
        .merge(oauth2::discovery_router(oauth2_state))
        .routes(routes!(health::health))
        .layer(axum::Extension(app_resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(app_resources))]
pub async fn start_webserver(app_resources: AppResources) -> color_eyre::Result<()> {
    let addr = app_resources.config.listen_addr;
    let router = app(app_resources);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
