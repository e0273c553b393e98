use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use apify_client::ApifyClient;
use leadvault_common::AppConfig;
use leadvault_domains::dashboards::PgDashboardStore;
use leadvault_domains::profiles::PgProfileStore;
use leadvault_domains::scraping::{ProfileScraper, ProfileSink, ScrapeOrchestrator, StoreProfileSink};
use leadvault_domains::users::PgUserStore;
use leadvault_domains::{DashboardStore, Ledger, ProfileService, ProfileStore, UserStore};

mod auth;
mod error;
mod jwt;
mod oauth;
mod rest;
mod sink;

use jwt::JwtService;
use oauth::GoogleOAuth;
use sink::HttpProfileSink;

pub struct AppState {
    pub config: AppConfig,
    pub jwt: JwtService,
    pub users: Arc<dyn UserStore>,
    pub ledger: Ledger,
    pub profiles: ProfileService,
    pub scraper: ScrapeOrchestrator,
    pub google: Option<GoogleOAuth>,
}

impl AppState {
    pub fn build(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        profile_store: Arc<dyn ProfileStore>,
        dashboard_store: Arc<dyn DashboardStore>,
        scraper: Arc<dyn ProfileScraper>,
    ) -> Self {
        let jwt = JwtService::from_config(&config);
        let ledger = Ledger::new(dashboard_store, profile_store.clone());
        let profiles = ProfileService::new(profile_store, ledger.clone());

        let sink: Arc<dyn ProfileSink> = match config.internal_api_url.as_deref() {
            Some(base) => {
                info!(base, "Scraped profiles persist through the HTTP profile endpoint");
                Arc::new(HttpProfileSink::new(base, jwt.clone()))
            }
            None => Arc::new(StoreProfileSink::new(profiles.clone())),
        };
        let google = config
            .google_oauth()
            .map(|(id, secret, redirect)| GoogleOAuth::new(id, secret, redirect));

        Self {
            scraper: ScrapeOrchestrator::new(scraper, sink, ledger.clone()),
            jwt,
            users,
            ledger,
            profiles,
            google,
            config,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        // Health check
        .route("/health", get(rest::health))
        // Auth
        .route("/api/auth/signup", post(rest::auth::signup))
        .route("/api/auth/login", post(rest::auth::login))
        .route("/api/auth/me", get(rest::auth::me))
        .route("/api/auth/refresh", post(rest::auth::refresh))
        .route("/api/auth/logout", post(rest::auth::logout))
        .route("/api/auth/oauth/google", get(rest::auth::google_start))
        .route("/api/auth/oauth/google/callback", get(rest::auth::google_callback))
        // Dashboard
        .route(
            "/api/dashboard",
            get(rest::dashboard::get_dashboard).put(rest::dashboard::update_dashboard),
        )
        .route("/api/dashboard/activity", post(rest::dashboard::append_activity))
        .route(
            "/api/dashboard/unlock/{profile_id}",
            post(rest::dashboard::unlock_contact),
        )
        // Profiles
        .route(
            "/api/profiles",
            get(rest::profiles::list_profiles).post(rest::profiles::create_profile),
        )
        .route(
            "/api/profiles/check-duplicate",
            post(rest::profiles::check_duplicate_profile),
        )
        .route(
            "/api/profiles/{id}",
            get(rest::profiles::get_profile)
                .put(rest::profiles::update_profile)
                .delete(rest::profiles::delete_profile),
        )
        // Scraping
        .route("/api/scrape/linkedin", post(rest::scrape::scrape_linkedin))
        .with_state(state)
        .layer(cors)
        // Tokens and contact details must not be cached
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path only (no query params, they may carry tokens)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("leadvault=info".parse()?)
                .add_directive("apify_client=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let config = AppConfig::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;
    info!("Connected to database");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("Migrations applied");

    let mut apify = ApifyClient::new(config.apify_api_token.clone());
    if let Some(actor) = &config.apify_linkedin_actor {
        apify = apify.with_actor(actor.clone());
    }

    let addr = format!("{}:{}", config.web_host, config.web_port);
    let state = Arc::new(AppState::build(
        config,
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgProfileStore::new(pool.clone())),
        Arc::new(PgDashboardStore::new(pool)),
        Arc::new(apify),
    ));
    if state.google.is_none() {
        info!("Google sign-in disabled (GOOGLE_CLIENT_ID/SECRET/REDIRECT_URL not set)");
    }

    let app = router(state);

    info!("LeadVault API starting on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
