mod auth;
mod bland;
mod bland_types;
mod config;
mod db;
mod db_types;
mod error;
mod handlers;
mod ratelimit;
mod tasks;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::prelude::*;

use crate::bland::BlandClient;
use crate::config::Config;
use crate::ratelimit::RateLimiter;
use crate::types::AppState;

pub mod consts {
    pub const DEFAULT_TASK: &str = "Say hello and ask how they are.";
    pub const DEFAULT_VOICE: &str = "maya";
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;
    pub const DEFAULT_INTERRUPTION_THRESHOLD: f64 = 0.5;
    pub const DEFAULT_RECORD_URL: &str = "placeholder_url";
    pub const DEFAULT_CALLER_ID: &str = "+1234567890";
    pub const DEFAULT_BALANCE: i32 = 10;
    pub const DEFAULT_PASSWORD: &str = "defaultpassword";
    pub const BCRYPT_COST: u32 = 10;
    pub const RATE_LIMIT_MAX_REQUESTS: u32 = 100;
    pub const RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            ("bland_rs", tracing_subscriber::filter::LevelFilter::DEBUG),
        ]));
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let config = Config::from_env();
    let port = config.port;

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    sqlx::migrate!()
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let http_client = reqwest::Client::new();
    let bland = BlandClient::new(http_client, &config);
    let mailer = tasks::build_mailer(&config);
    let rate_limiter = RateLimiter::new(
        consts::RATE_LIMIT_MAX_REQUESTS,
        Duration::from_secs(consts::RATE_LIMIT_WINDOW_SECS),
    );

    let app_state = Arc::new(AppState {
        config,
        bland,
        mailer,
        db_pool,
        rate_limiter,
    });

    let admin_routes = Router::new()
        .route("/admin/add-user", post(handlers::admin_add_user))
        .route("/admin/stats", get(handlers::get_admin_stats))
        .route_layer(middleware::from_fn(auth::require_admin));

    let protected_routes = Router::new()
        .route("/add-user", post(handlers::add_user))
        .route("/users", get(handlers::get_users))
        .route("/send-call", post(handlers::send_call))
        .route("/analyze-call/:call_id", post(handlers::analyze_call))
        .route("/call-logs", get(handlers::get_call_logs))
        .route("/stop-call/:call_id", post(handlers::stop_call))
        .route("/get-transcript", get(handlers::get_transcript))
        .route("/calls/:user_id", get(handlers::get_user_calls))
        .route("/user-stats/:user_id", get(handlers::get_user_stats))
        .route("/voices", get(handlers::get_voices))
        .route("/download-recording/:call_id", get(handlers::download_recording))
        .route("/report-call/:call_id", post(handlers::report_call))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/login", post(handlers::login))
        .merge(protected_routes);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            ratelimit::rate_limit_middleware,
        ))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server running on port {port}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .unwrap();
}
