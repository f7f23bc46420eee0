use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::info;

mod auth;
mod config;
mod database;
mod document;
mod handlers;
mod services;
mod state;
mod store;
mod utils;

use config::Settings;
use database::{DbPool, Repository};
use services::{Answerer, HttpEmbedder, HttpLlmClient, HttpReranker, IngestionCoordinator};
use state::AppState;
use store::VectorStore;
use utils::Limiters;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info,ragviet_core=debug".to_string()))
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("starting ragviet-core");

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };
    info!("configuration loaded");

    let db_pool = match DbPool::new(&settings.database).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to database");
            std::process::exit(1);
        }
    };
    info!("database connection established");

    let repository = Arc::new(Repository::new(db_pool.clone()));

    let embedder = match HttpEmbedder::probe(&settings.embedding).await {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "no embedding model candidate responded");
            std::process::exit(1);
        }
    };

    let store = Arc::new(VectorStore::load_or_create(
        embedder.dimension(),
        settings.vector_store.index_path.clone(),
        settings.vector_store.metadata_path.clone(),
    ));

    let reranker = Arc::new(HttpReranker::new(&settings.reranker));
    let llm = Arc::new(HttpLlmClient::new(&settings.llm));
    let limiters = Arc::new(Limiters::new(&settings.limits));

    let answerer = Arc::new(Answerer::new(
        store.clone(),
        embedder.clone(),
        reranker.clone(),
        llm.clone(),
        repository.clone(),
        settings.rag.clone(),
        &settings.llm,
    ));

    let ingestion = Arc::new(IngestionCoordinator::new(
        store.clone(),
        embedder.clone(),
        repository.clone(),
        settings.rag.chunk_size,
        settings.rag.chunk_overlap,
        limiters.clone(),
    ));

    let app_state = AppState {
        db_pool,
        repository,
        store,
        embedder,
        reranker,
        llm,
        answerer,
        ingestion,
        settings: settings.clone(),
        limiters,
    };

    let app = build_router(app_state);

    let addr = SocketAddr::from((settings.server.host.parse::<std::net::IpAddr>()?, settings.server.port));
    info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/forgot-password", post(handlers::auth::forgot_password))
        .route("/auth/reset-password", post(handlers::auth::reset_password));

    let protected_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/verify-session", post(handlers::auth::verify_session))
        .route("/chat/sessions", get(handlers::chat::list_sessions))
        .route("/chat/sessions/create", post(handlers::chat::create_session))
        .route("/chat/history/{session_id}", get(handlers::chat::history))
        .route("/files/list", get(handlers::files::list))
        .route("/files/delete", post(handlers::files::delete))
        .route("/files/clear-all", post(handlers::files::clear_all))
        .route("/files/view/{filename}", get(handlers::files::view))
        .route("/files/upload", post(handlers::files::upload))
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024));

    // /chat/send resolves auth from header/cookie/body itself (see
    // auth::session::resolve_authenticated_user), so it is not gated by the
    // AuthenticatedUser extractor at the router level.
    let chat_send_route = Router::new().route("/chat/send", post(handlers::chat::send));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(chat_send_route)
        .layer(
            CorsLayer::permissive()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default().include_headers(true)))
        .with_state(state)
}
