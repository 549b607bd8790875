//! HTTP server: shared state, routes, and startup.
//!
//! [`build_router`] is separate from [`serve`] so tests can drive the routes
//! with in-memory stores and stub providers.

pub mod error;
pub mod handlers;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ConciergeConfig;
use crate::conversation::{self, ConversationStore};
use crate::db;
use crate::embedding;
use crate::events::EventRetriever;
use crate::game::GameRegistry;
use crate::inference::huggingface::HfInferenceClient;
use crate::inference::InferenceProvider;

pub use error::ApiError;

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub conversations: ConversationStore,
    pub events: EventRetriever,
    pub games: GameRegistry,
    pub inference: Arc<dyn InferenceProvider>,
    pub config: Arc<ConciergeConfig>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/api/data", post(handlers::chat))
        .route("/api/game/start", post(handlers::start_game))
        .route("/api/game/question", post(handlers::ask_question))
        .route("/api/game/guess", post(handlers::make_guess))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the database, build providers, and assemble the shared state.
fn setup_state(config: ConciergeConfig) -> Result<AppState> {
    // fail before touching the model files if the endpoint cannot be called
    let inference: Arc<dyn InferenceProvider> =
        Arc::new(HfInferenceClient::from_config(&config.inference)?);
    tracing::info!(model = inference.model(), "inference client ready");

    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    if let Ok(Some(stored_model)) = db::migrations::get_embedding_model(&conn) {
        if stored_model != config.embedding.model {
            tracing::warn!(
                stored = %stored_model,
                configured = %config.embedding.model,
                "embedding model changed, run `concierge index` again to rebuild event vectors"
            );
        }
    }

    let db = Arc::new(Mutex::new(conn));
    let provider = embedding::create_provider(&config.embedding)?;
    let embedding: Arc<dyn embedding::EmbeddingProvider> = Arc::from(provider);
    tracing::info!("embedding provider ready");

    let games = GameRegistry::new(config.game.min_year, config.game.max_year)?;

    Ok(AppState {
        conversations: ConversationStore::new(Arc::clone(&db), config.sessions.ttl()),
        events: EventRetriever::new(db, embedding),
        games,
        inference,
        config: Arc::new(config),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c, shutdown signal disabled");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down HTTP server");
}

/// Run the HTTP server until Ctrl-C.
pub async fn serve(config: ConciergeConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let sweep_every = config.sessions.sweep_interval();

    let state = setup_state(config)?;
    let sweeper = conversation::spawn_sweeper(state.conversations.clone(), sweep_every);

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "concierge listening at http://{bind_addr}/");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    Ok(())
}
