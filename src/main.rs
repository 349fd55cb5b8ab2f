//! Persona Relay - personal-assistant chat relay
//!
//! Answers messages from a chat endpoint and a WhatsApp-style webhook by
//! forwarding them, wrapped in a persona prompt, to a hosted LLM (Groq,
//! OpenAI or Hugging Face). Conversations are kept per session and
//! snapshotted to disk.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod providers;
mod routes;

use crate::config::{Config, PersonaProfile, PromptBuilder};
use crate::core::{ChatEngine, ConversationStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chat_engine: Arc<ChatEngine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persona_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let profile = match config.persona_profile {
        Some(ref path) => {
            tracing::info!(path = %path.display(), "Loading persona profile");
            PersonaProfile::load_from_file(path).await?
        }
        None => PersonaProfile::builtin(),
    };
    let prompts = PromptBuilder::new(profile)?;

    let provider = providers::from_config(&config)?;
    tracing::info!(provider = provider.name(), "LLM provider ready");

    let store = Arc::new(
        ConversationStore::load(config.memory.snapshot_path(), config.memory.max_turns).await,
    );
    let flusher = store
        .clone()
        .spawn_flusher(Duration::from_secs(config.memory.flush_interval_secs));

    let chat_engine = Arc::new(
        ChatEngine::new(provider, store.clone(), prompts)
            .with_history_window(config.memory.history_window),
    );

    let production = config.production;
    let state = AppState {
        config: Arc::new(config),
        chat_engine,
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CatchPanicLayer::custom(move |err: Box<dyn Any + Send + 'static>| {
            routes::handle_panic(err, production)
        }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("🔥 Persona relay running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    flusher.abort();
    match store.flush().await {
        Ok(sessions) => tracing::info!(
            sessions,
            path = %store.snapshot_path().display(),
            "Saved conversations before exit"
        ),
        Err(e) => tracing::error!(error = %e, "Final conversation flush failed"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, closing HTTP server");
}
