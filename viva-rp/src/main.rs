//! viva-rp - Response Pipeline Microservice
//!
//! Tracks a candidate's interview attempt from call registration through
//! transcript capture to AI-generated scoring, and stays correct under
//! concurrent, out-of-order and retried triggers (webhooks, client polls,
//! operator actions).

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use viva_common::events::EventBus;

use viva_rp::providers::{CompletionScoringClient, VoiceGatewayClient};
use viva_rp::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting viva-rp (Response Pipeline) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load TOML configuration (missing file is fine)
    let toml_config = viva_common::config::load_toml_config(None)
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Open or create the database
    let db_path = viva_rp::config::resolve_database_path(&toml_config);
    info!("Database: {}", db_path.display());
    let db_pool = viva_rp::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Resolve secrets and provider credentials (Database -> ENV -> TOML)
    let webhook_secret = viva_rp::config::resolve_webhook_secret(&db_pool, &toml_config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to resolve webhook secret: {}", e))?;
    let providers = viva_rp::config::resolve_provider_config(&db_pool, &toml_config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to resolve provider configuration: {}", e))?;

    // Construct provider clients; components receive these handles
    // explicitly rather than reaching for globals.
    let voice = Arc::new(VoiceGatewayClient::new(
        providers.voice_base_url.clone(),
        &providers.voice_api_key,
    ));
    let scoring = Arc::new(CompletionScoringClient::new(
        providers.scoring_base_url.clone(),
        &providers.scoring_api_key,
        providers.scoring_model.clone(),
    ));
    info!(
        voice_base_url = %providers.voice_base_url,
        scoring_model = %providers.scoring_model,
        "Provider clients initialized"
    );

    // Event bus for SSE broadcasting
    let event_bus = EventBus::new(100);

    let state = AppState::new(db_pool, event_bus, voice, scoring, webhook_secret);
    let app = viva_rp::build_router(state);

    // Start server
    let port = viva_rp::config::resolve_port(&toml_config);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
