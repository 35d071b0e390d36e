//! Lead registry and outbound calling backend.
//!
//! Leads are upserted per owner; calls are placed through Retell and their
//! outcomes are cached locally the first time the provider reports analysis.

pub mod config;
pub mod db_types;
pub mod error;
pub mod handlers;
pub mod owner;
pub mod retell;
pub mod retell_types;
pub mod store;
pub mod types;
pub mod utils;

use crate::config::Config;
use crate::error::StartupError;
use crate::handlers::{calls, leads};
use crate::retell::{RetellClient, VoiceProvider};
use crate::store::{MemoryStore, PgStore, Store};
use crate::types::AppState;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod consts {
    /// Status a call carries between creation and the first provider refresh.
    pub const REGISTERED_STATUS: &str = "registered";
}

pub fn app(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/call-lead", post(calls::call_lead))
        .route("/call/:call_id", get(calls::get_call))
        .route("/create-batch-call", post(calls::create_batch_call))
        .route("/batch-calls", get(calls::list_batch_calls))
        .route("/leads", get(leads::get_leads))
        .route("/leads/bulk", post(leads::bulk_create_leads))
        .route(
            "/leads/:id_or_phone",
            put(leads::update_lead).delete(leads::delete_lead),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Wire the store and the provider client described by `config`.
pub async fn build_state(config: &Config) -> Result<Arc<AppState>, StartupError> {
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(url, config.database_max_connections).await?),
        None => {
            warn!("DATABASE_URL not set; leads and calls will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };
    let provider: Arc<dyn VoiceProvider> = Arc::new(RetellClient::new(
        &config.retell_base_url,
        &config.retell_api_key,
        config.retell_timeout,
    )?);

    Ok(Arc::new(AppState {
        store,
        provider,
        agent_id: config.agent_id.clone(),
        from_number: config.from_number.clone(),
    }))
}

pub async fn serve(config: &Config, app_state: Arc<AppState>) -> Result<(), StartupError> {
    let server = axum::Server::try_bind(&config.bind_addr)?;
    info!(addr=%config.bind_addr, "call-genie listening");
    server.serve(app(app_state).into_make_service()).await?;
    Ok(())
}
