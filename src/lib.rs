//! Agent Matcher
//!
//! Matches a free-text request to the single best agent in a marketplace
//! catalog.
//!
//! # Architecture
//!
//! - **Keyword strategy**: token overlap with the record text, always
//!   available
//! - **Semantic strategy**: cosine similarity over `fastembed` embeddings
//!   with a lazily built, cached index
//! - **LLM strategy**: a hosted model picks an id from a reduced listing
//! - **Fallback chain**: LLM or semantic first, keyword last
//! - **Server**: Axum JSON API for a browser UI
//!
//! # Modules
//!
//! - [`domain`]: catalog records, match results, strategy trait, errors
//! - [`runtime`]: the strategies, the fallback chain, the live catalog
//! - [`llm`]: Chat Completions client and provider detection
//! - [`credentials`]: local API key storage
//! - [`server`]: HTTP routes

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod credentials;
pub mod domain;
pub mod llm;
pub mod runtime;
pub mod server;
pub mod telemetry;

use crate::config::AppConfig;
use crate::credentials::CredentialStore;
use crate::llm::ChatCompletionsClient;
use crate::runtime::catalog_store::CatalogStore;
use crate::runtime::matching::{
    FastEmbedProvider, KeywordMatcher, LlmMatcher, Matchmaker, SemanticMatcher,
};
use std::sync::Arc;
use tracing::info;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Strategy chain used for every match request.
    pub matchmaker: Arc<Matchmaker>,
    /// Live catalog; each request matches against a snapshot.
    pub catalog: CatalogStore,
    /// Saved hosted-model credential.
    pub credentials: Arc<CredentialStore>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Composition root: wires strategies, catalog and key store from
    /// configuration.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let mut matchmaker = Matchmaker::new(KeywordMatcher::new(config.keyword.clone()));

        if config.semantic.enabled {
            let provider = Arc::new(FastEmbedProvider::new(&config.semantic)?);
            matchmaker = matchmaker.with_semantic(SemanticMatcher::new(
                provider,
                config.semantic.min_similarity,
            ));
            info!(model = %config.semantic.model, "Semantic matching enabled");
        }

        if config.llm.enabled {
            let client = Arc::new(ChatCompletionsClient::new(config.llm.clone())?);
            matchmaker = matchmaker.with_llm(LlmMatcher::new(client));
            info!(
                name: "llm.config.loaded",
                base_url = %config.llm.base_url,
                model = %config.llm.model,
                "LLM configuration loaded"
            );
        }

        let catalog = CatalogStore::load(config.catalog.path.as_deref()).await?;
        let credentials = Arc::new(CredentialStore::new(&config.credentials));

        Ok(Self {
            matchmaker: Arc::new(matchmaker),
            catalog,
            credentials,
            config: Arc::new(config),
        })
    }
}
