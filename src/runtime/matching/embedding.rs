//! Text embedding providers.
//!
//! The semantic matcher never owns a model directly; it is handed an
//! [`EmbeddingProvider`]. A provider loads its model at most once.

use crate::domain::matching::MatchError;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::OnceCell;
use tracing::info;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Loads the model. Repeated calls after a successful load are no-ops.
    async fn initialize(&self) -> Result<(), MatchError>;

    /// Embeds `texts` in order. Vectors are not guaranteed to be normalized.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MatchError>;

    fn is_ready(&self) -> bool;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub enabled: bool,
    /// One of `bge-small-en-v1.5`, `bge-base-en-v1.5`, `all-minilm-l6-v2`.
    pub model: String,
    pub min_similarity: f32,
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "bge-small-en-v1.5".to_string(),
            min_similarity: 0.3,
            cache_dir: None,
            show_download_progress: false,
        }
    }
}

/// Resolves a configured model name.
pub fn parse_model_name(name: &str) -> Option<EmbeddingModel> {
    match name.to_lowercase().as_str() {
        "bge-small-en-v1.5" => Some(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Some(EmbeddingModel::BGEBaseENV15),
        "all-minilm-l6-v2" => Some(EmbeddingModel::AllMiniLML6V2),
        _ => None,
    }
}

/// A model loaded at most once per process.
///
/// The load runs in a spawned task that owns a handle to the cell, so a
/// caller that is dropped mid-load neither cancels nor discards it.
pub(crate) struct LoadOnce<M> {
    cell: Arc<OnceCell<Arc<StdMutex<M>>>>,
}

impl<M> Default for LoadOnce<M> {
    fn default() -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
        }
    }
}

impl<M: Send + 'static> LoadOnce<M> {
    pub(crate) fn get(&self) -> Option<Arc<StdMutex<M>>> {
        self.cell.get().map(Arc::clone)
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Returns the loaded model, running `load` on the blocking pool if no
    /// load has succeeded yet. Concurrent callers wait for the same load.
    pub(crate) async fn get_or_load<F>(&self, load: F) -> Result<Arc<StdMutex<M>>, MatchError>
    where
        F: FnOnce() -> Result<M, String> + Send + 'static,
    {
        if let Some(model) = self.get() {
            return Ok(model);
        }

        let cell = Arc::clone(&self.cell);
        tokio::spawn(async move {
            cell.get_or_try_init(move || async move {
                tokio::task::spawn_blocking(load)
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|loaded| loaded.map(|model| Arc::new(StdMutex::new(model))))
            })
            .await
            .map(Arc::clone)
        })
        .await
        .map_err(|e| MatchError::ModelUnavailable(e.to_string()))?
        .map_err(MatchError::ModelUnavailable)
    }
}

/// In-process ONNX embeddings via `fastembed`.
pub struct FastEmbedProvider {
    model: LoadOnce<TextEmbedding>,
    model_name: EmbeddingModel,
    cache_dir: Option<PathBuf>,
    show_download_progress: bool,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl FastEmbedProvider {
    pub fn new(config: &SemanticConfig) -> Result<Self, MatchError> {
        let model_name = parse_model_name(&config.model).ok_or_else(|| {
            MatchError::ModelUnavailable(format!("unknown embedding model: {}", config.model))
        })?;

        Ok(Self {
            model: LoadOnce::default(),
            model_name,
            cache_dir: config.cache_dir.clone(),
            show_download_progress: config.show_download_progress,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn initialize(&self) -> Result<(), MatchError> {
        if self.model.is_loaded() {
            return Ok(());
        }

        let model_name = self.model_name.clone();
        let mut options = InitOptions::new(model_name.clone())
            .with_show_download_progress(self.show_download_progress);
        if let Some(dir) = &self.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }

        self.model
            .get_or_load(move || {
                info!(model = ?model_name, "Initializing fastembed model...");
                let model = TextEmbedding::try_new(options).map_err(|e| e.to_string())?;
                info!("Embedding model ready");
                Ok(model)
            })
            .await?;
        Ok(())
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MatchError> {
        let model = self
            .model
            .get()
            .ok_or_else(|| MatchError::ModelUnavailable("model not initialized".to_string()))?;

        tokio::task::spawn_blocking(move || {
            let mut model = model.lock().map_err(|e| e.to_string())?;
            model.embed(texts, None).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| MatchError::ModelUnavailable(e.to_string()))?
        .map_err(MatchError::ModelUnavailable)
    }

    fn is_ready(&self) -> bool {
        self.model.is_loaded()
    }
}
