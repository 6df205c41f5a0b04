use crate::domain::catalog::{Catalog, CatalogRecord};
use crate::domain::matching::{
    AgentMatch, AgentMatcher, MatchError, MatchReason, MatchRequest, StrategyKind,
};
use crate::runtime::matching::embedding::EmbeddingProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Text embedded for a record. Queries are embedded raw with the same
/// provider, so both sides share one vector space.
pub fn canonical_text(record: &CatalogRecord) -> String {
    let mut text = format!(
        "Name: {}. Description: {}. Skills: {}.",
        record.name,
        record.description,
        record.skills.join(", ")
    );
    if !record.technologies().is_empty() {
        text.push_str(&format!(
            " Technologies: {}.",
            record.technologies().join(", ")
        ));
    }
    text
}

fn normalized(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[derive(Debug, Clone)]
struct IndexEntry {
    id: String,
    text: String,
    vector: Vec<f32>,
}

/// Record id to unit-length vector, in catalog order.
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    entries: Vec<IndexEntry>,
}

impl EmbeddingIndex {
    /// True when the index was built from exactly this catalog content.
    pub fn covers(&self, catalog: &Catalog) -> bool {
        self.entries.len() == catalog.len()
            && self
                .entries
                .iter()
                .zip(catalog.records())
                .all(|(entry, record)| {
                    entry.id == record.id && entry.text == canonical_text(record)
                })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn vector(&self, id: &str) -> Option<&[f32]> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.vector.as_slice())
    }
}

/// Embedding-similarity matcher over a lazily built, cached index.
#[derive(Debug)]
pub struct SemanticMatcher {
    provider: Arc<dyn EmbeddingProvider>,
    index: RwLock<Option<Arc<EmbeddingIndex>>>,
    // Single writer for index builds.
    build_lock: Mutex<()>,
    threshold: f32,
}

impl SemanticMatcher {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, threshold: f32) -> Self {
        Self {
            provider,
            index: RwLock::new(None),
            build_lock: Mutex::new(()),
            threshold,
        }
    }

    async fn cached_for(&self, catalog: &Catalog) -> Option<Arc<EmbeddingIndex>> {
        self.index
            .read()
            .await
            .as_ref()
            .filter(|index| index.covers(catalog))
            .map(Arc::clone)
    }

    /// Returns the index for `catalog`, building it if the cached one was
    /// built from different content.
    #[instrument(skip_all, fields(records = catalog.len()))]
    pub async fn build_index(&self, catalog: &Catalog) -> Result<Arc<EmbeddingIndex>, MatchError> {
        if let Some(index) = self.cached_for(catalog).await {
            return Ok(index);
        }

        let _build = self.build_lock.lock().await;
        // Another caller may have finished the same build while we waited.
        if let Some(index) = self.cached_for(catalog).await {
            debug!("Reusing index built by a concurrent caller");
            return Ok(index);
        }

        self.provider.initialize().await?;

        let texts: Vec<String> = catalog.records().iter().map(canonical_text).collect();
        info!("Generating embeddings for {} agents...", texts.len());
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.provider.embed(texts.clone()).await?
        };

        if vectors.len() != texts.len() {
            return Err(MatchError::ModelUnavailable(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        let entries = catalog
            .records()
            .iter()
            .zip(texts)
            .zip(vectors)
            .map(|((record, text), vector)| IndexEntry {
                id: record.id.clone(),
                text,
                vector: normalized(vector),
            })
            .collect();
        let index = Arc::new(EmbeddingIndex { entries });

        // Published only once complete.
        *self.index.write().await = Some(Arc::clone(&index));
        info!("Agent vector index built.");
        Ok(index)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, MatchError> {
        self.provider.initialize().await?;
        let embeddings = self.provider.embed(vec![query.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .map(normalized)
            .ok_or_else(|| MatchError::ModelUnavailable("no embedding generated".to_string()))
    }
}

#[async_trait]
impl AgentMatcher for SemanticMatcher {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Semantic
    }

    async fn try_match<'a>(
        &self,
        request: &MatchRequest<'a>,
    ) -> Result<Option<AgentMatch<'a>>, MatchError> {
        if request.query.trim().is_empty() {
            return Ok(None);
        }

        let index = self.build_index(request.catalog).await?;
        if index.is_empty() {
            return Ok(None);
        }
        let query_embedding = self.embed_query(request.query).await?;

        let mut best: Option<(&IndexEntry, f32)> = None;
        for entry in &index.entries {
            let score = cosine_similarity(&query_embedding, &entry.vector);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((entry, score));
            }
        }

        let Some((entry, score)) = best else {
            return Ok(None);
        };
        if score < self.threshold {
            debug!(score, threshold = self.threshold, "Best similarity below threshold");
            return Ok(None);
        }

        match request.catalog.get(&entry.id) {
            Some(record) => Ok(Some(AgentMatch {
                record,
                reason: MatchReason::VectorSimilarity(score),
            })),
            None => {
                warn!(id = %entry.id, "Indexed id missing from catalog");
                Err(MatchError::UnknownRecordReference(entry.id.clone()))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::catalog::tests::record;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Deterministic bag-of-letters embedding with call counters.
    #[derive(Debug, Default)]
    pub(crate) struct FakeProvider {
        pub(crate) initializations: AtomicUsize,
        pub(crate) embedded_texts: AtomicUsize,
        pub(crate) fail: AtomicBool,
        pub(crate) fail_embed: AtomicBool,
        ready: AtomicBool,
    }

    impl FakeProvider {
        pub(crate) fn failing() -> Self {
            let provider = Self::default();
            provider.fail.store(true, Ordering::SeqCst);
            provider
        }

        fn vectorize(text: &str) -> Vec<f32> {
            let mut v = vec![0.0; 26];
            for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
                if word.len() > 3 {
                    for b in word.bytes().filter(u8::is_ascii_lowercase) {
                        v[usize::from(b - b'a')] += 1.0;
                    }
                }
            }
            v
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeProvider {
        async fn initialize(&self) -> Result<(), MatchError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MatchError::ModelUnavailable("offline".to_string()));
            }
            if !self.ready.swap(true, Ordering::SeqCst) {
                self.initializations.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Ok(())
        }

        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MatchError> {
            self.embedded_texts.fetch_add(texts.len(), Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.fail_embed.load(Ordering::SeqCst) {
                return Err(MatchError::ModelUnavailable("embedding failed".to_string()));
            }
            Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            record(
                "lead-gen",
                "Lead Generation Bot",
                "Finds potential leads",
                &["Lead Generation"],
            ),
            record(
                "crm",
                "CRM Sync",
                "Synchronizes customer contacts",
                &["CRM", "Data Synchronization"],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_canonical_text() {
        let mut r = record("x", "Poster", "Posts things", &["Social Media", "Automation"]);
        assert_eq!(
            canonical_text(&r),
            "Name: Poster. Description: Posts things. Skills: Social Media, Automation."
        );
        r.technologies = Some(vec!["N8N".to_string()]);
        assert!(canonical_text(&r).ends_with(" Technologies: N8N."));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_index_built_once_for_unchanged_catalog() {
        let provider = Arc::new(FakeProvider::default());
        let matcher = SemanticMatcher::new(provider.clone(), 0.3);
        let catalog = catalog();
        let request = MatchRequest {
            query: "synchronize my customer contacts",
            catalog: &catalog,
            credential: None,
        };

        let first = matcher.try_match(&request).await.unwrap().unwrap();
        let second = matcher.try_match(&request).await.unwrap().unwrap();

        assert_eq!(first.record.id, "crm");
        assert_eq!(first.record.id, second.record.id);
        assert_eq!(first.reason, second.reason);
        assert_eq!(provider.initializations.load(Ordering::SeqCst), 1);
        // Two records indexed once, plus one query embedding per call.
        assert_eq!(provider.embedded_texts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_concurrent_builds_share_one_index() {
        let provider = Arc::new(FakeProvider::default());
        let matcher = SemanticMatcher::new(provider.clone(), 0.3);
        let catalog = catalog();

        let (a, b) = tokio::join!(matcher.build_index(&catalog), matcher.build_index(&catalog));

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(provider.initializations.load(Ordering::SeqCst), 1);
        assert_eq!(provider.embedded_texts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_index_rebuilt_when_catalog_grows() {
        let provider = Arc::new(FakeProvider::default());
        let matcher = SemanticMatcher::new(provider.clone(), 0.3);
        let catalog = catalog();

        let before = matcher.build_index(&catalog).await.unwrap();
        let grown = catalog
            .with_record(record(
                "custom-1",
                "Spacesuit Cat Image Agent",
                "Generates images",
                &["Custom"],
            ))
            .unwrap();
        let after = matcher.build_index(&grown).await.unwrap();

        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 3);
        assert!(after.covers(&grown));
        assert!(!after.covers(&catalog));
        assert!(after.vector("custom-1").is_some());
    }

    fn grown(catalog: &Catalog) -> Catalog {
        catalog
            .with_record(record(
                "custom-1",
                "Spacesuit Cat Image Agent",
                "Generates images",
                &["Custom"],
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_index() {
        let provider = Arc::new(FakeProvider::default());
        let matcher = SemanticMatcher::new(provider.clone(), 0.3);
        let catalog = catalog();
        let before = matcher.build_index(&catalog).await.unwrap();

        provider.fail_embed.store(true, Ordering::SeqCst);
        assert!(matches!(
            matcher.build_index(&grown(&catalog)).await,
            Err(MatchError::ModelUnavailable(_))
        ));

        let cached = matcher.index.read().await.clone().unwrap();
        assert!(Arc::ptr_eq(&cached, &before));
        assert!(cached.covers(&catalog));
        assert_eq!(cached.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_rebuild_keeps_previous_index() {
        let provider = Arc::new(FakeProvider::default());
        let matcher = SemanticMatcher::new(provider.clone(), 0.3);
        let catalog = catalog();
        let before = matcher.build_index(&catalog).await.unwrap();
        let grown = grown(&catalog);

        // Embedding takes 5ms, so the build is dropped mid-flight.
        let cancelled =
            tokio::time::timeout(Duration::from_millis(1), matcher.build_index(&grown)).await;
        assert!(cancelled.is_err());

        let cached = matcher.index.read().await.clone().unwrap();
        assert!(Arc::ptr_eq(&cached, &before));
        assert_eq!(cached.len(), 2);

        // The build lock was released with the dropped future.
        let after = matcher.build_index(&grown).await.unwrap();
        assert_eq!(after.len(), 3);
    }

    #[tokio::test]
    async fn test_low_similarity_is_no_match() {
        let matcher = SemanticMatcher::new(Arc::new(FakeProvider::default()), 0.99);
        let catalog = catalog();
        let request = MatchRequest {
            query: "zzzz qqqq",
            catalog: &catalog,
            credential: None,
        };

        assert!(matcher.try_match(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_model_failure_is_distinguishable() {
        let matcher = SemanticMatcher::new(Arc::new(FakeProvider::failing()), 0.3);
        let catalog = catalog();
        let request = MatchRequest {
            query: "find leads",
            catalog: &catalog,
            credential: None,
        };

        assert!(matches!(
            matcher.try_match(&request).await,
            Err(MatchError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_query_is_no_match() {
        let provider = Arc::new(FakeProvider::default());
        let matcher = SemanticMatcher::new(provider.clone(), 0.3);
        let catalog = catalog();
        let request = MatchRequest {
            query: "  ",
            catalog: &catalog,
            credential: None,
        };

        assert!(matcher.try_match(&request).await.unwrap().is_none());
        assert_eq!(provider.initializations.load(Ordering::SeqCst), 0);
    }
}
