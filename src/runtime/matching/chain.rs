//! Strategy selection and fallback.
//!
//! Per call the plan is one of:
//!
//! - credential present and LLM configured: LLM, then keyword
//! - semantic configured: semantic, then keyword
//! - otherwise: keyword
//!
//! Strategies are tried in order and the first `Ok` wins, including an
//! `Ok(None)` "no match". Errors are logged and swallowed; the keyword
//! strategy at the end of every plan cannot fail.

use crate::domain::catalog::Catalog;
use crate::domain::matching::{AgentMatch, AgentMatcher, MatchError, MatchRequest};
use crate::runtime::matching::keyword::{KeywordMatcher, tokenize};
use crate::runtime::matching::llm::LlmMatcher;
use crate::runtime::matching::vector::SemanticMatcher;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct Matchmaker {
    keyword: Arc<KeywordMatcher>,
    semantic: Option<Arc<SemanticMatcher>>,
    llm: Option<Arc<LlmMatcher>>,
}

impl Matchmaker {
    pub fn new(keyword: KeywordMatcher) -> Self {
        Self {
            keyword: Arc::new(keyword),
            semantic: None,
            llm: None,
        }
    }

    #[must_use]
    pub fn with_semantic(mut self, semantic: SemanticMatcher) -> Self {
        self.semantic = Some(Arc::new(semantic));
        self
    }

    #[must_use]
    pub fn with_llm(mut self, llm: LlmMatcher) -> Self {
        self.llm = Some(Arc::new(llm));
        self
    }

    pub fn semantic(&self) -> Option<&SemanticMatcher> {
        self.semantic.as_deref()
    }

    /// Ordered strategies for a call with or without a credential.
    pub fn plan(&self, has_credential: bool) -> Vec<&dyn AgentMatcher> {
        let mut plan: Vec<&dyn AgentMatcher> = Vec::with_capacity(2);
        match (&self.llm, &self.semantic) {
            (Some(llm), _) if has_credential => plan.push(llm.as_ref()),
            (_, Some(semantic)) => plan.push(semantic.as_ref()),
            _ => {}
        }
        plan.push(self.keyword.as_ref());
        plan
    }

    /// Finds the single best record for `query`, or `None`.
    #[instrument(skip(self, catalog, credential), fields(records = catalog.len()))]
    pub async fn find_best_match<'a>(
        &self,
        query: &'a str,
        catalog: &'a Catalog,
        credential: Option<&'a str>,
    ) -> Option<AgentMatch<'a>> {
        if tokenize(query).is_empty() {
            debug!(error = %MatchError::InvalidQuery, "No match");
            return None;
        }

        let request = MatchRequest {
            query,
            catalog,
            credential: credential.filter(|c| !c.trim().is_empty()),
        };

        for strategy in self.plan(request.credential.is_some()) {
            match strategy.try_match(&request).await {
                Ok(found) => {
                    info!(
                        name: "match.completed",
                        strategy = ?strategy.kind(),
                        agent_id = found.as_ref().map(|m| m.record.id.as_str()),
                        "Match completed"
                    );
                    return found;
                }
                Err(e) => {
                    warn!(
                        name: "match.strategy.failed",
                        strategy = ?strategy.kind(),
                        error = %e,
                        "Strategy failed, falling back"
                    );
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::matching::{MatchReason, StrategyKind};
    use crate::runtime::defaults::builtin_catalog;
    use crate::runtime::matching::llm::tests::ScriptedClient;
    use crate::runtime::matching::vector::tests::FakeProvider;

    fn kinds(plan: &[&dyn AgentMatcher]) -> Vec<StrategyKind> {
        plan.iter().map(|s| s.kind()).collect()
    }

    #[test]
    fn test_plan_order() {
        let keyword_only = Matchmaker::new(KeywordMatcher::default());
        assert_eq!(kinds(&keyword_only.plan(true)), [StrategyKind::Keyword]);

        let full = Matchmaker::new(KeywordMatcher::default())
            .with_semantic(SemanticMatcher::new(Arc::new(FakeProvider::default()), 0.3))
            .with_llm(LlmMatcher::new(Arc::new(ScriptedClient::replying("{}"))));
        assert_eq!(
            kinds(&full.plan(true)),
            [StrategyKind::Llm, StrategyKind::Keyword]
        );
        assert_eq!(
            kinds(&full.plan(false)),
            [StrategyKind::Semantic, StrategyKind::Keyword]
        );
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_keyword_result() {
        let catalog = builtin_catalog();
        let keyword = Matchmaker::new(KeywordMatcher::default());
        let with_llm = Matchmaker::new(KeywordMatcher::default())
            .with_llm(LlmMatcher::new(Arc::new(ScriptedClient::failing(503))));

        for query in [
            "Find new leads for my startup",
            "Analyze the market for AI tools",
            "Create a Twitter thread from a blog post",
            "zzz qqq",
        ] {
            let expected = keyword
                .find_best_match(query, &catalog, None)
                .await
                .map(|m| m.record.id.clone());
            let actual = with_llm.find_best_match(query, &catalog, Some("key")).await;

            assert_eq!(actual.as_ref().map(|m| m.record.id.clone()), expected);
            if let Some(m) = actual {
                assert_eq!(m.reason.strategy(), StrategyKind::Keyword);
            }
        }
    }

    #[tokio::test]
    async fn test_llm_used_when_credential_present() {
        let catalog = builtin_catalog();
        let matchmaker = Matchmaker::new(KeywordMatcher::default()).with_llm(LlmMatcher::new(
            Arc::new(ScriptedClient::replying(r#"{"id": "make-crm-sync"}"#)),
        ));

        let with_key = matchmaker
            .find_best_match("keep my contacts in step", &catalog, Some("key"))
            .await
            .unwrap();
        assert_eq!(with_key.record.id, "make-crm-sync");
        assert_eq!(with_key.reason, MatchReason::LlmSelected);

        // Blank credentials count as absent.
        let blank = matchmaker
            .find_best_match("sync contacts", &catalog, Some("  "))
            .await
            .unwrap();
        assert_eq!(blank.reason.strategy(), StrategyKind::Keyword);
    }

    #[tokio::test]
    async fn test_semantic_failure_falls_back_to_keyword() {
        let catalog = builtin_catalog();
        let matchmaker = Matchmaker::new(KeywordMatcher::default())
            .with_semantic(SemanticMatcher::new(Arc::new(FakeProvider::failing()), 0.3));

        let found = matchmaker
            .find_best_match("post to social media", &catalog, None)
            .await
            .unwrap();
        assert_eq!(found.record.id, "n8n-social-poster");
        assert_eq!(found.reason.strategy(), StrategyKind::Keyword);
    }

    #[tokio::test]
    async fn test_semantic_preferred_without_credential() {
        let catalog = builtin_catalog();
        let provider = Arc::new(FakeProvider::default());
        let matchmaker = Matchmaker::new(KeywordMatcher::default())
            .with_semantic(SemanticMatcher::new(provider.clone(), 0.3));

        let first = matchmaker
            .find_best_match("analyze market trends and competitor strategies", &catalog, None)
            .await
            .unwrap();
        let second = matchmaker
            .find_best_match("analyze market trends and competitor strategies", &catalog, None)
            .await
            .unwrap();

        assert_eq!(first.reason.strategy(), StrategyKind::Semantic);
        assert_eq!(first.record.id, second.record.id);
        assert_eq!(
            provider
                .initializations
                .load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_empty_query_short_circuits_every_strategy() {
        let catalog = builtin_catalog();
        let client = Arc::new(ScriptedClient::replying(r#"{"id": "lead-gen-1"}"#));
        let matchmaker = Matchmaker::new(KeywordMatcher::default())
            .with_llm(LlmMatcher::new(client.clone()));

        assert!(matchmaker.find_best_match("", &catalog, Some("key")).await.is_none());
        assert!(matchmaker.find_best_match("a b", &catalog, Some("key")).await.is_none());
        assert!(client.prompts.lock().unwrap().is_empty());
    }
}
