use crate::domain::catalog::{Catalog, CatalogRecord};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Which strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Llm,
    Semantic,
    Keyword,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchReason {
    KeywordOverlap { score: u32 },
    VectorSimilarity(f32),
    LlmSelected,
}

impl MatchReason {
    pub fn strategy(&self) -> StrategyKind {
        match self {
            Self::KeywordOverlap { .. } => StrategyKind::Keyword,
            Self::VectorSimilarity(_) => StrategyKind::Semantic,
            Self::LlmSelected => StrategyKind::Llm,
        }
    }

    /// Numeric score for display. LLM selections carry no score.
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self) -> Option<f32> {
        match self {
            Self::KeywordOverlap { score } => Some(*score as f32),
            Self::VectorSimilarity(s) => Some(*s),
            Self::LlmSelected => None,
        }
    }
}

/// The single best record for a query. Borrows from the catalog snapshot
/// the match ran against.
#[derive(Debug, Clone)]
pub struct AgentMatch<'c> {
    pub record: &'c CatalogRecord,
    pub reason: MatchReason,
}

/// Input to one match attempt.
#[derive(Debug, Clone, Copy)]
pub struct MatchRequest<'a> {
    pub query: &'a str,
    pub catalog: &'a Catalog,
    /// Credential for the hosted model, if the user saved one.
    pub credential: Option<&'a str>,
}

/// Failures from the hosted model boundary.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("no credential configured")]
    MissingCredential,

    #[error("credential rejected (HTTP {0})")]
    Unauthorized(u16),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unparseable response: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("query has no usable terms")]
    InvalidQuery,

    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("upstream model failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("selected record {0} is not in the catalog")]
    UnknownRecordReference(String),
}

/// One self-contained matching algorithm.
///
/// `Ok(None)` is a definitive "no match". `Err` means the strategy could not
/// answer and the caller may try another.
#[async_trait]
pub trait AgentMatcher: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> StrategyKind;

    async fn try_match<'a>(
        &self,
        request: &MatchRequest<'a>,
    ) -> Result<Option<AgentMatch<'a>>, MatchError>;
}
