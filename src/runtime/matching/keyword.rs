//! Keyword-overlap matching.
//!
//! Scores each record by how many query tokens appear as substrings of the
//! record's text. Needs no model and no network, so it is the terminal
//! strategy of every fallback chain.

use crate::domain::catalog::{Catalog, CatalogRecord};
use crate::domain::matching::{
    AgentMatch, AgentMatcher, MatchError, MatchReason, MatchRequest, StrategyKind,
};
use async_trait::async_trait;
use serde::Deserialize;

/// Tokens this short or shorter are dropped.
const MAX_IGNORED_TOKEN_LEN: usize = 2;

/// How a token hit is turned into points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// One point per token found anywhere in the record text.
    #[default]
    Uniform,
    /// Points per field hit, see [`FieldWeights`].
    FieldWeighted,
}

/// Points awarded per token for each field it appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub skills: u32,
    pub name: u32,
    pub description: u32,
    pub technologies: u32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            skills: 5,
            name: 3,
            description: 1,
            technologies: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub scoring: ScoringMode,
    /// Scores at or below this are no match. Defaults to 0 for uniform
    /// scoring and 5 for field-weighted scoring.
    pub min_score: Option<u32>,
    pub weights: FieldWeights,
}

impl KeywordConfig {
    pub fn effective_min_score(&self) -> u32 {
        self.min_score.unwrap_or(match self.scoring {
            ScoringMode::Uniform => 0,
            ScoringMode::FieldWeighted => 5,
        })
    }
}

/// Lower-cases and drops every character that is neither alphanumeric nor
/// whitespace. Applied to queries only; record text is just lower-cased.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

/// Splits a query into scoring tokens. Duplicates are kept.
pub fn tokenize(query: &str) -> Vec<String> {
    normalize(query)
        .split_whitespace()
        .filter(|t| t.chars().count() > MAX_IGNORED_TOKEN_LEN)
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    config: KeywordConfig,
}

impl KeywordMatcher {
    pub fn new(config: KeywordConfig) -> Self {
        Self { config }
    }

    /// Score of `record` for already tokenized input.
    pub fn score(&self, tokens: &[String], record: &CatalogRecord) -> u32 {
        match self.config.scoring {
            ScoringMode::Uniform => {
                let blob = format!(
                    "{} {} {} {}",
                    record.name,
                    record.description,
                    record.skills.join(" "),
                    record.technologies().join(" ")
                )
                .to_lowercase();
                let hits = tokens.iter().filter(|t| blob.contains(t.as_str())).count();
                u32::try_from(hits).unwrap_or(u32::MAX)
            }
            ScoringMode::FieldWeighted => {
                let w = self.config.weights;
                let fields = [
                    (record.skills.join(" ").to_lowercase(), w.skills),
                    (record.name.to_lowercase(), w.name),
                    (record.description.to_lowercase(), w.description),
                    (record.technologies().join(" ").to_lowercase(), w.technologies),
                ];
                tokens
                    .iter()
                    .flat_map(|t| {
                        fields
                            .iter()
                            .filter(move |(text, _)| text.contains(t.as_str()))
                            .map(|(_, weight)| *weight)
                    })
                    .fold(0u32, u32::saturating_add)
            }
        }
    }

    /// Highest-scoring record above the threshold. Ties keep the earliest.
    pub fn best_match<'c>(
        &self,
        query: &str,
        catalog: &'c Catalog,
    ) -> Option<(&'c CatalogRecord, u32)> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return None;
        }

        let mut best: Option<(&CatalogRecord, u32)> = None;
        for record in catalog.records() {
            let score = self.score(&tokens, record);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((record, score));
            }
        }

        best.filter(|(_, score)| *score > self.config.effective_min_score())
    }
}

#[async_trait]
impl AgentMatcher for KeywordMatcher {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Keyword
    }

    async fn try_match<'a>(
        &self,
        request: &MatchRequest<'a>,
    ) -> Result<Option<AgentMatch<'a>>, MatchError> {
        Ok(self
            .best_match(request.query, request.catalog)
            .map(|(record, score)| AgentMatch {
                record,
                reason: MatchReason::KeywordOverlap { score },
            }))
    }
}
