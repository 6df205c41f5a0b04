//! Agent selection delegated to a hosted LLM.
//!
//! The model sees a reduced listing of the catalog and must answer with a
//! single `{"id": ...}` object. Its answer is untrusted text: the parser
//! tolerates prose or markdown around the object, but the object itself must
//! have the expected shape and the id must exist in the catalog.

use crate::domain::catalog::Catalog;
use crate::domain::matching::{
    AgentMatch, AgentMatcher, MatchError, MatchReason, MatchRequest, StrategyKind, UpstreamError,
};
use crate::llm::{CompletionClient, Message};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const SYSTEM_PROMPT: &str = "You match user requests to automation agents. \
You will receive a request and a JSON list of agents. \
Reply with exactly one JSON object of the form {\"id\": \"<agent id>\"} naming the single best agent, \
or {\"id\": null} if no agent fits the request. \
Do not add any other text and do not use markdown.";

/// The fields of a record the model is allowed to see.
#[derive(Debug, Serialize)]
struct AgentSummary<'a> {
    id: &'a str,
    name: &'a str,
    description: &'a str,
    skills: &'a [String],
}

fn reduced_listing(catalog: &Catalog) -> Vec<AgentSummary<'_>> {
    catalog
        .records()
        .iter()
        .map(|r| AgentSummary {
            id: &r.id,
            name: &r.name,
            description: &r.description,
            skills: &r.skills,
        })
        .collect()
}

fn build_messages(query: &str, catalog: &Catalog) -> Result<Vec<Message>, UpstreamError> {
    let listing = serde_json::to_string(&reduced_listing(catalog))
        .map_err(|e| UpstreamError::Parse(e.to_string()))?;
    Ok(vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(format!("Request: {query}\n\nAgents: {listing}")),
    ])
}

/// Returns the first balanced `{...}` substring, skipping braces inside
/// JSON string literals.
pub fn extract_first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses a model reply into the selected id (`None` for an explicit null).
pub fn parse_selection(text: &str) -> Result<Option<String>, UpstreamError> {
    let object = extract_first_object(text)
        .ok_or_else(|| UpstreamError::Parse("no JSON object in response".to_string()))?;
    let value: serde_json::Value =
        serde_json::from_str(object).map_err(|e| UpstreamError::Parse(e.to_string()))?;

    match value.get("id") {
        Some(serde_json::Value::String(id)) => Ok(Some(id.clone())),
        Some(serde_json::Value::Null) => Ok(None),
        Some(other) => Err(UpstreamError::Parse(format!(
            "id must be a string or null, got {other}"
        ))),
        None => Err(UpstreamError::Parse("missing id field".to_string())),
    }
}

#[derive(Debug)]
pub struct LlmMatcher {
    client: Arc<dyn CompletionClient>,
}

impl LlmMatcher {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentMatcher for LlmMatcher {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Llm
    }

    #[instrument(skip_all, fields(records = request.catalog.len()))]
    async fn try_match<'a>(
        &self,
        request: &MatchRequest<'a>,
    ) -> Result<Option<AgentMatch<'a>>, MatchError> {
        let credential = request
            .credential
            .filter(|c| !c.trim().is_empty())
            .ok_or(UpstreamError::MissingCredential)?;
        if request.query.trim().is_empty() || request.catalog.is_empty() {
            return Ok(None);
        }

        let messages = build_messages(request.query, request.catalog)?;
        let reply = self.client.complete(messages, credential).await?;
        debug!(reply_len = reply.len(), "LLM replied");

        let Some(id) = parse_selection(&reply)? else {
            return Ok(None);
        };

        match request.catalog.get(&id) {
            Some(record) => Ok(Some(AgentMatch {
                record,
                reason: MatchReason::LlmSelected,
            })),
            None => {
                let err = MatchError::UnknownRecordReference(id);
                warn!(name: "match.llm.unknown_record", error = %err, "Treating as no match");
                Ok(None)
            }
        }
    }
}
