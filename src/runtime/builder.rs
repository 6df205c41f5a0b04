//! Builds custom agents for requests nothing in the catalog matched.

use crate::domain::catalog::{AgentSource, CatalogRecord, OutputFormat};
use serde::Deserialize;
use uuid::Uuid;

const FALLBACK_NAME: &str = "New Custom Agent";
const BUILDER_TECHNOLOGY: &str = "Gemini Flash";

/// User input for a custom agent. Name and description default to values
/// derived from the request.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDraft {
    pub query: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Title-cases the words of `query`, drops anything that is not an ASCII
/// letter, digit or space, and appends " Agent".
pub fn suggested_name(query: &str) -> String {
    let title_cased = query
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ");
    let cleaned: String = title_cased
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();

    if cleaned.trim().is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        format!("{} Agent", cleaned.trim())
    }
}

pub fn suggested_description(query: &str) -> String {
    format!(
        "This agent is designed to handle requests related to: \"{}\".",
        query.trim()
    )
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Turns a draft into a record with a fresh, never reused id.
pub fn build_custom_agent(draft: AgentDraft) -> CatalogRecord {
    let name = non_blank(draft.name).unwrap_or_else(|| suggested_name(&draft.query));
    let description =
        non_blank(draft.description).unwrap_or_else(|| suggested_description(&draft.query));

    CatalogRecord {
        id: format!("custom-{}", Uuid::new_v4()),
        name,
        description,
        skills: vec!["Custom".to_string(), "AI-Generated".to_string()],
        technologies: Some(vec![BUILDER_TECHNOLOGY.to_string()]),
        source: AgentSource::Internal,
        author: "User".to_string(),
        version: "1.0.0".to_string(),
        output_format: OutputFormat::Json,
        example_request: Some(draft.query),
        price: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggested_name() {
        assert_eq!(
            suggested_name("generate an image of a cat in a spacesuit!"),
            "Generate An Image Of A Cat In A Spacesuit Agent"
        );
        assert_eq!(suggested_name("???"), FALLBACK_NAME);
        assert_eq!(suggested_name(""), FALLBACK_NAME);
    }

    #[test]
    fn test_build_custom_agent_defaults() {
        let record = build_custom_agent(AgentDraft {
            query: "translate invoices".to_string(),
            name: None,
            description: Some("  ".to_string()),
        });

        assert!(record.id.starts_with("custom-"));
        assert_eq!(record.name, "Translate Invoices Agent");
        assert_eq!(
            record.description,
            "This agent is designed to handle requests related to: \"translate invoices\"."
        );
        assert_eq!(record.skills, ["Custom", "AI-Generated"]);
        assert_eq!(record.example_request.as_deref(), Some("translate invoices"));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let draft = AgentDraft {
            query: "same".to_string(),
            name: Some("Same".to_string()),
            description: None,
        };
        let a = build_custom_agent(draft.clone());
        let b = build_custom_agent(draft);
        assert_ne!(a.id, b.id);
    }
}
