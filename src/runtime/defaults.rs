use crate::domain::catalog::{AgentSource, Catalog, CatalogRecord, OutputFormat};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

/// The marketplace agents available when no catalog file is configured.
pub fn builtin_records() -> Vec<CatalogRecord> {
    vec![
        CatalogRecord {
            id: "lead-gen-1".to_string(),
            name: "Lead Generation Bot".to_string(),
            description: "Scans public directories and social media to find potential leads based on your criteria.".to_string(),
            skills: strings(&["Lead Generation", "Web Scraping", "Data Analysis"]),
            technologies: None,
            source: AgentSource::OpenSource,
            author: "Community".to_string(),
            version: "1.2.0".to_string(),
            output_format: OutputFormat::Csv,
            example_request: Some(
                "Find me 100 new leads for aisymphony.ai, selling sales AI agents".to_string(),
            ),
            price: None,
        },
        CatalogRecord {
            id: "market-research-1".to_string(),
            name: "Market Research Analyst".to_string(),
            description: "Analyzes market trends, competitor strategies, and customer sentiment from various data sources.".to_string(),
            skills: strings(&["Market Research", "Sentiment Analysis", "Reporting"]),
            technologies: None,
            source: AgentSource::Internal,
            author: "Our Team".to_string(),
            version: "2.0.1".to_string(),
            output_format: OutputFormat::Pdf,
            example_request: Some("Analyze the market for AI-powered sales tools".to_string()),
            price: None,
        },
        CatalogRecord {
            id: "n8n-social-poster".to_string(),
            name: "N8N Social Media Poster".to_string(),
            description: "An N8N workflow that automatically posts content to multiple social media platforms.".to_string(),
            skills: strings(&["Social Media", "Automation", "Content Management"]),
            technologies: None,
            source: AgentSource::N8n,
            author: "N8N Community".to_string(),
            version: "1.0.0".to_string(),
            output_format: OutputFormat::Json,
            example_request: Some("Post our new blog article to Twitter and LinkedIn".to_string()),
            price: None,
        },
        CatalogRecord {
            id: "make-crm-sync".to_string(),
            name: "Make.com CRM Sync".to_string(),
            description: "A Make.com scenario to sync customer data between HubSpot and Salesforce.".to_string(),
            skills: strings(&["CRM", "Data Synchronization", "API Integration"]),
            technologies: None,
            source: AgentSource::MakeCom,
            author: "Make.com Templates".to_string(),
            version: "1.5.0".to_string(),
            output_format: OutputFormat::Json,
            example_request: Some("Sync new contacts from HubSpot to Salesforce every hour".to_string()),
            price: None,
        },
    ]
}

/// [`builtin_records`] as a validated catalog.
pub fn builtin_catalog() -> Catalog {
    // The built-in records have unique ids and non-empty text.
    Catalog::new(builtin_records()).unwrap_or_default()
}
