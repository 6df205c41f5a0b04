//! Chat Completions client against a local stub upstream.

use agent_matcher::domain::matching::UpstreamError;
use agent_matcher::llm::{ChatCompletionsClient, CompletionClient, LlmSettings, Message};
use agent_matcher::runtime::defaults::builtin_catalog;
use agent_matcher::runtime::matching::{KeywordMatcher, LlmMatcher, Matchmaker};
use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Serves `/v1/chat/completions`, replying with `content` to the key
/// `sk-good` and 401 to anything else.
async fn spawn_upstream(content: &'static str) -> String {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
            let authorized = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                == Some("Bearer sk-good");
            if !authorized {
                return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad key" })));
            }
            assert_eq!(body["stream"], false);
            assert_eq!(body["messages"][0]["role"], "system");
            (
                StatusCode::OK,
                Json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": content } }]
                })),
            )
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn settings(base_url: String) -> LlmSettings {
    LlmSettings {
        base_url,
        model: "test-model".to_string(),
        timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_complete_returns_content() {
    let base_url = spawn_upstream(r#"{"id": "lead-gen-1"}"#).await;
    let client = ChatCompletionsClient::new(settings(base_url)).unwrap();

    let reply = client
        .complete(
            vec![Message::system("pick one"), Message::user("find leads")],
            "sk-good",
        )
        .await
        .unwrap();
    assert_eq!(reply, r#"{"id": "lead-gen-1"}"#);
}

#[tokio::test]
async fn test_rejected_key_is_unauthorized() {
    let base_url = spawn_upstream("{}").await;
    let client = ChatCompletionsClient::new(settings(base_url)).unwrap();

    let result = client
        .complete(vec![Message::system("pick one")], "sk-bad")
        .await;
    assert!(matches!(result, Err(UpstreamError::Unauthorized(401))));

    let result = client.complete(vec![Message::system("pick one")], "").await;
    assert!(matches!(result, Err(UpstreamError::MissingCredential)));
}

#[tokio::test]
async fn test_matchmaker_uses_upstream_selection() {
    let base_url = spawn_upstream("Here you go: ```json\n{\"id\": \"n8n-social-poster\"}\n```").await;
    let client = Arc::new(ChatCompletionsClient::new(settings(base_url)).unwrap());
    let matchmaker = Matchmaker::new(KeywordMatcher::default()).with_llm(LlmMatcher::new(client));
    let catalog = builtin_catalog();

    let selected = matchmaker
        .find_best_match("share my article everywhere", &catalog, Some("sk-good"))
        .await
        .unwrap();
    assert_eq!(selected.record.id, "n8n-social-poster");

    // Rejected key: same answer as keyword matching alone.
    let fallback = matchmaker
        .find_best_match("Post content to social media", &catalog, Some("sk-bad"))
        .await
        .map(|m| m.record.id.clone());
    let keyword_only = Matchmaker::new(KeywordMatcher::default())
        .find_best_match("Post content to social media", &catalog, None)
        .await
        .map(|m| m.record.id.clone());
    assert_eq!(fallback, keyword_only);
    assert_eq!(fallback.as_deref(), Some("n8n-social-poster"));
}
