pub mod chain;
pub mod embedding;
pub mod keyword;
pub mod llm;
pub mod vector;

pub use chain::Matchmaker;
pub use embedding::{EmbeddingProvider, FastEmbedProvider, SemanticConfig};
pub use keyword::{KeywordConfig, KeywordMatcher};
pub use llm::LlmMatcher;
pub use vector::SemanticMatcher;
