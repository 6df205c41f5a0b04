use crate::credentials::CredentialConfig;
use crate::llm::LlmSettings;
use crate::runtime::matching::{KeywordConfig, SemanticConfig};
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Prefix for environment overrides, e.g. `AGENT_MATCHER_SERVER__PORT=8000`.
pub const ENV_PREFIX: &str = "AGENT_MATCHER";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Catalog file (JSON or YAML); the built-in agents are used otherwise
    #[arg(long, env = "CATALOG_FILE")]
    pub catalog: Option<PathBuf>,

    /// Enable embedding-based matching
    #[arg(long, env = "SEMANTIC_ENABLED")]
    pub semantic_enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub keyword: KeywordConfig,
    pub semantic: SemanticConfig,
    pub llm: LlmSettings,
    pub credentials: CredentialConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "127.0.0.1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    /// Priority: CLI flag (or its env var) > `AGENT_MATCHER_*` env vars >
    /// config file > defaults.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "127.0.0.1")?;

        // Explicit file must exist; ./config.{yaml,toml,json} is optional.
        builder = match &cli.config {
            Some(path) => builder.add_source(File::from(path.clone()).required(true)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(catalog) = cli.catalog {
            builder = builder.set_override("catalog.path", catalog.to_string_lossy().into_owned())?;
        }
        if let Some(enabled) = cli.semantic_enabled {
            builder = builder.set_override("semantic.enabled", enabled)?;
        }

        builder.build()?.try_deserialize()
    }
}
