use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // LLM provider
    pub anthropic_api_key: String,
    pub llm_provider: String,
    pub llm_model: String,

    // Pipeline
    pub relevance_threshold: u8,

    // API server
    pub api_host: String,
    pub api_port: u16,
    pub ingest_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "claude".to_string()),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-6".to_string()),
            relevance_threshold: env::var("RELEVANCE_THRESHOLD")
                .unwrap_or_else(|_| "40".to_string())
                .parse()
                .expect("RELEVANCE_THRESHOLD must be a number between 0 and 100"),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("API_PORT must be a number"),
            ingest_secret: env::var("INGEST_SECRET").ok(),
        }
    }

    /// Log the effective configuration without leaking credentials.
    pub fn log_redacted(&self) {
        info!(
            provider = %self.llm_provider,
            model = %self.llm_model,
            threshold = self.relevance_threshold,
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
