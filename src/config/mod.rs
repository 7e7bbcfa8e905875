/// Configuration management for the Apiloom engine
///
/// Handles server binding, storage location, model endpoint and signing
/// secrets. Everything is overridable through environment variables for
/// container deployment.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g. "0.0.0.0")
    pub host: String,
    pub port: u16,
}

/// SQLite storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding workflows.db and the document store
    pub data_dir: String,
}

/// Model endpoint for graph proposals (OpenAI-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Token signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Outbound mail configuration; empty webhook URL selects the log mailer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub webhook_url: String,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("APILOOM_HOST", "0.0.0.0"),
                port: env_or("APILOOM_PORT", "3005").parse().unwrap_or(3005),
            },
            database: DatabaseConfig {
                data_dir: env_or("APILOOM_DATA_DIR", "data"),
            },
            llm: LlmConfig {
                base_url: env_or("APILOOM_LLM_BASE_URL", "https://api.openai.com/v1"),
                api_key: env_or("APILOOM_LLM_API_KEY", ""),
                model: env_or("APILOOM_LLM_MODEL", "gpt-4o-mini"),
            },
            auth: AuthConfig {
                jwt_secret: env_or("APILOOM_JWT_SECRET", "dev-secret-change-me"),
            },
            mail: MailConfig {
                webhook_url: env_or("APILOOM_MAIL_WEBHOOK_URL", ""),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
