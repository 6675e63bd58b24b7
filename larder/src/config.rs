//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `LARDER_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `LARDER_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `LARDER_LLM__MODEL=llama-3.3-70b-versatile` sets the `llm.model` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! LARDER_PORT=8080
//!
//! # Secrets (required - startup fails without them)
//! LARDER_SECRET_KEY="..."
//! LARDER_ENCRYPTION_KEY="..."
//!
//! # Override nested values
//! LARDER_LLM__API_KEY=gsk-...
//! LARDER_RATE_LIMITS__API__LIMIT=20
//! ```

use clap::Parser;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "LARDER_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation, except the
/// two secrets which must be supplied before the server will start.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Base URL where the application is reachable (e.g., "https://recipes.example.com").
    /// Used for magic-link URLs in login emails and post-verification redirects.
    pub base_url: String,
    /// Secret key for signing session tokens (required)
    pub secret_key: Option<String>,
    /// Server-held secret from which the API-key cipher key is derived (required).
    /// Missing secret is a startup error - never silent plaintext storage.
    pub encryption_key: Option<String>,
    /// LLM provider settings
    pub llm: LlmConfig,
    /// Email delivery settings. When absent, login-link requests fail with a
    /// configuration error instead of silently dropping mail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailConfig>,
    /// Fixed-window rate limit settings for the recipe and login paths
    pub rate_limits: RateLimitsConfig,
    /// CORS settings
    pub cors: CorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            secret_key: None,
            encryption_key: None,
            llm: LlmConfig::default(),
            email: None,
            rate_limits: RateLimitsConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

/// OpenAI-compatible LLM provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// Base URL of the provider's OpenAI-compatible API
    pub base_url: String,
    /// Model identifier sent with every completion request
    pub model: String,
    /// Optional server-side fallback API key, used when neither the request nor
    /// the authenticated user supplies one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token cap
    pub max_tokens: u32,
    /// Bound on total provider wait time. Provider stalls surface as a timeout
    /// error rather than an indefinite hang.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 1024,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Email delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    pub transport: EmailTransportConfig,
}

fn default_from_name() -> String {
    "Larder".to_string()
}

/// Email transport: real SMTP delivery or file drop for development/testing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum EmailTransportConfig {
    Smtp {
        host: String,
        port: u16,
        username: String,
        password: String,
        #[serde(default = "default_true")]
        use_tls: bool,
    },
    File {
        path: String,
    },
}

fn default_true() -> bool {
    true
}

/// Rate limit settings for both throttled paths.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitsConfig {
    /// Recipe-generation throttle (in-memory, per process)
    pub api: WindowConfig,
    /// Login-link throttle (durable, survives restarts)
    pub auth: WindowConfig,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            api: WindowConfig {
                limit: 10,
                window: Duration::from_secs(60),
            },
            auth: WindowConfig {
                limit: 5,
                window: Duration::from_secs(15 * 60),
            },
        }
    }
}

/// A fixed-window counter configuration: at most `limit` requests per `window`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    pub limit: u32,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins; "*" means any origin
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("LARDER_").split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.secret_key.is_none() {
            return Err(Error::Internal {
                operation: "Config validation: secret_key is not configured. \
                 Please set LARDER_SECRET_KEY environment variable or add secret_key to the config file."
                    .to_string(),
            });
        }

        if self.encryption_key.is_none() {
            return Err(Error::Internal {
                operation: "Config validation: encryption_key is not configured. \
                 Please set LARDER_ENCRYPTION_KEY environment variable or add encryption_key to the config file."
                    .to_string(),
            });
        }

        if self.base_url.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: base_url must not be empty".to_string(),
            });
        }

        if self.rate_limits.api.limit == 0 || self.rate_limits.auth.limit == 0 {
            return Err(Error::Internal {
                operation: "Config validation: rate limit values must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
