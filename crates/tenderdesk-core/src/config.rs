//! Configuration module
//!
//! All tunables are read once at startup by [`Config::from_env`] and passed down by
//! reference. Every section has a `Default` so tests can build configurations
//! directly without touching the process environment.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const SERVER_PORT: u16 = 3000;
const DB_MAX_CONNECTIONS: u32 = 10;
const MAX_FILE_SIZE_MB: usize = 10;
const MAX_ARCHIVE_SIZE_MB: usize = 100;
const PROVIDER_TIMEOUT_SECS: u64 = 120;
const MIN_TEXT_CHARS: usize = 100;
const REVIEW_CONFIDENCE_THRESHOLD: f64 = 0.70;
const BATCH_CONCURRENCY: usize = 1;
const EXTRACTION_MAX_TOKENS: u32 = 4096;
const PROVIDER_RATE_LIMIT_PER_MINUTE: u32 = 30;
const HTTP_CONCURRENCY_LIMIT: usize = 1_000;

const DEFAULT_ALLOWED_CONTENT_TYPES: &str = "application/pdf,image/png,image/jpeg,image/webp,image/gif,text/plain,text/csv,application/msword,application/vnd.ms-excel,application/vnd.openxmlformats-officedocument.wordprocessingml.document,application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const DEFAULT_BATCH_EXTENSIONS: &str = "pdf,png,jpg,jpeg";
const DEFAULT_PROVIDER_ORDER: &str = "anthropic,openai,gemini";

/// AI provider families the fallback chain knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(anyhow::anyhow!("Unknown AI provider: {}", other)),
        }
    }
}

/// Credentials and endpoint for one provider.
#[derive(Clone)]
pub struct ProviderCredentials {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl ProviderCredentials {
    /// A provider is usable only with a real-looking key. Empty values, sample
    /// placeholders and very short strings count as absent.
    pub fn is_configured(&self) -> bool {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) => {
                key.len() >= 10
                    && !key.eq_ignore_ascii_case("your-api-key")
                    && !key.starts_with("your_")
                    && !key.starts_with("sk-...")
            }
            None => false,
        }
    }

    pub fn defaults_for(kind: ProviderKind) -> Self {
        let (model, base_url) = match kind {
            ProviderKind::Anthropic => ("claude-sonnet-4-20250514", "https://api.anthropic.com"),
            ProviderKind::OpenAi => ("gpt-4o", "https://api.openai.com"),
            ProviderKind::Gemini => (
                "gemini-1.5-pro",
                "https://generativelanguage.googleapis.com",
            ),
        };
        Self {
            api_key: None,
            model: model.to_string(),
            base_url: base_url.to_string(),
        }
    }

    fn from_env(kind: ProviderKind, prefix: &str) -> Self {
        let defaults = Self::defaults_for(kind);
        Self {
            api_key: env::var(format!("{}_API_KEY", prefix))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: env::var(format!("{}_MODEL", prefix)).unwrap_or(defaults.model),
            base_url: env::var(format!("{}_BASE_URL", prefix))
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
        }
    }
}

// API keys must never end up in logs.
impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct ProvidersConfig {
    /// Fallback order; providers missing from this list are never used.
    pub order: Vec<ProviderKind>,
    pub anthropic: ProviderCredentials,
    pub openai: ProviderCredentials,
    pub gemini: ProviderCredentials,
    pub rate_limit_per_minute: u32,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            order: vec![
                ProviderKind::Anthropic,
                ProviderKind::OpenAi,
                ProviderKind::Gemini,
            ],
            anthropic: ProviderCredentials::defaults_for(ProviderKind::Anthropic),
            openai: ProviderCredentials::defaults_for(ProviderKind::OpenAi),
            gemini: ProviderCredentials::defaults_for(ProviderKind::Gemini),
            rate_limit_per_minute: PROVIDER_RATE_LIMIT_PER_MINUTE,
        }
    }
}

impl ProvidersConfig {
    pub fn credentials(&self, kind: ProviderKind) -> &ProviderCredentials {
        match kind {
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Gemini => &self.gemini,
        }
    }

    /// Providers in fallback order that have usable credentials.
    pub fn configured(&self) -> Vec<ProviderKind> {
        let mut seen = Vec::new();
        for kind in &self.order {
            if self.credentials(*kind).is_configured() && !seen.contains(kind) {
                seen.push(*kind);
            }
        }
        seen
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub local_path: String,
    pub base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_path: "./data/documents".to_string(),
            base_url: format!("http://localhost:{}/files", SERVER_PORT),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_file_size_bytes: usize,
    pub allowed_content_types: Vec<String>,
    pub max_archive_size_bytes: usize,
    pub batch_allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_content_types: split_list(DEFAULT_ALLOWED_CONTENT_TYPES),
            max_archive_size_bytes: MAX_ARCHIVE_SIZE_MB * 1024 * 1024,
            batch_allowed_extensions: split_list(DEFAULT_BATCH_EXTENSIONS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    pub provider_timeout: Duration,
    pub min_text_chars: usize,
    pub review_threshold: f64,
    pub batch_concurrency: usize,
    /// Per-file deadline inside a batch. When unset it is derived from the
    /// provider timeout and the number of configured providers.
    pub batch_file_timeout: Option<Duration>,
    pub max_tokens: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(PROVIDER_TIMEOUT_SECS),
            min_text_chars: MIN_TEXT_CHARS,
            review_threshold: REVIEW_CONFIDENCE_THRESHOLD,
            batch_concurrency: BATCH_CONCURRENCY,
            batch_file_timeout: None,
            max_tokens: EXTRACTION_MAX_TOKENS,
        }
    }
}

impl ExtractionConfig {
    pub fn file_timeout(&self, provider_count: usize) -> Duration {
        self.batch_file_timeout
            .unwrap_or_else(|| self.provider_timeout * provider_count.max(1) as u32)
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    /// Maximum in-flight HTTP requests across the whole router.
    pub http_concurrency_limit: usize,
    /// `pretty` or `json`.
    pub log_format: String,
    pub master_api_key: Option<String>,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub extraction: ExtractionConfig,
    pub providers: ProvidersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
            log_format: "pretty".to_string(),
            master_api_key: None,
            database_url: None,
            db_max_connections: DB_MAX_CONNECTIONS,
            storage: StorageConfig::default(),
            upload: UploadConfig::default(),
            extraction: ExtractionConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let server_port = env::var("SERVER_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?;

        let storage = StorageConfig {
            local_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| StorageConfig::default().local_path),
            base_url: env::var("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}/files", server_port)),
        };

        let upload = UploadConfig {
            max_file_size_bytes: env_or("MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB) * 1024 * 1024,
            allowed_content_types: split_list(
                &env::var("ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| DEFAULT_ALLOWED_CONTENT_TYPES.to_string()),
            ),
            max_archive_size_bytes: env_or("MAX_ARCHIVE_SIZE_MB", MAX_ARCHIVE_SIZE_MB)
                * 1024
                * 1024,
            batch_allowed_extensions: split_list(
                &env::var("BATCH_ALLOWED_EXTENSIONS")
                    .unwrap_or_else(|_| DEFAULT_BATCH_EXTENSIONS.to_string()),
            )
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect(),
        };

        let extraction = ExtractionConfig {
            provider_timeout: Duration::from_secs(env_or(
                "PROVIDER_TIMEOUT_SECS",
                PROVIDER_TIMEOUT_SECS,
            )),
            min_text_chars: env_or("MIN_TEXT_CHARS", MIN_TEXT_CHARS),
            review_threshold: env_or("REVIEW_CONFIDENCE_THRESHOLD", REVIEW_CONFIDENCE_THRESHOLD),
            batch_concurrency: env_or("BATCH_CONCURRENCY", BATCH_CONCURRENCY),
            batch_file_timeout: env::var("BATCH_FILE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
            max_tokens: env_or("EXTRACTION_MAX_TOKENS", EXTRACTION_MAX_TOKENS),
        };

        let order = env::var("PROVIDER_ORDER")
            .unwrap_or_else(|_| DEFAULT_PROVIDER_ORDER.to_string())
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(ProviderKind::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        let providers = ProvidersConfig {
            order,
            anthropic: ProviderCredentials::from_env(ProviderKind::Anthropic, "ANTHROPIC"),
            openai: ProviderCredentials::from_env(ProviderKind::OpenAi, "OPENAI"),
            gemini: ProviderCredentials::from_env(ProviderKind::Gemini, "GEMINI"),
            rate_limit_per_minute: env_or(
                "PROVIDER_RATE_LIMIT_PER_MINUTE",
                PROVIDER_RATE_LIMIT_PER_MINUTE,
            ),
        };

        Ok(Config {
            server_port,
            environment,
            http_concurrency_limit: env_or("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT),
            log_format: env::var("LOG_FORMAT")
                .map(|f| f.trim().to_lowercase())
                .unwrap_or_else(|_| "pretty".to_string()),
            master_api_key: env::var("MASTER_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            database_url: env::var("DATABASE_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
            storage,
            upload,
            extraction,
            providers,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.is_production() {
            match &self.master_api_key {
                Some(key) if key.len() >= 32 => {}
                _ => {
                    return Err(anyhow::anyhow!(
                        "MASTER_API_KEY must be set and at least 32 characters long in production"
                    ))
                }
            }
        }

        if self.upload.max_file_size_bytes == 0 || self.upload.max_archive_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_FILE_SIZE_MB and MAX_ARCHIVE_SIZE_MB must be greater than zero"
            ));
        }

        if self.upload.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_CONTENT_TYPES must not be empty"));
        }

        if !(0.0..=1.0).contains(&self.extraction.review_threshold) {
            return Err(anyhow::anyhow!(
                "REVIEW_CONFIDENCE_THRESHOLD must be between 0 and 1"
            ));
        }

        if self.http_concurrency_limit == 0 {
            return Err(anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT must be at least 1"));
        }

        if self.extraction.batch_concurrency == 0 {
            return Err(anyhow::anyhow!("BATCH_CONCURRENCY must be at least 1"));
        }

        if self.extraction.provider_timeout.is_zero() {
            return Err(anyhow::anyhow!("PROVIDER_TIMEOUT_SECS must be greater than zero"));
        }

        if self.providers.rate_limit_per_minute == 0 {
            return Err(anyhow::anyhow!(
                "PROVIDER_RATE_LIMIT_PER_MINUTE must be greater than zero"
            ));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}
