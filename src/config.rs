//! Application settings read from the environment.
//!
//! [`AppConfig::from_env`] loads a `.env` file (if any) with `dotenvy` and then reads the process
//! environment. [`AppConfig::from_lookup`] takes any key lookup, which keeps tests hermetic.

use std::path::PathBuf;
use std::str::FromStr;

use crate::analysis::provider::{
    ApiSettings, LocalSettings, ProviderConfig, DEEPSEEK_API_BASE, DEFAULT_OLLAMA_HOST,
    OPENAI_API_BASE,
};
use crate::analysis::DEFAULT_CHART_PATH;
use crate::error::ConfigError;
use crate::ingestion::{IngestionPolicy, SqlSource, DEFAULT_LARGE_FILE_THRESHOLD};
use crate::ingestion::sql::DEFAULT_DB_HOST;
use crate::summary::SummaryOptions;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";
const DEFAULT_OLLAMA_MODEL: &str = "mistral";
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Database connection settings (`DB_*`).
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password_set", &self.password.is_some())
            .field("name", &self.name)
            .finish()
    }
}

impl DatabaseConfig {
    /// A [`SqlSource`] running `query` with these settings.
    pub fn sql_source(&self, query: impl Into<String>) -> SqlSource {
        SqlSource {
            host: self.host.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.name.clone(),
            ..SqlSource::new(query)
        }
    }
}

/// Everything the binary needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub database: DatabaseConfig,
    pub ingestion: IngestionPolicy,
    pub summary: SummaryOptions,
    pub chart_output_path: PathBuf,
}

impl AppConfig {
    /// Read `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match get("AI_PROVIDER").as_deref().unwrap_or("api") {
            "api" => match get("API_TYPE").as_deref().unwrap_or("openai") {
                "openai" => ProviderConfig::OpenAi(ApiSettings {
                    api_key: get("OPENAI_API_KEY"),
                    model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                    temperature: parse_or(&get, "OPENAI_TEMPERATURE", DEFAULT_TEMPERATURE)?,
                    base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| OPENAI_API_BASE.to_string()),
                }),
                "deepseek" => ProviderConfig::DeepSeek(ApiSettings {
                    api_key: get("DEEPSEEK_API_KEY"),
                    model: get("DEEPSEEK_MODEL").unwrap_or_else(|| DEFAULT_DEEPSEEK_MODEL.to_string()),
                    temperature: parse_or(&get, "DEEPSEEK_TEMPERATURE", DEFAULT_TEMPERATURE)?,
                    base_url: get("DEEPSEEK_BASE_URL")
                        .unwrap_or_else(|| DEEPSEEK_API_BASE.to_string()),
                }),
                other => return Err(ConfigError::UnsupportedProvider(format!("API_TYPE={other}"))),
            },
            "local" => ProviderConfig::Local(LocalSettings {
                model: get("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                host: get("OLLAMA_HOST").unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
            }),
            other => return Err(ConfigError::UnsupportedProvider(format!("AI_PROVIDER={other}"))),
        };

        let database = DatabaseConfig {
            host: get("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
            user: get("DB_USER"),
            password: get("DB_PASSWORD"),
            name: get("DB_NAME"),
        };

        let ingestion = IngestionPolicy {
            large_file_threshold: parse_or(&get, "LARGE_FILE_THRESHOLD", DEFAULT_LARGE_FILE_THRESHOLD)?,
        };

        let mut summary = SummaryOptions::default();
        if let Some(raw) = get("SUMMARY_MAX_DATA_ROWS") {
            // 0 means no cap.
            let rows: usize = parse_value("SUMMARY_MAX_DATA_ROWS", &raw)?;
            summary.max_data_rows = (rows > 0).then_some(rows);
        }

        Ok(Self {
            provider,
            database,
            ingestion,
            summary,
            chart_output_path: get("CHART_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHART_PATH)),
        })
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        message: e.to_string(),
    })
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}
