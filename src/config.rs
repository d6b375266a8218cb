//! Configuration for the generation endpoint, tracing and storage

use serde::{Deserialize, Serialize};
use log::debug;
use std::path::PathBuf;
use std::str::FromStr;

/// Generation endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig
{   /// API base URL
    pub api_base: String
  , /// API key, if any
    pub api_key: Option<String>
  , /// Model or deployment name
    pub model: String
  , /// Azure API version; selects Azure-style routing when set
    pub api_version: Option<String>
  , /// Default sampling temperature
    pub temperature: f32
  , /// Default presence penalty
    pub presence_penalty: f32
  , /// Default frequency penalty
    pub frequency_penalty: f32
  , /// Detail level sent with image attachments
    pub image_detail: String
  , /// Request timeout in seconds
    pub timeout_secs: u64
}

impl Default for GenerationConfig
{   fn default() -> Self
    {   GenerationConfig
        {   api_base: "https://api.openai.com/v1".to_string()
          , api_key: None
          , model: "gpt-4o".to_string()
          , api_version: None
          , temperature: 0.0
          , presence_penalty: 0.0
          , frequency_penalty: 0.0
          , image_detail: "high".to_string()
          , timeout_secs: 60
        }
    }
}

/// Langfuse tracing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig
{   /// Enable tracing; a null tracer is used otherwise
    pub enabled: bool
  , /// Langfuse host
    pub host: String
  , pub public_key: Option<String>
  , pub secret_key: Option<String>
  , /// Name of the session trace
    pub trace_name: String
  , /// Model name reported on generation spans
    pub track_model_name: String
  , /// Events buffered before a flush is forced
    pub batch_size: usize
  , /// Periodic flush interval in milliseconds
    pub flush_interval_ms: u64
}

impl Default for TracingConfig
{   fn default() -> Self
    {   TracingConfig
        {   enabled: false
          , host: "https://cloud.langfuse.com".to_string()
          , public_key: None
          , secret_key: None
          , trace_name: "Air Q&A".to_string()
          , track_model_name: "gpt4o".to_string()
          , batch_size: 20
          , flush_interval_ms: 5000
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig
{   pub generation: GenerationConfig
  , pub tracing: TracingConfig
  , /// SQLite database with the flights tables
    pub database_path: PathBuf
  , /// Address the HTTP server binds to
    pub bind_addr: String
}

impl Default for AppConfig
{   fn default() -> Self
    {   AppConfig
        {   generation: GenerationConfig::default()
          , tracing: TracingConfig::default()
          , database_path: PathBuf::from("flights.db")
          , bind_addr: "127.0.0.1:8000".to_string()
        }
    }
}

impl AppConfig
{   /// Build configuration from the process environment,
    /// loading a `.env` file first when one exists
    pub fn from_env() -> Result<Self, crate::error::Error>
    {   match dotenvy::dotenv()
        {   Ok(path) => debug!("Loaded environment from {}", path.display())
          , Err(_) => debug!("No .env file found")
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F)
      -> Result<Self, crate::error::Error>
    where F: Fn(&str) -> Option<String>
    {   let mut config = AppConfig::default();

        let generation = &mut config.generation;
        if let Some(base) = lookup("OPENAI_API_BASE")
        {   generation.api_base = base;
        }
        generation.api_key = lookup("OPENAI_API_KEY")
          .filter(|k| !k.is_empty());
        if let Some(model) = lookup("OPENAI_DEPLOYMENT_NAME")
        {   generation.model = model;
        }
        generation.api_version = lookup("OPENAI_API_VERSION")
          .filter(|v| !v.is_empty());
        parse_into(&lookup, "LLM_TEMPERATURE", &mut generation.temperature)?;
        parse_into(
          &lookup, "LLM_PRESENCE_PENALTY", &mut generation.presence_penalty
        )?;
        parse_into(
          &lookup, "LLM_FREQUENCY_PENALTY", &mut generation.frequency_penalty
        )?;
        if let Some(detail) = lookup("LLM_IMAGE_DETAIL")
        {   generation.image_detail = detail;
        }
        parse_into(&lookup, "LLM_TIMEOUT_SECS", &mut generation.timeout_secs)?;

        let tracing = &mut config.tracing;
        parse_into(&lookup, "LANGFUSE_ENABLE", &mut tracing.enabled)?;
        if let Some(host) = lookup("LANGFUSE_HOST")
        {   tracing.host = host;
        }
        tracing.public_key = lookup("LANGFUSE_PUBLIC_KEY");
        tracing.secret_key = lookup("LANGFUSE_SECRET_KEY");
        if let Some(name) = lookup("LANGFUSE_TRACE_NAME")
        {   tracing.trace_name = name;
        }
        if let Some(name) = lookup("LANGFUSE_TRACK_MODEL_NAME")
        {   tracing.track_model_name = name;
        }

        if let Some(path) = lookup("FLIGHTS_DB_PATH")
        {   config.database_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup("SKYQUERY_BIND")
        {   config.bind_addr = addr;
        }

        debug!(
          "Configuration loaded: model={} tracing={}",
          config.generation.model, config.tracing.enabled
        );
        Ok(config)
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, slot: &mut T)
  -> Result<(), crate::error::Error>
where F: Fn(&str) -> Option<String>
    , T: FromStr
{   if let Some(raw) = lookup(key)
    {   *slot = raw.trim().to_ascii_lowercase().parse().map_err(|_| {
          crate::error::Error::InvalidConfiguration(
            format!("{} has invalid value '{}'", key, raw)
          )
        })?;
    }
    Ok(())
}
