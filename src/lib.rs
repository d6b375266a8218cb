pub mod error;
pub mod config;
pub mod prompts;
pub mod request;
pub mod providers;
pub mod observability;
pub mod client;
pub mod helpers;
pub mod database;
pub mod pipeline;
pub mod logging;
pub mod web;
use serde::{Deserialize, Serialize};

/*

skyquery answers natural-language questions about a flights dataset:
the question goes to a text-generation endpoint for SQL, the SQL is
checked by a second generation call, run against SQLite, and the rows
are summarized by a third call.

skyquery/
├── Cargo.toml
├── src/
│   ├── lib.rs            # Re-exports and public result types
│   ├── error.rs          # Custom error type
│   ├── config.rs         # Endpoint, tracing and storage configuration
│   ├── prompts.rs        # Prompt templates per task
│   ├── request.rs        # Generation request/option types
│   ├── providers/        # Remote generation endpoints
│   ├── client.rs         # Generation client
│   ├── observability.rs  # Langfuse tracer / null tracer
│   ├── helpers.rs        # Code-fence stripping
│   ├── database/         # Query execution and CSV import
│   ├── pipeline.rs       # Four-stage answer pipeline
│   ├── logging.rs        # env_logger setup
│   ├── web/              # HTTP routes and pages
│   └── bin/              # server, import_csv
└── tests/

*/

pub use client::GenerationClient;
pub use pipeline::Pipeline;
pub use prompts::Task;

/// SKYQUERY API INTERFACE:

// ===== User-facing messages =====

/// Generation endpoint unreachable or failed
pub const DATA_ACCESS_MESSAGE: &str
  = "Sorry, I am facing some problems accessing the data. Please try again!";

/// Question out of domain, or the query failed validation
pub const OUT_OF_SCOPE_MESSAGE: &str
  = "Sorry, I can only answer questions related to flights data.";

/// Query ran but produced nothing usable
pub const NO_ANSWER_MESSAGE: &str
  = "Sorry, I could not find the answer to your questions. Try again with better explanations!";

// ===== Records =====

/// One result row, column name to value, in column order
pub type Record = serde_json::Map<String, serde_json::Value>;

// ===== Generation results =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationStatus
{   Ok
  , Failed
}

/// Output of a successful generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload
{   /// Text exactly as returned by the endpoint
    pub raw: String
  , /// Parsed JSON when a structured shape was requested and parsing
    /// succeeded
    pub structured: Option<serde_json::Value>
}

impl Payload
{   pub fn text(raw: impl Into<String>) -> Self
    {   Payload
        {   raw: raw.into()
          , structured: None
        }
    }
}

/// Result of one generation call. A failed call carries no payload.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult
{   /// Endpoint answered; content may be null
    Ok(Option<Payload>)
  , Failed
}

impl GenerationResult
{   pub fn status(&self) -> GenerationStatus
    {   match self
        {   GenerationResult::Ok(_) => GenerationStatus::Ok
          , GenerationResult::Failed => GenerationStatus::Failed
        }
    }

    pub fn is_ok(&self) -> bool
    {   self.status() == GenerationStatus::Ok
    }

    pub fn payload(&self) -> Option<&Payload>
    {   match self
        {   GenerationResult::Ok(payload) => payload.as_ref()
          , GenerationResult::Failed => None
        }
    }

    /// Raw text of a successful call
    pub fn text(&self) -> Option<&str>
    {   self.payload().map(|p| p.raw.as_str())
    }
}

// ===== Answers =====

/// Final response of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer
{   pub message: String
  , pub records: Vec<Record>
}

impl Answer
{   pub fn fallback(message: &str) -> Self
    {   Answer
        {   message: message.to_string()
          , records: vec![]
        }
    }

    /// Column names taken from the first record
    pub fn columns(&self) -> Vec<String>
    {   self.records.first()
          .map(|r| r.keys().cloned().collect())
          .unwrap_or_default()
    }
}

/// Parsed output of the validation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationOutcome
{   #[serde(default)]
    pub is_valid: bool
}

impl ValidationOutcome
{   /// Only a literal JSON `true` counts as valid
    pub fn from_value(value: &serde_json::Value) -> Self
    {   ValidationOutcome
        {   is_valid: value.get("is_valid") == Some(&serde_json::Value::Bool(true))
        }
    }
}
