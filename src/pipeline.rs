//! Question -> SQL -> validation -> execution -> summary

use log::{debug, error, info};
use std::path::PathBuf;

use crate::request::{GenerationOptions, Substitutions};
use crate::{
  Answer, GenerationClient, GenerationResult, Task, ValidationOutcome
, DATA_ACCESS_MESSAGE, NO_ANSWER_MESSAGE, OUT_OF_SCOPE_MESSAGE
};

/// Score name used for user feedback
pub const FEEDBACK_SCORE_NAME: &str = "user-feedback";

/// Four-stage answer pipeline. Each stage gates the next; the first
/// failure ends the request with one of the fixed user messages.
pub struct Pipeline
{   client: GenerationClient
  , database_path: PathBuf
}

impl Pipeline
{   pub fn new(client: GenerationClient, database_path: PathBuf) -> Self
    {   debug!("Creating Pipeline over {}", database_path.display());
        Pipeline
        {   client
          , database_path
        }
    }

    pub fn from_config(
      config: &crate::config::AppConfig
    ) -> Result<Self, crate::error::Error>
    {   Ok(Self::new(
          GenerationClient::from_config(config)?
        , config.database_path.clone()
        ))
    }

    pub fn client(&self) -> &GenerationClient
    {   &self.client
    }

    /// Answer a question with a message and the rows behind it
    pub async fn answer(&self, question: &str) -> Answer
    {   info!("User Query: {}", question);

        // ===== Generate =====
        let generated = self.client.generate(
          Task::SqlGeneration
        , slots(&[("question", question)])
        , GenerationOptions::default()
        ).await;
        info!("SQL Query: {:?}", generated);

        let sql = match &generated
        {   GenerationResult::Failed => {
              return Answer::fallback(DATA_ACCESS_MESSAGE);
            }
          , GenerationResult::Ok(payload) => {
              match payload.as_ref().map(|p| p.raw.trim())
              {   Some(text) if !is_declined(text) => text.to_string()
                , _ => {
                    info!("Question declined as out of scope");
                    return Answer::fallback(OUT_OF_SCOPE_MESSAGE);
                  }
              }
            }
        };

        // ===== Validate =====
        let validation = self.client.generate(
          Task::SqlValidation
        , slots(&[("query", sql.as_str())])
        , GenerationOptions::structured()
        ).await;
        info!("Validated Query: {:?}", validation);

        let outcome = match &validation
        {   GenerationResult::Failed => {
              return Answer::fallback(DATA_ACCESS_MESSAGE);
            }
          , GenerationResult::Ok(payload) => validation_outcome(payload.as_ref())
        };
        info!("Formatted Validated Query: {:?}", outcome);

        if !outcome.is_valid
        {   return Answer::fallback(OUT_OF_SCOPE_MESSAGE);
        }

        // ===== Execute =====
        let query = crate::helpers::format_sql(&sql);
        info!("Formatted Query: {}", query);

        let records = match self.execute(query).await
        {   Ok(records) => records
          , Err(e) => {
              info!("Result after executing query: {}", e);
              return Answer::fallback(NO_ANSWER_MESSAGE);
            }
        };
        info!("Result after executing query: {} rows", records.len());

        // ===== Summarize =====
        let result_text = match serde_json::to_string(&records)
        {   Ok(text) => text
          , Err(e) => {
              error!("Failed to serialize records: {}", e);
              return Answer::fallback(NO_ANSWER_MESSAGE);
            }
        };
        let summary = self.client.generate(
          Task::Summarization
        , slots(&[("question", question), ("result", result_text.as_str())])
        , GenerationOptions::default()
        ).await;
        info!("Natural Response: {:?}", summary);

        match summary.text().map(str::trim)
        {   Some(message) if !message.is_empty() => Answer
            {   message: message.to_string()
              , records
            }
          , _ => Answer::fallback(DATA_ACCESS_MESSAGE)
        }
    }

    /// Forward user feedback to the tracer; fire and forget
    pub fn score_feedback(&self, rating: i64, label: &str, comment: &str)
    {   info!("Feedback received: {} ({})", rating, label);
        self.client.score_generation(rating, label, comment);
    }

    /// Flush tracing and release the client
    pub async fn shutdown(self) -> Result<(), crate::error::Error>
    {   debug!("Shutting down Pipeline");
        self.client.shutdown().await
    }

    async fn execute(
      &self
    , query: String
    ) -> Result<Vec<crate::Record>, crate::error::Error>
    {   let path = self.database_path.clone();
        tokio::task::spawn_blocking(move || {
          crate::database::execute_query(&path, &query)
        })
        .await
        .map_err(|e| {
          error!("Query task failed: {}", e);
          crate::error::Error::DatabaseError(e.to_string())
        })?
    }
}

fn slots(pairs: &[(&str, &str)]) -> Substitutions
{   pairs.iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
}

/// Empty output or the literal "none" means the model declined
fn is_declined(text: &str) -> bool
{   let text = crate::helpers::strip_code_fence(text);
    text.is_empty() || text.eq_ignore_ascii_case("none")
}

fn validation_outcome(payload: Option<&crate::Payload>) -> ValidationOutcome
{   let Some(payload) = payload else
    {   return ValidationOutcome::default();
    };
    match &payload.structured
    {   Some(value) => ValidationOutcome::from_value(value)
      , None => crate::helpers::format_json(&payload.raw)
          .map(|value| ValidationOutcome::from_value(&value))
          .unwrap_or_default()
    }
}
