use async_trait::async_trait;
use log::{debug, error, trace};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ===== Message Types =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: String
  , pub content: MessageContent
}

/// Plain text, or text and image parts for multimodal input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent
{   Text(String)
  , Parts(Vec<ContentPart>)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart
{   Text
    {   text: String
    }
  , ImageUrl
    {   image_url: ImageUrl
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl
{   pub url: String
  , pub detail: String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat
{   #[serde(rename = "type")]
    pub kind: String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , pub temperature: f32
  , pub presence_penalty: f32
  , pub frequency_penalty: f32
  , pub response_format: ResponseFormat
  , pub seed: u64
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse
{   pub choices: Vec<Choice>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice
{   pub message: ResponseMessage
  , pub finish_reason: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage
{   #[serde(default)]
    pub content: Option<String>
}

// ===== Client =====

/// Chat-completions client for OpenAI and Azure OpenAI endpoints
pub struct OpenAiClient
{   config: crate::config::GenerationConfig
  , http_client: reqwest::Client
}

impl OpenAiClient
{   pub fn new(config: crate::config::GenerationConfig)
      -> Result<Self, crate::error::Error>
    {   debug!("Creating OpenAiClient for model: {}", config.model);
        let http_client = reqwest::Client::builder()
          .timeout(Duration::from_secs(config.timeout_secs))
          .build()
          .map_err(|e| {
            error!("Failed to build HTTP client: {}", e);
            crate::error::Error::HttpError(e.to_string())
          })?;
        Ok(OpenAiClient
        {   config
          , http_client
        })
    }

    /// Azure routes by deployment and api-version; plain OpenAI by path
    pub fn endpoint(&self) -> String
    {   let base = self.config.api_base.trim_end_matches('/');
        match &self.config.api_version
        {   Some(version) => format!(
              "{}/openai/deployments/{}/chat/completions?api-version={}",
              base, self.config.model, version
            )
          , None => format!("{}/chat/completions", base)
        }
    }

    fn get_api_key(&self) -> Result<&str, crate::error::Error>
    {   self.config.api_key.as_deref().ok_or_else(|| {
          error!("No API key for model: {}", self.config.model);
          crate::error::Error::MissingApiKey(
            format!("OpenAI:{}", self.config.model)
          )
        })
    }
}

#[async_trait]
impl super::ChatProvider for OpenAiClient
{   fn model_name(&self) -> &str
    {   &self.config.model
    }

    async fn complete(
      &self
    , request: &ChatRequest
    ) -> Result<Option<String>, crate::error::Error>
    {   debug!("Sending chat completion for: {}", request.model);
        let api_key = self.get_api_key()?;

        trace!("Chat request: {:?}", request);

        let builder = self.http_client
          .post(self.endpoint())
          .header("Content-Type", "application/json")
          .json(request);
        let builder = if self.config.api_version.is_some()
        {   builder.header("api-key", api_key)
        } else
        {   builder.bearer_auth(api_key)
        };

        let response = builder
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            if e.is_timeout()
            {   crate::error::Error::Timeout
            } else
            {   crate::error::Error::HttpError(e.to_string())
            }
          })?;

        let status = response.status();
        trace!("Chat response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("Generation API error ({}): {}", status, error_text);
            return Err(crate::error::Error::ApiError(
              format!("{}: {}", status, error_text)
            ));
        }

        let chat_response: ChatResponse
          = response.json().await.map_err(|e| {
            error!("Parse error: {}", e);
            crate::error::Error::ParseError(e.to_string())
          })?;

        chat_response.choices.into_iter().next()
          .map(|c| {
            trace!("Finish reason: {:?}", c.finish_reason);
            c.message.content
          })
          .ok_or_else(|| {
            error!("No choices in response");
            crate::error::Error::NoChoicesInResponse
          })
    }
}
