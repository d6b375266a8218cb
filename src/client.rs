use log::{debug, error, info, trace, warn};
use rand::Rng;
use std::time::Duration;

use crate::observability::{SpanStatus, Tracer};
use crate::providers::openai::{
  ChatMessage, ChatRequest, ContentPart, ImageUrl, MessageContent, ResponseFormat
};
use crate::providers::ChatProvider;
use crate::request::{
  GenerationOptions, GenerationRequest, ResponseShape, SamplingParams, Substitutions
};
use crate::{GenerationResult, Payload};

/// Client for the remote text-generation endpoint.
///
/// Never returns an error from a generation call: every failure is
/// logged, traced and reported as `GenerationResult::Failed`.
pub struct GenerationClient
{   provider: Box<dyn ChatProvider>
  , tracer: Tracer
  , temperature: f32
  , presence_penalty: f32
  , frequency_penalty: f32
  , image_detail: String
  , timeout: Duration
}

impl GenerationClient
{   /// Create a client over an explicit provider and tracer
    pub fn new(
      provider: Box<dyn ChatProvider>
    , tracer: Tracer
    , config: &crate::config::GenerationConfig
    ) -> Self
    {   debug!(
          "Creating GenerationClient (model={}, temperature={})",
          provider.model_name(), config.temperature
        );
        GenerationClient
        {   provider
          , tracer
          , temperature: config.temperature
          , presence_penalty: config.presence_penalty
          , frequency_penalty: config.frequency_penalty
          , image_detail: config.image_detail.clone()
          , timeout: Duration::from_secs(config.timeout_secs)
        }
    }

    /// Build the OpenAI provider and tracer from configuration
    pub fn from_config(
      config: &crate::config::AppConfig
    ) -> Result<Self, crate::error::Error>
    {   let provider = crate::providers::OpenAiClient::new(
          config.generation.clone()
        )?;
        let tracer = Tracer::from_config(&config.tracing)?;
        Ok(Self::new(Box::new(provider), tracer, &config.generation))
    }

    pub fn tracer(&self) -> &Tracer
    {   &self.tracer
    }

    /// Run one generation task with the given slot values
    pub async fn generate(
      &self
    , task: crate::Task
    , substitutions: Substitutions
    , options: GenerationOptions
    ) -> GenerationResult
    {   let template = task.template();
        let request = GenerationRequest
        {   name: task.generation_name().to_string()
          , system_template: template.system.to_string()
          , human_template: template.human.to_string()
          , substitutions
          , images: options.image.clone()
          , sampling: self.sampling(&options)
          , shape: options.response_shape.unwrap_or(task.default_shape())
        };
        self.run(&request).await
    }

    /// Run a fully built request
    pub async fn run(&self, request: &GenerationRequest) -> GenerationResult
    {   debug!("Running generation: {}", request.name);
        let span = self.tracer.start_generation(
          &request.name, &request.substitutions, &request.sampling
        );

        match self.try_run(request).await
        {   Ok(Some(raw)) => {
              let payload = self.shape_payload(raw, request.shape);
              let note = match request.shape
              {   ResponseShape::Structured if payload.structured.is_none() => {
                    Some("response is not valid JSON")
                  }
                , _ => None
              };
              self.tracer.end_generation(
                span, Some(&payload.raw), SpanStatus::Success, note
              );
              info!("{} succeeded", request.name);
              GenerationResult::Ok(Some(payload))
            }
          , Ok(None) => {
              self.tracer.end_generation(
                span, None, SpanStatus::Success, Some("empty content")
              );
              warn!("{} returned no content", request.name);
              GenerationResult::Ok(None)
            }
          , Err(e) => {
              let message = e.to_string();
              self.tracer.end_generation(
                span, None, SpanStatus::Error, Some(&message)
              );
              error!("Error in {}: {}", request.name, message);
              GenerationResult::Failed
            }
        }
    }

    /// Attach user feedback to the current trace
    pub fn score_generation(&self, value: i64, name: &str, comment: &str)
    {   self.tracer.score(value, name, comment);
    }

    /// Flush and close the tracer
    pub async fn shutdown(self) -> Result<(), crate::error::Error>
    {   debug!("Shutting down GenerationClient");
        self.tracer.shutdown().await
    }

    fn sampling(&self, options: &GenerationOptions) -> SamplingParams
    {   SamplingParams
        {   temperature: options.temperature.unwrap_or(self.temperature)
          , presence_penalty: options.presence_penalty
              .unwrap_or(self.presence_penalty)
          , frequency_penalty: options.frequency_penalty
              .unwrap_or(self.frequency_penalty)
          , seed: options.seed
              .unwrap_or_else(|| rand::thread_rng().gen_range(0..10_000))
        }
    }

    async fn try_run(
      &self
    , request: &GenerationRequest
    ) -> Result<Option<String>, crate::error::Error>
    {   let chat_request = self.build_chat_request(request)?;
        trace!("Chat request for {}: {:?}", request.name, chat_request);

        tokio::time::timeout(
          self.timeout
        , self.provider.complete(&chat_request)
        )
        .await
        .map_err(|_| {
          error!("{} timed out after {:?}", request.name, self.timeout);
          crate::error::Error::Timeout
        })?
    }

    /// Format templates and assemble the role-ordered message list
    pub fn build_chat_request(
      &self
    , request: &GenerationRequest
    ) -> Result<ChatRequest, crate::error::Error>
    {   let system = crate::prompts::render(
          &request.system_template, &request.substitutions
        )?;
        let human = crate::prompts::render(
          &request.human_template, &request.substitutions
        )?;

        let mut messages = Vec::with_capacity(2);
        if !system.trim().is_empty()
        {   messages.push(ChatMessage
            {   role: "system".to_string()
              , content: MessageContent::Text(system)
            });
        }

        let content = match &request.images
        {   Some(images) => {
              let mut parts = vec![ContentPart::Text { text: human }];
              for url in images.to_urls()?
              {   parts.push(ContentPart::ImageUrl
                  {   image_url: ImageUrl
                      {   url
                        , detail: self.image_detail.clone()
                      }
                  });
              }
              MessageContent::Parts(parts)
            }
          , None => MessageContent::Text(human)
        };
        messages.push(ChatMessage
        {   role: "user".to_string()
          , content
        });

        Ok(ChatRequest
        {   model: self.provider.model_name().to_string()
          , messages
          , temperature: request.sampling.temperature
          , presence_penalty: request.sampling.presence_penalty
          , frequency_penalty: request.sampling.frequency_penalty
          , response_format: ResponseFormat
            {   kind: request.shape.format_tag().to_string()
            }
          , seed: request.sampling.seed
        })
    }

    fn shape_payload(&self, raw: String, shape: ResponseShape) -> Payload
    {   match shape
        {   ResponseShape::Text => Payload::text(raw)
          , ResponseShape::Structured => {
              match crate::helpers::format_json(&raw)
              {   Ok(value) => Payload
                  {   raw
                    , structured: Some(value)
                  }
                , Err(e) => {
                    // raw text still goes back to the caller
                    warn!("Structured response did not parse: {}", e);
                    Payload::text(raw)
                  }
              }
            }
        }
    }
}
