//! Remote text-generation endpoints

pub mod openai;

use async_trait::async_trait;

// Re-export for convenience
pub use openai::{ChatRequest, OpenAiClient};

/// A remote endpoint that completes a chat request
#[async_trait]
pub trait ChatProvider: Send + Sync
{   /// Model or deployment the provider sends requests to
    fn model_name(&self) -> &str;

    /// Returns the first choice's content, which may be null
    async fn complete(
      &self
    , request: &ChatRequest
    ) -> Result<Option<String>, crate::error::Error>;
}
