//! Generation request types and image normalization

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Named slot values for a template
pub type Substitutions = BTreeMap<String, String>;

/// Shape the caller wants back from a generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseShape
{   #[default]
    Text
  , /// JSON object; parsed after stripping any code fence
    Structured
}

impl ResponseShape
{   /// Value of the wire `response_format.type` field
    pub fn format_tag(self) -> &'static str
    {   match self
        {   ResponseShape::Text => "text"
          , ResponseShape::Structured => "json_object"
        }
    }
}

/// Image attachment in any of the accepted forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput
{   Path(PathBuf)
  , Paths(Vec<PathBuf>)
  , /// `http(s)://` or `data:` URL
    Url(String)
  , /// Bare base64 image bytes
    Base64(String)
}

impl ImageInput
{   /// Normalize to URLs the endpoint accepts; local files are
    /// inlined as base64 data URIs
    pub fn to_urls(&self) -> Result<Vec<String>, crate::error::Error>
    {   match self
        {   ImageInput::Path(path) => Ok(vec![encode_file(path)?])
          , ImageInput::Paths(paths) => paths
              .iter()
              .map(|p| encode_file(p))
              .collect()
          , ImageInput::Url(url) => {
              if url.starts_with("http://")
                || url.starts_with("https://")
                || url.starts_with("data:")
              {   Ok(vec![url.clone()])
              } else
              {   error!("Unsupported image URL: {}", url);
                  Err(crate::error::Error::ImageError(
                    format!("unsupported image URL: {}", url)
                  ))
              }
            }
          , ImageInput::Base64(data) => {
              let data = data.trim();
              if data.starts_with("data:")
              {   Ok(vec![data.to_string()])
              } else
              {   Ok(vec![format!("data:image/jpeg;base64,{}", data)])
              }
            }
        }
    }
}

fn encode_file(path: &Path) -> Result<String, crate::error::Error>
{   debug!("Encoding image {}", path.display());
    let bytes = std::fs::read(path).map_err(|e| {
      error!("Failed to read image {}: {}", path.display(), e);
      crate::error::Error::ImageError(
        format!("{}: {}", path.display(), e)
      )
    })?;
    Ok(format!(
      "data:{};base64,{}", mime_for(path), STANDARD.encode(bytes)
    ))
}

fn mime_for(path: &Path) -> &'static str
{   let ext = path.extension()
      .and_then(|e| e.to_str())
      .map(|e| e.to_ascii_lowercase());
    match ext.as_deref()
    {   Some("png") => "image/png"
      , Some("gif") => "image/gif"
      , Some("webp") => "image/webp"
      , _ => "image/jpeg"
    }
}

/// Sampling parameters sent with every call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams
{   pub temperature: f32
  , pub presence_penalty: f32
  , pub frequency_penalty: f32
  , pub seed: u64
}

/// Per-call overrides for the generation client
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions
{   pub temperature: Option<f32>
  , pub presence_penalty: Option<f32>
  , pub frequency_penalty: Option<f32>
  , /// Falls back to the task's default shape
    pub response_shape: Option<ResponseShape>
  , pub image: Option<ImageInput>
  , /// Drawn fresh per call when absent
    pub seed: Option<u64>
}

impl GenerationOptions
{   pub fn structured() -> Self
    {   GenerationOptions
        {   response_shape: Some(ResponseShape::Structured)
          , ..Default::default()
        }
    }
}

/// Fully resolved request; built once per stage and not mutated
#[derive(Debug, Clone)]
pub struct GenerationRequest
{   /// Span name reported to the tracer
    pub name: String
  , pub system_template: String
  , pub human_template: String
  , pub substitutions: Substitutions
  , pub images: Option<ImageInput>
  , pub sampling: SamplingParams
  , pub shape: ResponseShape
}
