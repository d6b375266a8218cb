use std::fmt;

/// Custom error type for skyquery operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// API key is missing for the generation endpoint
    MissingApiKey(String)
  , /// HTTP request error
    HttpError(String)
  , /// API returned an error response
    ApiError(String)
  , /// Failed to parse an API response or model output
    ParseError(String)
  , /// No choices in API response
    NoChoicesInResponse
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// Prompt template could not be rendered
    TemplateError(String)
  , /// Image attachment could not be loaded
    ImageError(String)
  , /// Query ran but matched no rows
    NoResults
  , /// Engine rejected the query
    SqlError(String)
  , /// Any other database failure
    DatabaseError(String)
  , /// Timeout error
    Timeout
  , /// Generic error
    Other(String)
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::MissingApiKey(target) => {
              write!(f, "Missing API key for: {}", target)
            }
          , Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::ApiError(msg) => {
              write!(f, "API error: {}", msg)
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::NoChoicesInResponse => {
              write!(f, "API response contained no choices")
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::TemplateError(msg) => {
              write!(f, "Template error: {}", msg)
            }
          , Error::ImageError(msg) => {
              write!(f, "Image error: {}", msg)
            }
          , Error::NoResults => {
              write!(f, "No results found")
            }
          , Error::SqlError(msg) => {
              write!(f, "SQL Error: {}", msg)
            }
          , Error::DatabaseError(msg) => {
              write!(f, "Unexpected Error: {}", msg)
            }
          , Error::Timeout => {
              write!(f, "Request timed out")
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}

impl From<serde_json::Error> for Error
{   fn from(e: serde_json::Error) -> Self
    {   Error::ParseError(e.to_string())
    }
}
