//! Cleanup for model output wrapped in markdown code fences

use serde_json::Value;

const FENCE: &str = "```";

/// Words that open a statement and so never count as a fence info string
const STATEMENT_KEYWORDS: &[&str] = &[
  "select", "with", "insert", "update", "delete"
, "create", "drop", "pragma", "explain", "values"
];

/// Remove surrounding markdown code fences, with or without an info
/// string (```` ```sql ````), and trim whitespace.
///
/// Only whole fences at the edges are removed, so characters that
/// merely appear in a fence tag (`s`, `q`, `l`) survive. Stripping
/// repeats until nothing changes, which makes it idempotent.
pub fn strip_code_fence(data: &str) -> &str
{   let mut body = data.trim();
    loop
    {   let next = strip_once(body);
        if next == body
        {   return body;
        }
        body = next;
    }
}

fn strip_once(data: &str) -> &str
{   let mut body = data;

    if let Some(rest) = body.strip_prefix(FENCE)
    {   body = match rest.split_once('\n')
        {   Some((tag, after)) if is_info_string(tag) => after
          , _ => strip_inline_tag(rest)
        };
    }
    if let Some(rest) = body.trim_end().strip_suffix(FENCE)
    {   body = rest;
    }

    body.trim()
}

/// Drop a tag written on the fence line itself (```` ```json{..} ````),
/// but only when the body clearly starts right after it
fn strip_inline_tag(rest: &str) -> &str
{   let end = rest
      .find(|c: char| !is_tag_char(c))
      .unwrap_or(rest.len());
    let (tag, after) = rest.split_at(end);
    let after = after.trim_start();
    if !tag.is_empty() && is_info_string(tag) && opens_body(after)
    {   after
    } else
    {   rest
    }
}

fn opens_body(text: &str) -> bool
{   if text.starts_with('{') || text.starts_with('[')
    {   return true;
    }
    let word = text
      .split(|c: char| !c.is_ascii_alphabetic())
      .next()
      .unwrap_or_default();
    STATEMENT_KEYWORDS.contains(&word.to_ascii_lowercase().as_str())
}

fn is_tag_char(c: char) -> bool
{   c.is_ascii_alphanumeric() || "_+-.".contains(c)
}

fn is_info_string(tag: &str) -> bool
{   let tag = tag.trim();
    tag.chars().all(is_tag_char)
      && !STATEMENT_KEYWORDS.contains(&tag.to_ascii_lowercase().as_str())
}

/// Query text without fence wrapping
pub fn format_sql(data: &str) -> String
{   strip_code_fence(data).to_string()
}

/// Parse fenced or bare JSON
pub fn format_json(data: &str) -> Result<Value, crate::error::Error>
{   Ok(serde_json::from_str(strip_code_fence(data))?)
}
