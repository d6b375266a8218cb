//! Server-rendered HTML pages

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 960px; margin: 2rem auto; color: #222; }
form.ask textarea { width: 100%; }
table { border-collapse: collapse; margin-top: 1rem; }
th, td { border: 1px solid #ccc; padding: 0.3rem 0.6rem; text-align: left; }
.message { background: #f3f6fa; padding: 1rem; border-radius: 4px; }
.feedback { margin-top: 2rem; }
"#;

pub fn escape_html(text: &str) -> String
{   let mut out = String::with_capacity(text.len());
    for c in text.chars()
    {   match c
        {   '&' => out.push_str("&amp;")
          , '<' => out.push_str("&lt;")
          , '>' => out.push_str("&gt;")
          , '"' => out.push_str("&quot;")
          , '\'' => out.push_str("&#39;")
          , _ => out.push(c)
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String
{   format!(
r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
    <h1>Flights Q&amp;A</h1>
{body}
</body>
</html>"#,
      title = escape_html(title),
      style = STYLE,
      body = body
    )
}

fn question_form(query: &str) -> String
{   format!(
r#"    <form class="ask" method="post" action="/process-query">
        <textarea name="query" rows="3" required placeholder="How many flights departed from JFK?">{}</textarea>
        <button type="submit">Ask</button>
    </form>"#,
      escape_html(query)
    )
}

/// Landing page with the question form
pub fn index_page() -> String
{   layout("Flights Q&A", &question_form(""))
}

/// Answer page: message, result table and feedback form
pub fn results_page(
  query: &str
, columns: &[String]
, message: &str
, data: &[crate::Record]
) -> String
{   let mut body = question_form(query);
    body.push_str(&format!(
      "\n    <p class=\"question\"><strong>Question:</strong> {}</p>\n    <div class=\"message\">{}</div>\n",
      escape_html(query),
      escape_html(message)
    ));

    if !data.is_empty()
    {   body.push_str("    <table>\n        <tr>");
        for column in columns
        {   body.push_str(&format!("<th>{}</th>", escape_html(column)));
        }
        body.push_str("</tr>\n");
        for row in data
        {   body.push_str("        <tr>");
            for column in columns
            {   let cell = row.get(column).map(cell_text).unwrap_or_default();
                body.push_str(&format!("<td>{}</td>", escape_html(&cell)));
            }
            body.push_str("</tr>\n");
        }
        body.push_str("    </table>\n");
    }

    body.push_str(
r#"    <form class="feedback" method="post" action="/submit-feedback">
        <label>Rating
            <select name="rating">
                <option value="1">1</option>
                <option value="2">2</option>
                <option value="3">3</option>
                <option value="4">4</option>
                <option value="5" selected>5</option>
            </select>
        </label>
        <input type="text" name="comment" placeholder="Comment (optional)">
        <button type="submit">Send feedback</button>
    </form>"#);

    layout("Flights Q&A - Answer", &body)
}

/// Fragment returned after feedback is accepted
pub fn feedback_ack() -> String
{   "<p class=\"feedback-ack\">Thank you for your feedback!</p>".to_string()
}

fn cell_text(value: &serde_json::Value) -> String
{   match value
    {   serde_json::Value::Null => String::new()
      , serde_json::Value::String(s) => s.clone()
      , other => other.to_string()
    }
}
