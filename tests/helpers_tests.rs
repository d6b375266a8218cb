use serde_json::json;
use skyquery::helpers::{format_json, format_sql};

#[test]
fn test_format_sql_cleans_markdown()
{   let cases = [
      ("```sql\nSELECT * FROM flights;\n```", "SELECT * FROM flights;")
    , ("```SELECT * FROM flights;```", "SELECT * FROM flights;")
    , ("SELECT * FROM flights;", "SELECT * FROM flights;")
    , ("```\nSELECT 1;\n```", "SELECT 1;")
    , ("```SQL\nSELECT 1;\n```\n", "SELECT 1;")
    , ("```\nSELECT\n  1;\n```", "SELECT\n  1;")
    , ("```sql SELECT 1;```", "SELECT 1;")
    , ("```sqlite\tselect 1;```", "select 1;")
    , ("```sql SELECT 1;\n```", "SELECT 1;")
    ];
    for (input, expected) in cases
    {   assert_eq!(format_sql(input), expected, "input: {:?}", input);
    }
}

#[test]
fn test_format_sql_keeps_edge_characters()
{   // trimming by character set would eat the trailing `l`
    assert_eq!(format_sql("SELECT col FROM sql"), "SELECT col FROM sql");
    assert_eq!(
      format_sql("```sql\nSELECT * FROM t WHERE c = 'sql'\n```")
    , "SELECT * FROM t WHERE c = 'sql'"
    );
}

#[test]
fn test_format_sql_keeps_words_that_are_not_tags()
{   // a leading statement keyword is the query, not a tag
    assert_eq!(format_sql("```SELECT 1;```"), "SELECT 1;");
    assert_eq!(format_sql("```select\n1;```"), "select\n1;");
    // a word not followed by a statement start stays put
    assert_eq!(format_sql("```count is 42```"), "count is 42");
}

#[test]
fn test_format_sql_is_idempotent()
{   let inputs = [
      "```sql\nSELECT 1;\n```"
    , "SELECT 1;"
    , "  ```\n```sql\nSELECT 2;\n```\n```  "
    , "```sql SELECT 3;```"
    , "```"
    , ""
    ];
    for input in inputs
    {   let once = format_sql(input);
        assert_eq!(format_sql(&once), once, "input: {:?}", input);
    }
}

#[test]
fn test_format_json_parses_correctly()
{   let cases = [
      ("```json\n{\"valid\": true}\n```", json!({"valid": true}))
    , ("{\"valid\": false}", json!({"valid": false}))
    , ("  \n\n{\"count\": 5}  ", json!({"count": 5}))
    , ("```json{\"is_valid\":true}```", json!({"is_valid": true}))
    , ("```json {\"is_valid\": true}```", json!({"is_valid": true}))
    , ("```json [1, 2]```", json!([1, 2]))
    ];
    for (input, expected) in cases
    {   assert_eq!(format_json(input).unwrap(), expected);
    }
}

#[test]
fn test_format_json_round_trips_mappings()
{   let mapping = json!({
      "is_valid": true,
      "tables": ["flights", "airports"],
      "nested": {"count": 42, "ratio": 0.5, "none": null}
    });
    let serialized = serde_json::to_string_pretty(&mapping).unwrap();

    assert_eq!(format_json(&serialized).unwrap(), mapping);
    assert_eq!(format_json(&format!("```json\n{}\n```", serialized)).unwrap(), mapping);
    assert_eq!(format_json(&format!("```\n{}\n```", serialized)).unwrap(), mapping);

    let compact = serde_json::to_string(&mapping).unwrap();
    assert_eq!(format_json(&format!("```json{}```", compact)).unwrap(), mapping);
    assert_eq!(format_json(&format!("```json {}```", compact)).unwrap(), mapping);
}

#[test]
fn test_format_json_rejects_garbage()
{   assert!(format_json("{'is_valid': true}").is_err());
    assert!(format_json("```json\n```").is_err());
}
