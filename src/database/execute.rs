use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, error, warn};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Number, Value};
use std::path::Path;

/// Run one query against the database at `db_path`.
///
/// The connection is opened read-only and closed before returning on
/// every path. An empty result set is `Error::NoResults`, an engine
/// rejection `Error::SqlError`, anything else `Error::DatabaseError`.
pub fn execute_query(
  db_path: &Path
, query: &str
) -> Result<Vec<crate::Record>, crate::error::Error>
{   debug!("Executing query against {}", db_path.display());

    let conn = Connection::open_with_flags(
      db_path
    , OpenFlags::SQLITE_OPEN_READ_ONLY
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
        | OpenFlags::SQLITE_OPEN_URI
    ).map_err(|e| {
      error!("Failed to open {}: {}", db_path.display(), e);
      crate::error::Error::DatabaseError(e.to_string())
    })?;

    let result = run_statement(&conn, query);

    if let Err((_, e)) = conn.close()
    {   warn!("Failed to close connection cleanly: {}", e);
    }

    let records = result?;
    if records.is_empty()
    {   debug!("Query returned no rows");
        return Err(crate::error::Error::NoResults);
    }
    debug!("Query returned {} rows", records.len());
    Ok(records)
}

fn run_statement(
  conn: &Connection
, query: &str
) -> Result<Vec<crate::Record>, crate::error::Error>
{   let mut stmt = conn.prepare(query).map_err(classify)?;
    let columns: Vec<String> = stmt.column_names()
      .into_iter()
      .map(String::from)
      .collect();

    let mut rows = stmt.query([]).map_err(classify)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next().map_err(classify)?
    {   let mut record = Map::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate()
        {   let value = row.get_ref(i).map_err(classify)?;
            record.insert(name.clone(), to_json(value));
        }
        records.push(record);
    }
    Ok(records)
}

fn classify(e: rusqlite::Error) -> crate::error::Error
{   // engine-reported failures carry a sqlite result code
    if e.sqlite_error_code().is_some()
      || matches!(e, rusqlite::Error::MultipleStatement)
    {   debug!("Engine rejected query: {}", e);
        crate::error::Error::SqlError(e.to_string())
    } else
    {   error!("Query failed: {}", e);
        crate::error::Error::DatabaseError(e.to_string())
    }
}

fn to_json(value: ValueRef<'_>) -> Value
{   match value
    {   ValueRef::Null => Value::Null
      , ValueRef::Integer(i) => Value::from(i)
      , ValueRef::Real(f) => Number::from_f64(f)
          .map(Value::Number)
          .unwrap_or(Value::Null)
      , ValueRef::Text(bytes) => {
          Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
      , ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes))
    }
}
