use log::{debug, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};

/// Column affinity inferred from the cells of a CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType
{   Integer
  , Real
  , Text
}

impl ColumnType
{   fn sql(self) -> &'static str
    {   match self
        {   ColumnType::Integer => "INTEGER"
          , ColumnType::Real => "REAL"
          , ColumnType::Text => "TEXT"
        }
    }

    /// Narrowest type that fits every non-empty cell
    pub fn infer<'a, I>(cells: I) -> Self
    where I: IntoIterator<Item = &'a str>
    {   let mut kind = ColumnType::Integer;
        for cell in cells.into_iter().map(str::trim).filter(|c| !c.is_empty())
        {   if kind == ColumnType::Integer && cell.parse::<i64>().is_err()
            {   kind = ColumnType::Real;
            }
            if kind == ColumnType::Real && cell.parse::<f64>().is_err()
            {   return ColumnType::Text;
            }
        }
        kind
    }

    fn convert(self, cell: &str) -> SqlValue
    {   let trimmed = cell.trim();
        if trimmed.is_empty()
        {   return SqlValue::Null;
        }
        match self
        {   ColumnType::Integer => trimmed.parse()
              .map(SqlValue::Integer)
              .unwrap_or_else(|_| SqlValue::Text(cell.to_string()))
          , ColumnType::Real => trimmed.parse()
              .map(SqlValue::Real)
              .unwrap_or_else(|_| SqlValue::Text(cell.to_string()))
          , ColumnType::Text => SqlValue::Text(cell.to_string())
        }
    }
}

fn quote_ident(name: &str) -> String
{   format!("\"{}\"", name.replace('"', "\"\""))
}

fn db_err(e: rusqlite::Error) -> crate::error::Error
{   crate::error::Error::DatabaseError(e.to_string())
}

/// Load one CSV file into `table`, replacing any existing table.
/// Returns the number of rows written.
pub fn import_csv(
  conn: &mut Connection
, table: &str
, csv_path: &Path
, max_rows: Option<usize>
) -> Result<usize, crate::error::Error>
{   debug!("Reading {}", csv_path.display());
    let mut reader = csv::Reader::from_path(csv_path).map_err(|e| {
      crate::error::Error::ParseError(
        format!("{}: {}", csv_path.display(), e)
      )
    })?;
    let headers: Vec<String> = reader.headers()
      .map_err(|e| crate::error::Error::ParseError(e.to_string()))?
      .iter()
      .map(String::from)
      .collect();

    let mut rows = Vec::new();
    for record in reader.records().take(max_rows.unwrap_or(usize::MAX))
    {   rows.push(record.map_err(|e| {
          crate::error::Error::ParseError(e.to_string())
        })?);
    }

    let types: Vec<ColumnType> = (0..headers.len())
      .map(|i| ColumnType::infer(rows.iter().map(|r| r.get(i).unwrap_or(""))))
      .collect();

    let columns = headers.iter()
      .zip(&types)
      .map(|(h, t)| format!("{} {}", quote_ident(h), t.sql()))
      .collect::<Vec<_>>()
      .join(", ");
    let placeholders = vec!["?"; headers.len()].join(", ");

    let tx = conn.transaction().map_err(db_err)?;
    tx.execute_batch(&format!(
      "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({columns});",
      table = quote_ident(table),
      columns = columns
    )).map_err(db_err)?;
    {   let mut insert = tx.prepare(&format!(
          "INSERT INTO {} VALUES ({})", quote_ident(table), placeholders
        )).map_err(db_err)?;
        for row in &rows
        {   let values = types.iter()
              .enumerate()
              .map(|(i, t)| t.convert(row.get(i).unwrap_or("")));
            insert.execute(params_from_iter(values)).map_err(db_err)?;
        }
    }
    tx.commit().map_err(db_err)?;

    info!("Imported {} into table {}", csv_path.display(), table);
    Ok(rows.len())
}

/// Import every `*.csv` in `dir` into `db_path`, one table per file stem
pub fn import_directory(
  db_path: &Path
, dir: &Path
, max_rows: Option<usize>
) -> Result<Vec<(String, usize)>, crate::error::Error>
{   let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
      .map_err(|e| crate::error::Error::Other(
        format!("{}: {}", dir.display(), e)
      ))?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
      .collect();
    files.sort();

    let mut conn = Connection::open(db_path).map_err(db_err)?;
    let mut imported = Vec::with_capacity(files.len());
    for path in files
    {   let table = path.file_stem()
          .and_then(|s| s.to_str())
          .unwrap_or_default()
          .to_string();
        let count = import_csv(&mut conn, &table, &path, max_rows)?;
        imported.push((table, count));
    }
    conn.close().map_err(|(_, e)| db_err(e))?;

    info!("All tables imported successfully");
    Ok(imported)
}
