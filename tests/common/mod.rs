#![allow(dead_code)]

use async_trait::async_trait;
use rusqlite::Connection;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use skyquery::config::GenerationConfig;
use skyquery::error::Error;
use skyquery::observability::Tracer;
use skyquery::providers::{ChatProvider, ChatRequest};
use skyquery::{GenerationClient, Pipeline};

pub type Reply = Result<Option<String>, Error>;

/// Provider that replays canned replies and records every request
#[derive(Clone, Default)]
pub struct ScriptedProvider
{   replies: Arc<Mutex<VecDeque<Reply>>>
  , requests: Arc<Mutex<Vec<ChatRequest>>>
}

impl ScriptedProvider
{   pub fn new(replies: Vec<Reply>) -> Self
    {   ScriptedProvider
        {   replies: Arc::new(Mutex::new(replies.into()))
          , requests: Arc::new(Mutex::new(vec![]))
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest>
    {   self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider
{   fn model_name(&self) -> &str
    {   "scripted-model"
    }

    async fn complete(
      &self
    , request: &ChatRequest
    ) -> Result<Option<String>, Error>
    {   self.requests.lock().unwrap().push(request.clone());
        self.replies.lock().unwrap()
          .pop_front()
          .unwrap_or_else(|| Err(Error::Other("script exhausted".into())))
    }
}

/// Provider that never answers in time
pub struct StalledProvider;

#[async_trait]
impl ChatProvider for StalledProvider
{   fn model_name(&self) -> &str
    {   "stalled-model"
    }

    async fn complete(
      &self
    , _request: &ChatRequest
    ) -> Result<Option<String>, Error>
    {   tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(Some("too late".to_string()))
    }
}

pub fn ok(text: &str) -> Reply
{   Ok(Some(text.to_string()))
}

pub fn client_with(provider: impl ChatProvider + 'static) -> GenerationClient
{   GenerationClient::new(
      Box::new(provider)
    , Tracer::Null
    , &GenerationConfig::default()
    )
}

pub fn pipeline_with(provider: ScriptedProvider, db: &Path) -> Pipeline
{   Pipeline::new(client_with(provider), db.to_path_buf())
}

/// Flights table with 42 departures from JFK and 3 from LAX
pub fn flights_db(dir: &Path) -> PathBuf
{   let path = dir.join("flights.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
      "CREATE TABLE flights (
         FLIGHT_NUMBER INTEGER,
         AIRLINE TEXT,
         ORIGIN_AIRPORT TEXT,
         DESTINATION_AIRPORT TEXT,
         DEPARTURE_DELAY REAL
       );"
    ).unwrap();
    for i in 0..45
    {   let origin = if i < 42 { "JFK" } else { "LAX" };
        conn.execute(
          "INSERT INTO flights VALUES (?1, 'AA', ?2, 'SFO', ?3)",
          rusqlite::params![i, origin, i as f64 * 1.5],
        ).unwrap();
    }
    conn.close().unwrap();
    path
}

pub const COUNT_SQL: &str
  = "```sql\nSELECT COUNT(*) AS count FROM flights WHERE ORIGIN_AIRPORT = 'JFK';\n```";

pub const VALID: &str = "```json\n{\"is_valid\": true}\n```";
