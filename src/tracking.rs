use std::rc::Rc;
use std::cell::RefCell;

use serde::{Serialize, Deserialize};
use serde_json::json;
use tracing::{debug, info};

use crate::{
  config::TrackerConfig,
  error::{ Error, Result },
};


/// Session with an experiment tracking service.
///
/// A session gets opened once per run and must be closed
/// exactly once, after which no more values may be logged.

pub trait Tracker {
  fn log_metric(&mut self, tag: &str, value: f64, step: usize) -> Result<()>;
  fn close(&mut self) -> Result<()>;
}


fn tracker_error(err: reqwest::Error) -> Error {
  Error::Tracker(err.to_string())
}

#[derive(Deserialize)]
struct RunCreated {
  id: String,
}


/// Tracker talking JSON over HTTP to a remote service.

pub struct HttpTracker {
  client: reqwest::blocking::Client,
  url: String,
  token: String,
  run_id: String,
  closed: bool,
}

impl HttpTracker {
  /// Open a new run, recording `params` as its hyperparameters.

  pub fn start(config: &TrackerConfig, params: &impl Serialize) -> Result<Self> {
    let client = reqwest::blocking::Client::builder()
      .user_agent(concat!("microtrain/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(tracker_error)?;
    let url = config.url.trim_end_matches('/').to_string();
    let params = serde_json::to_value(params)
      .map_err(|err| Error::Tracker(err.to_string()) )?;
    let created: RunCreated = client
      .post(format!("{}/runs", url))
      .bearer_auth(&config.api_token)
      .json(&json!({
        "project": config.project,
        "name": config.name,
        "params": params,
      }))
      .send()
      .and_then(|response| response.error_for_status() )
      .and_then(|response| response.json() )
      .map_err(tracker_error)?;
    info!(run = %created.id, project = %config.project, "Opened tracking run");
    Ok(Self {
      client,
      url,
      token: config.api_token.clone(),
      run_id: created.id,
      closed: false,
    })
  }

  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<()> {
    self.client
      .post(format!("{}/runs/{}/{}", self.url, self.run_id, endpoint))
      .bearer_auth(&self.token)
      .json(&body)
      .send()
      .and_then(|response| response.error_for_status() )
      .map_err(tracker_error)?;
    Ok(())
  }
}

impl Tracker for HttpTracker {
  fn log_metric(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
    if self.closed {
      return Err(Error::Tracker(format!("run {} is already closed", self.run_id)))
    }
    debug!(tag, value, step, "Logging metric");
    self.post("log", json!({ "tag": tag, "value": value, "step": step }))
  }

  fn close(&mut self) -> Result<()> {
    if self.closed { return Ok(()) }
    self.closed = true;
    self.post("close", json!({}))?;
    info!(run = %self.run_id, "Closed tracking run");
    Ok(())
  }
}


/// One value received by a [MemoryTracker].

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
  pub tag: String,
  pub value: f64,
  pub step: usize,
}

#[derive(Debug, Default)]
struct Journal {
  records: Vec<Record>,
  closes: usize,
}


/// Tracker keeping all values in memory.
///
/// Clones share the same journal, so a copy may be kept to
/// inspect what a run logged after handing it off.

#[derive(Debug, Clone, Default)]
pub struct MemoryTracker {
  journal: Rc<RefCell<Journal>>,
}

impl MemoryTracker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn records(&self) -> Vec<Record> {
    self.journal.borrow().records.clone()
  }

  /// All `(step, value)` pairs logged under `tag`.

  pub fn series(&self, tag: &str) -> Vec<(usize, f64)> {
    self.journal.borrow().records.iter()
      .filter(|record| record.tag == tag )
      .map(|record| (record.step, record.value) )
      .collect()
  }

  /// How often the session was closed.

  pub fn closes(&self) -> usize {
    self.journal.borrow().closes
  }
}

impl Tracker for MemoryTracker {
  fn log_metric(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
    let mut journal = self.journal.borrow_mut();
    if journal.closes > 0 {
      return Err(Error::Tracker("session is already closed".to_string()))
    }
    journal.records.push(Record { tag: tag.to_string(), value, step });
    Ok(())
  }

  fn close(&mut self) -> Result<()> {
    self.journal.borrow_mut().closes += 1;
    Ok(())
  }
}
