use chrono::Utc;
use reqwest::{blocking::Client, Method};
use serde_json::{json, Value};
use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  thread::sleep,
  time::Duration,
};
use tracing::{debug, info, warn};

use crate::audit::AuditSink;
use crate::auth::Authorizer;
use crate::bracket::Bracket;
use crate::error::{TournamentError, TournamentResult};
use crate::store::{ChangeCallback, RemoteStore, Subscription};
use crate::types::{RecordId, RemoteRecord, StoredState};

// ── Table names ────────────────────────────────────────────────────────

pub const TOURNAMENTS_TABLE: &str = "tournaments";
pub const BRACKET_STATE_TABLE: &str = "bracket_state";
pub const AUDIT_LOG_TABLE: &str = "bracket_audit_log";
pub const ADMIN_CODES_TABLE: &str = "admin_codes";

const REQUEST_TIMEOUT_SECS: u64 = 10;

// ── REST client ────────────────────────────────────────────────────────

/// Minimal PostgREST client: every table lives under `{base}/rest/v1/`.
#[derive(Clone)]
pub struct RestClient {
  base_url: String,
  key: String,
  http: Client,
}

impl RestClient {
  pub fn new(base_url: &str, key: &str) -> TournamentResult<Self> {
    let base_url = base_url.trim().trim_end_matches('/').to_string();
    let key = key.trim().to_string();
    if base_url.is_empty() || key.is_empty() {
      return Err(TournamentError::Config(
        "Remote URL and key are both required.".to_string(),
      ));
    }
    let http = Client::builder()
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .user_agent("bracket-board")
      .build()
      .map_err(|e| TournamentError::Config(format!("build http client: {e}")))?;
    Ok(RestClient { base_url, key, http })
  }

  fn table_url(&self, table: &str) -> String {
    format!("{}/rest/v1/{table}", self.base_url)
  }

  /// Sends one request and returns the JSON rows of the response.
  pub fn request(
    &self,
    method: Method,
    table: &str,
    query: &[(&str, String)],
    body: Option<&Value>,
  ) -> TournamentResult<Vec<Value>> {
    let url = self.table_url(table);
    debug!("remote {method} {url} {query:?}");
    let mut builder = self
      .http
      .request(method.clone(), &url)
      .header("apikey", &self.key)
      .header("Authorization", format!("Bearer {}", self.key))
      .header("Prefer", "return=representation")
      .query(query);
    if let Some(body) = body {
      builder = builder.json(body);
    }
    let resp = builder
      .send()
      .map_err(|e| TournamentError::persistence(format!("{method} {table} failed: {e}")))?;
    let status = resp.status();
    let text = resp
      .text()
      .map_err(|e| TournamentError::persistence(format!("{method} {table} read failed: {e}")))?;
    if !status.is_success() {
      return Err(TournamentError::persistence(format!(
        "{method} {table} error {status}: {text}"
      )));
    }
    if text.trim().is_empty() {
      return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(&text) {
      Ok(Value::Array(rows)) => Ok(rows),
      Ok(Value::Null) => Ok(Vec::new()),
      Ok(row) => Ok(vec![row]),
      Err(e) => Err(TournamentError::persistence(format!(
        "{method} {table} parse failed: {e}"
      ))),
    }
  }
}

pub fn value_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Id of the first active tournament, creating one named `name` when none
/// is active.
pub fn resolve_tournament_id(client: &RestClient, name: &str) -> TournamentResult<String> {
  let rows = client.request(
    Method::GET,
    TOURNAMENTS_TABLE,
    &[
      ("select", "*".to_string()),
      ("is_active", "eq.true".to_string()),
      ("limit", "1".to_string()),
    ],
    None,
  )?;
  if let Some(id) = rows.first().and_then(|row| row.get("id")).and_then(value_to_string) {
    return Ok(id);
  }
  let created = client.request(
    Method::POST,
    TOURNAMENTS_TABLE,
    &[],
    Some(&json!([{ "name": name, "is_active": true }])),
  )?;
  let id = created
    .first()
    .and_then(|row| row.get("id"))
    .and_then(value_to_string)
    .ok_or_else(|| TournamentError::persistence("Created tournament has no id."))?;
  info!("created tournament {name:?} ({id})");
  Ok(id)
}

// ── Bracket state rows ─────────────────────────────────────────────────

pub fn record_from_row(row: &Value) -> TournamentResult<RemoteRecord> {
  let id = row
    .get("id")
    .and_then(value_to_string)
    .ok_or_else(|| TournamentError::persistence("bracket_state row has no id."))?;
  let revision = row
    .get("updated_at")
    .and_then(value_to_string)
    .unwrap_or_default();
  let participants_text = row
    .get("players_text")
    .and_then(|v| v.as_str())
    .unwrap_or("")
    .to_string();
  let bracket = match row.get("bracket_data") {
    None | Some(Value::Null) => None,
    Some(data) => Some(
      serde_json::from_value::<Bracket>(data.clone())
        .map_err(|e| TournamentError::persistence(format!("bracket_data {id}: {e}")))?,
    ),
  };
  Ok(RemoteRecord {
    record_id: RecordId::new(id, revision),
    state: StoredState::new(participants_text, bracket),
  })
}

fn state_row(tournament_id: &str, state: &StoredState, updated_by: &str) -> TournamentResult<Value> {
  let bracket_data = match &state.bracket {
    Some(bracket) => serde_json::to_value(bracket).map_err(|e| TournamentError::persistence(e.to_string()))?,
    None => Value::Array(Vec::new()),
  };
  Ok(json!({
    "tournament_id": tournament_id,
    "players_text": state.participants_text,
    "bracket_data": bracket_data,
    "updated_by": updated_by,
    "updated_at": Utc::now().to_rfc3339(),
  }))
}

/// `bracket_state` table as the remote store. Change notifications come
/// from a polling thread that reports every new revision it observes.
pub struct RestRemote {
  client: RestClient,
  poll_interval: Duration,
}

impl RestRemote {
  pub fn new(client: RestClient, poll_interval_ms: u64) -> Self {
    RestRemote {
      client,
      poll_interval: Duration::from_millis(poll_interval_ms.max(100)),
    }
  }

  fn latest(client: &RestClient, tournament_id: &str) -> TournamentResult<Option<RemoteRecord>> {
    let rows = client.request(
      Method::GET,
      BRACKET_STATE_TABLE,
      &[
        ("select", "*".to_string()),
        ("tournament_id", format!("eq.{tournament_id}")),
        ("order", "updated_at.desc".to_string()),
        ("limit", "1".to_string()),
      ],
      None,
    )?;
    rows.first().map(record_from_row).transpose()
  }
}

impl RemoteStore for RestRemote {
  fn get(&self, tournament_id: &str) -> TournamentResult<Option<RemoteRecord>> {
    RestRemote::latest(&self.client, tournament_id)
  }

  fn put(
    &self,
    tournament_id: &str,
    record_id: Option<&RecordId>,
    state: &StoredState,
    updated_by: &str,
  ) -> TournamentResult<RecordId> {
    let row = state_row(tournament_id, state, updated_by)?;
    if let Some(id) = record_id {
      let rows = self.client.request(
        Method::PATCH,
        BRACKET_STATE_TABLE,
        &[("id", format!("eq.{}", id.row))],
        Some(&row),
      )?;
      if let Some(updated) = rows.first() {
        return Ok(record_from_row(updated)?.record_id);
      }
      warn!("bracket_state row {} is gone; inserting a new one", id.row);
    }
    let rows = self
      .client
      .request(Method::POST, BRACKET_STATE_TABLE, &[], Some(&json!([row])))?;
    let inserted = rows
      .first()
      .ok_or_else(|| TournamentError::persistence("Insert returned no row."))?;
    Ok(record_from_row(inserted)?.record_id)
  }

  fn subscribe(&self, tournament_id: &str, on_change: ChangeCallback) -> TournamentResult<Subscription> {
    let client = self.client.clone();
    let interval = self.poll_interval;
    let tournament_id = tournament_id.to_string();
    let mut last_seen = RestRemote::latest(&client, &tournament_id)?.map(|record| record.record_id);
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    std::thread::spawn(move || loop {
      sleep(interval);
      if stop_flag.load(Ordering::Relaxed) {
        break;
      }
      match RestRemote::latest(&client, &tournament_id) {
        Ok(Some(record)) => {
          if last_seen.as_ref() != Some(&record.record_id) {
            last_seen = Some(record.record_id.clone());
            on_change(record);
          }
        }
        Ok(None) => {}
        Err(e) => debug!("remote poll failed: {e}"),
      }
    });

    Ok(Subscription::new(move || stop.store(true, Ordering::Relaxed)))
  }
}

// ── Admin codes ────────────────────────────────────────────────────────

pub struct RestAuthorizer {
  client: RestClient,
}

impl RestAuthorizer {
  pub fn new(client: RestClient) -> Self {
    RestAuthorizer { client }
  }
}

impl Authorizer for RestAuthorizer {
  fn authorize(&self, code: &str) -> bool {
    let code = code.trim();
    if code.is_empty() {
      return false;
    }
    let rows = match self.client.request(
      Method::GET,
      ADMIN_CODES_TABLE,
      &[
        ("select", "code".to_string()),
        ("code", format!("eq.{code}")),
        ("is_active", "eq.true".to_string()),
        ("limit", "1".to_string()),
      ],
      None,
    ) {
      Ok(rows) => rows,
      Err(e) => {
        warn!("admin code check failed: {e}");
        return false;
      }
    };
    if rows.is_empty() {
      return false;
    }
    let stamp = json!({ "last_used_at": Utc::now().to_rfc3339() });
    if let Err(e) = self.client.request(
      Method::PATCH,
      ADMIN_CODES_TABLE,
      &[("code", format!("eq.{code}"))],
      Some(&stamp),
    ) {
      debug!("admin code last_used_at update failed: {e}");
    }
    true
  }
}

// ── Audit log ──────────────────────────────────────────────────────────

pub struct RestAuditSink {
  client: RestClient,
}

impl RestAuditSink {
  pub fn new(client: RestClient) -> Self {
    RestAuditSink { client }
  }
}

impl AuditSink for RestAuditSink {
  fn append(&self, tournament_id: &str, action: &str, actor: Option<&str>, details: Value) {
    let client = self.client.clone();
    let row = json!([{
      "tournament_id": tournament_id,
      "action": action,
      "admin_code": actor,
      "details": details,
    }]);
    std::thread::spawn(move || {
      if let Err(e) = client.request(Method::POST, AUDIT_LOG_TABLE, &[], Some(&row)) {
        debug!("audit insert failed: {e}");
      }
    });
  }
}
