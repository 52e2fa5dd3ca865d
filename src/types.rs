use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::bracket::Bracket;
use crate::session::TournamentSession;
use crate::sync::SyncState;
use crate::view::BracketView;

// ── Constants ──────────────────────────────────────────────────────────

pub const MIN_PARTICIPANTS: usize = 2;
pub const DEFAULT_MAX_PARTICIPANTS: usize = 128;
pub const LOCAL_STATE_KEY: &str = "tournament_bracket_v3";
pub const BYE_LABEL: &str = "BYE";
pub const WAITING_LABEL: &str = "Waiting...";
pub const DEFAULT_TOURNAMENT_NAME: &str = "Anime Night Tournament";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:17880";
pub const DEFAULT_REMOTE_POLL_MS: u64 = 1500;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;
pub const SAMPLE_PARTICIPANT_COUNT: usize = 8;
pub const LOCAL_TOURNAMENT_ID: &str = "local";

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedSession = Arc<Mutex<TournamentSession>>;

// ── Config types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub remote_url: String,
    pub remote_key: String,
    pub tournament_name: String,
    pub max_participants: usize,
    pub listen_addr: String,
    pub view_dir: String,
    pub local_state_path: String,
    pub remote_poll_ms: u64,
    pub admin_codes: Vec<String>,
    pub session_ttl_hours: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote_url: String::new(),
            remote_key: String::new(),
            tournament_name: DEFAULT_TOURNAMENT_NAME.to_string(),
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            view_dir: "view".to_string(),
            local_state_path: "data/local_state.json".to_string(),
            remote_poll_ms: DEFAULT_REMOTE_POLL_MS,
            admin_codes: Vec::new(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }
}

impl AppConfig {
    pub fn has_remote(&self) -> bool {
        !self.remote_url.trim().is_empty() && !self.remote_key.trim().is_empty()
    }
}

// ── Persisted state ────────────────────────────────────────────────────

/// The two blobs every backend stores: the raw participants text and the
/// bracket snapshot. Field names match the browser-era local storage format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(rename = "playersText", default)]
    pub participants_text: String,
    #[serde(rename = "bracketState", default)]
    pub bracket: Option<Bracket>,
}

impl StoredState {
    pub fn new(participants_text: impl Into<String>, bracket: Option<Bracket>) -> Self {
        StoredState {
            participants_text: participants_text.into(),
            bracket: bracket.filter(|b| !b.is_empty()),
        }
    }
}

/// Identifies one remote write: the row it landed in plus the row revision
/// at that moment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordId {
    pub row: String,
    pub revision: String,
}

impl RecordId {
    pub fn new(row: impl Into<String>, revision: impl Into<String>) -> Self {
        RecordId {
            row: row.into(),
            revision: revision.into(),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.row, self.revision)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub record_id: RecordId,
    pub state: StoredState,
}

// ── Action outcomes ────────────────────────────────────────────────────

/// Non-fatal conditions reported alongside a completed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Notice {
    OddParticipantCount,
    NothingToAdd,
    SyncFailed,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::OddParticipantCount => {
                "Warning: Odd number of players detected. Empty slots (BYEs) will appear in later rounds (Quarter-finals or Semi-finals)."
            }
            Notice::NothingToAdd => "No new players to add.",
            Notice::SyncFailed => "Failed to sync with server. Changes saved locally.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAction {
    Ignored,
    Reloaded,
}

// ── HTTP payloads ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub is_admin: bool,
    pub tournament_id: String,
    pub participants_text: String,
    pub sync_state: SyncState,
    pub view: BracketView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub notices: Vec<NoticePayload>,
    pub state: SessionSnapshot,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticePayload {
    pub kind: Notice,
    pub message: String,
}

impl From<Notice> for NoticePayload {
    fn from(kind: Notice) -> Self {
        NoticePayload {
            kind,
            message: kind.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub participants_text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    pub round_index: usize,
    pub match_index: usize,
    pub slot_index: usize,
}
