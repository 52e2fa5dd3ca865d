use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::PathBuf,
};
use tracing::warn;

/// Admin credential check. Implementations answer yes/no and never error;
/// a backend failure counts as "not authorized".
pub trait Authorizer: Send {
    fn authorize(&self, code: &str) -> bool;
}

/// Codes from configuration, used when no remote is configured.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    codes: HashSet<String>,
}

impl StaticAuthorizer {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        StaticAuthorizer {
            codes: codes
                .into_iter()
                .map(|code| code.as_ref().trim().to_string())
                .filter(|code| !code.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Authorizer for StaticAuthorizer {
    fn authorize(&self, code: &str) -> bool {
        let code = code.trim();
        !code.is_empty() && self.codes.contains(code)
    }
}

// ── Remembered login ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RememberedLogin {
    code: String,
    saved_at: DateTime<Utc>,
}

/// Keeps the last accepted admin code across restarts for a limited time.
/// The code is re-verified before it is trusted again.
#[derive(Debug, Clone)]
pub struct SessionMemory {
    path: PathBuf,
    ttl: Duration,
}

impl SessionMemory {
    pub fn new(path: impl Into<PathBuf>, ttl_hours: i64) -> Self {
        SessionMemory {
            path: path.into(),
            ttl: Duration::hours(ttl_hours.max(0)),
        }
    }

    pub fn remember(&self, code: &str) {
        let entry = RememberedLogin {
            code: code.to_string(),
            saved_at: Utc::now(),
        };
        let payload = match serde_json::to_string(&entry) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("encode admin session: {e}");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).ok();
        }
        if let Err(e) = fs::write(&self.path, payload) {
            warn!("write admin session {}: {e}", self.path.display());
        }
    }

    pub fn recall(&self) -> Option<String> {
        self.recall_at(Utc::now())
    }

    fn recall_at(&self, now: DateTime<Utc>) -> Option<String> {
        let data = fs::read_to_string(&self.path).ok()?;
        let entry: RememberedLogin = serde_json::from_str(&data).ok()?;
        if now - entry.saved_at > self.ttl {
            self.forget();
            return None;
        }
        let code = entry.code.trim();
        if code.is_empty() {
            None
        } else {
            Some(code.to_string())
        }
    }

    pub fn forget(&self) {
        if self.path.is_file() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("remove admin session {}: {e}", self.path.display());
            }
        }
    }
}
