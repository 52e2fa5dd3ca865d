use chrono::Local;
use serde_json::{json, Value};
use std::{fs, io::Write, path::PathBuf};
use tracing::debug;

/// Fire-and-forget audit trail. `append` must not block on a slow backend
/// and must never surface a failure to the caller.
pub trait AuditSink: Send {
    fn append(&self, tournament_id: &str, action: &str, actor: Option<&str>, details: Value);
}

/// Appends one timestamped JSON line per action to a log file.
#[derive(Debug, Clone)]
pub struct FileAuditSink {
    path: PathBuf,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileAuditSink { path: path.into() }
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, tournament_id: &str, action: &str, actor: Option<&str>, details: Value) {
        if let Some(parent) = self.path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let entry = json!({
            "tournament_id": tournament_id,
            "action": action,
            "admin_code": actor,
            "details": details,
        });
        let line = format!("[{timestamp}] {entry}\n");
        match fs::OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()) {
                    debug!("audit write {}: {e}", self.path.display());
                }
            }
            Err(e) => debug!("audit open {}: {e}", self.path.display()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_audit_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.log");
        let sink = FileAuditSink::new(&path);
        sink.append("t1", "generate_bracket", Some("alpha"), json!({ "players_count": 8 }));
        sink.append("t1", "clear_bracket", None, json!({}));

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"action\":\"generate_bracket\""));
        assert!(lines[0].contains("\"players_count\":8"));
        assert!(lines[1].contains("\"admin_code\":null"));
    }

    #[test]
    fn test_file_audit_swallows_errors() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the open fail.
        let path = dir.path().join("audit.log");
        fs::create_dir_all(&path).unwrap();
        FileAuditSink::new(&path).append("t1", "save_state", None, json!({}));
    }
}
