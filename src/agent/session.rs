//! Append-only conversation log, keyed by session.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type SessionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One persisted turn half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionLogError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error("session log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt session log {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("session log task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Blocking session storage. Async callers go through
/// `tokio::task::spawn_blocking`.
pub trait SessionLog: Send + Sync {
    fn create(&self, name: &str) -> Result<SessionId, SessionLogError>;

    /// Append `entries` as one unit: either all of them are stored or none.
    fn append_entries(&self, session: SessionId, entries: Vec<SessionEntry>) -> Result<(), SessionLogError>;

    fn append(
        &self,
        session: SessionId,
        role: Role,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<(), SessionLogError> {
        self.append_entries(session, vec![SessionEntry::new(role, content, metadata)])
    }

    /// Entries in append order.
    fn read(&self, session: SessionId) -> Result<Vec<SessionEntry>, SessionLogError>;
}

impl SessionEntry {
    pub fn new(role: Role, content: &str, metadata: Option<Value>) -> Self {
        Self {
            role,
            content: content.to_string(),
            metadata,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory log
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemorySession {
    name: String,
    entries: Vec<SessionEntry>,
}

#[derive(Debug, Default)]
pub struct MemorySessionLog {
    sessions: RwLock<HashMap<SessionId, MemorySession>>,
}

impl MemorySessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_name(&self, session: SessionId) -> Option<String> {
        self.sessions.read().get(&session).map(|s| s.name.clone())
    }
}

impl SessionLog for MemorySessionLog {
    fn create(&self, name: &str) -> Result<SessionId, SessionLogError> {
        let id = Uuid::new_v4();
        self.sessions.write().insert(
            id,
            MemorySession {
                name: name.to_string(),
                entries: Vec::new(),
            },
        );
        tracing::info!(session_id = %id, name, "created session");
        Ok(id)
    }

    fn append_entries(&self, session: SessionId, entries: Vec<SessionEntry>) -> Result<(), SessionLogError> {
        let mut sessions = self.sessions.write();
        let stored = sessions
            .get_mut(&session)
            .ok_or(SessionLogError::NotFound(session))?;
        stored.entries.extend(entries);
        Ok(())
    }

    fn read(&self, session: SessionId) -> Result<Vec<SessionEntry>, SessionLogError> {
        self.sessions
            .read()
            .get(&session)
            .map(|s| s.entries.clone())
            .ok_or(SessionLogError::NotFound(session))
    }
}

// ---------------------------------------------------------------------------
// JSON-lines file log
// ---------------------------------------------------------------------------

/// One line of a session file. The first line is always the header.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LogLine {
    Session {
        name: String,
        created_at: DateTime<Utc>,
    },
    Entry(SessionEntry),
}

/// Persists each session as `<dir>/<uuid>.jsonl`.
#[derive(Debug)]
pub struct JsonlSessionLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSessionLog {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SessionLogError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path(&self, session: SessionId) -> PathBuf {
        self.dir.join(format!("{session}.jsonl"))
    }

    /// Encode `lines` and write them with a single append.
    fn write_lines(path: &Path, lines: &[LogLine], create: bool) -> Result<(), SessionLogError> {
        let mut encoded = String::new();
        for line in lines {
            let json = serde_json::to_string(line).map_err(|e| SessionLogError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            encoded.push_str(&json);
            encoded.push('\n');
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create_new(create)
            .open(path)?;
        file.write_all(encoded.as_bytes())?;
        Ok(())
    }
}

impl SessionLog for JsonlSessionLog {
    fn create(&self, name: &str) -> Result<SessionId, SessionLogError> {
        let id = Uuid::new_v4();
        let header = LogLine::Session {
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let _guard = self.write_lock.lock();
        Self::write_lines(&self.path(id), &[header], true)?;
        tracing::info!(session_id = %id, name, "created session");
        Ok(id)
    }

    fn append_entries(&self, session: SessionId, entries: Vec<SessionEntry>) -> Result<(), SessionLogError> {
        let path = self.path(session);
        if !path.is_file() {
            return Err(SessionLogError::NotFound(session));
        }
        let lines: Vec<LogLine> = entries.into_iter().map(LogLine::Entry).collect();
        let _guard = self.write_lock.lock();
        Self::write_lines(&path, &lines, false)
    }

    fn read(&self, session: SessionId) -> Result<Vec<SessionEntry>, SessionLogError> {
        let path = self.path(session);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionLogError::NotFound(session))
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: LogLine = serde_json::from_str(&line).map_err(|e| SessionLogError::Corrupt {
                path: path.clone(),
                reason: format!("line {}: {e}", n + 1),
            })?;
            if let LogLine::Entry(entry) = parsed {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}
