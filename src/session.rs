//! Cursor-based streaming sessions.
//!
//! A session enumerates one tree across several calls:
//!
//! ```text
//! CREATED ──start──▶ ACTIVE ──next (walk finished)──▶ EXHAUSTED
//!                      │                                  │
//!                      └──────────────stop────────────────┴──▶ STOPPED (removed)
//! ```
//!
//! No iterator survives between calls. The session stores the relative path
//! of the last emitted entry and each increment walks again from there, which
//! gives a best-effort live view of the tree.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::scan::{EntryFilter, FileEntry, ScanError, Scanner, StopReason};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Allocated, first increment not yet taken.
    Created,
    /// Entries may remain.
    Active,
    /// The walk has been exhausted.
    Exhausted,
    /// Freed by the caller.
    Stopped,
}

impl SessionState {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Exhausted => "exhausted",
            Self::Stopped => "stopped",
        }
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "active" => Ok(Self::Active),
            "exhausted" => Ok(Self::Exhausted),
            "stopped" => Ok(Self::Stopped),
            other => Err(format!("unknown session state '{other}'")),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No live session has this id.
    #[error("Session not found: {session_id}")]
    NotFound {
        /// The id as supplied.
        session_id: String,
    },

    /// The increment scan failed.
    #[error(transparent)]
    Scan(#[from] ScanError),
}

struct StreamSession {
    root: PathBuf,
    filter: EntryFilter,
    batch_size: usize,
    cursor: Option<PathBuf>,
    emitted: usize,
    batches: usize,
    state: SessionState,
    started_at: DateTime<Utc>,
    last_access: Instant,
}

/// One increment of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamBatch {
    /// Session the batch belongs to.
    pub session_id: String,
    /// Session state after this increment.
    pub state: SessionState,
    /// Entries in walk order.
    pub entries: Vec<FileEntry>,
    /// Zero-based index of this batch within the session.
    pub batch_index: usize,
    /// Entries emitted before this batch.
    pub offset: usize,
    /// Whether a further `next` can return entries.
    pub has_more: bool,
    /// Set when a ceiling cut this increment short.
    pub stop_reason: Option<StopReason>,
}

impl StreamBatch {
    /// Whether the stream has nothing further to give.
    #[must_use]
    pub const fn complete(&self) -> bool {
        !self.has_more
    }

    /// Wire form of this batch.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let entries: Vec<Value> = self.entries.iter().map(FileEntry::to_json).collect();
        let mut value = json!({
            "session_id": self.session_id,
            "state": self.state.as_str(),
            "entries": entries,
            "returned": self.entries.len(),
            "batch_index": self.batch_index,
            "offset": self.offset,
            "has_more": self.has_more,
            "complete": self.complete(),
            "partial": self.stop_reason.is_some(),
        });
        if let Some(reason) = self.stop_reason {
            value["stop_reason"] = json!(reason.as_str());
        }
        value
    }
}

/// Final figures for a stopped session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppedSession {
    /// Session id.
    pub session_id: String,
    /// State the session was in when stopped.
    pub previous_state: SessionState,
    /// Entries emitted over the session's life.
    pub entries_emitted: usize,
}

/// Table of live sessions.
pub struct SessionManager {
    sessions: HashMap<String, StreamSession>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionManager {
    /// Creates an empty table. A zero `max_sessions` is treated as 1.
    #[must_use]
    pub fn new(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Opens a session on `root` and returns its first batch.
    ///
    /// Nothing is stored if the first scan fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be scanned.
    pub fn start(
        &mut self,
        scanner: &mut Scanner,
        root: PathBuf,
        filter: EntryFilter,
        batch_size: usize,
    ) -> Result<StreamBatch, SessionError> {
        let now = Instant::now();
        self.collect_idle_at(now);
        self.make_room();

        let session_id = Uuid::new_v4().to_string();
        let mut session = StreamSession {
            root,
            filter,
            batch_size: batch_size.max(1),
            cursor: None,
            emitted: 0,
            batches: 0,
            state: SessionState::Created,
            started_at: Utc::now(),
            last_access: now,
        };

        let batch = Self::advance(scanner, &session_id, &mut session)?;
        tracing::info!(
            session_id = %session_id,
            root = %session.root.display(),
            returned = batch.entries.len(),
            "Stream started"
        );
        self.sessions.insert(session_id, session);
        Ok(batch)
    }

    /// Returns the next batch of a session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for unknown or expired ids, or a
    /// scan error if the root has become unreadable.
    pub fn next(
        &mut self,
        scanner: &mut Scanner,
        session_id: &str,
    ) -> Result<StreamBatch, SessionError> {
        let now = Instant::now();
        self.collect_idle_at(now);

        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound {
                session_id: session_id.to_string(),
            })?;
        session.last_access = now;

        Self::advance(scanner, session_id, session)
    }

    /// Frees a session regardless of its state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for unknown or expired ids.
    pub fn stop(&mut self, session_id: &str) -> Result<StoppedSession, SessionError> {
        self.collect_idle_at(Instant::now());

        let session = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound {
                session_id: session_id.to_string(),
            })?;

        tracing::info!(session_id = %session_id, emitted = session.emitted, "Stream stopped");

        Ok(StoppedSession {
            session_id: session_id.to_string(),
            previous_state: session.state,
            entries_emitted: session.emitted,
        })
    }

    /// Removes sessions idle for at least the idle timeout.
    ///
    /// Returns how many were removed.
    pub fn collect_idle(&mut self) -> usize {
        self.collect_idle_at(Instant::now())
    }

    fn collect_idle_at(&mut self, now: Instant) -> usize {
        let timeout = self.idle_timeout;
        let before = self.sessions.len();
        self.sessions.retain(|id, session| {
            let keep = now.saturating_duration_since(session.last_access) < timeout;
            if !keep {
                tracing::debug!(session_id = %id, "Collected idle stream session");
            }
            keep
        });
        before - self.sessions.len()
    }

    /// Describes every live session.
    #[must_use]
    pub fn summaries(&self) -> Vec<Value> {
        let now = Instant::now();
        let mut summaries: Vec<(&String, &StreamSession)> = self.sessions.iter().collect();
        summaries.sort_by_key(|(_, s)| s.started_at);
        summaries
            .into_iter()
            .map(|(id, s)| {
                json!({
                    "session_id": id,
                    "directory": s.root.display().to_string(),
                    "state": s.state.as_str(),
                    "batch_size": s.batch_size,
                    "entries_emitted": s.emitted,
                    "batches": s.batches,
                    "started_at": s.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                    "idle_secs": now.saturating_duration_since(s.last_access).as_secs(),
                })
            })
            .collect()
    }

    fn make_room(&mut self) {
        while self.sessions.len() >= self.max_sessions {
            let Some(oldest) = self
                .sessions
                .iter()
                .min_by_key(|(_, s)| s.last_access)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            tracing::warn!(session_id = %oldest, "Session table full, evicting least recently used");
            self.sessions.remove(&oldest);
        }
    }

    fn advance(
        scanner: &mut Scanner,
        session_id: &str,
        session: &mut StreamSession,
    ) -> Result<StreamBatch, SessionError> {
        let offset = session.emitted;

        if session.state == SessionState::Exhausted {
            return Ok(StreamBatch {
                session_id: session_id.to_string(),
                state: session.state,
                entries: Vec::new(),
                batch_index: session.batches,
                offset,
                has_more: false,
                stop_reason: None,
            });
        }

        let increment = scanner.scan_after(
            &session.root,
            &session.filter,
            session.cursor.as_deref(),
            session.batch_size,
        )?;

        if let Some(last) = increment.entries.last() {
            session.cursor = Some(last.relative_path());
        }
        session.emitted += increment.entries.len();
        session.state = if increment.has_more {
            SessionState::Active
        } else {
            SessionState::Exhausted
        };

        let batch = StreamBatch {
            session_id: session_id.to_string(),
            state: session.state,
            entries: increment.entries,
            batch_index: session.batches,
            offset,
            has_more: increment.has_more,
            stop_reason: increment.stop,
        };
        session.batches += 1;
        Ok(batch)
    }
}
