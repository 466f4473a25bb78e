use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::agent::LlmAgent;
use crate::budget::TokenUsage;
use crate::engine::AgentEngine;
use crate::error::AgentError;
use crate::llm::AsyncLlmCaller;
use crate::trace::Trace;
use crate::types::{AgentConfig, AgentOutput, Message};

/// A conversation between one user and one root agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id:         String,
    pub app_name:   String,
    pub user_id:    String,
    pub messages:   Vec<Message>,
    pub usage:      TokenUsage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(app_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id:         uuid::Uuid::new_v4().to_string(),
            app_name:   app_name.into(),
            user_id:    user_id.into(),
            messages:   Vec::new(),
            usage:      TokenUsage::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of user requests in the session.
    pub fn turn_count(&self) -> usize {
        self.messages.iter().filter(|m| matches!(m, Message::User { .. })).count()
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session. Fails if the id already exists.
    async fn create(&self, session: &Session) -> Result<(), AgentError>;

    async fn get(&self, session_id: &str) -> Result<Option<Session>, AgentError>;

    /// Insert or replace a session.
    async fn save(&self, session: &Session) -> Result<(), AgentError>;

    /// Sessions of one user for one app, oldest first.
    async fn list(&self, app_name: &str, user_id: &str) -> Result<Vec<Session>, AgentError>;

    /// Returns whether a session was removed.
    async fn delete(&self, session_id: &str) -> Result<bool, AgentError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

/// Sessions that live as long as the process.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Session>>, AgentError> {
        self.sessions.lock().map_err(|_| AgentError::StorageError("session map poisoned".to_string()))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> Result<(), AgentError> {
        let mut store = self.lock()?;
        if store.contains_key(&session.id) {
            return Err(AgentError::StorageError(format!("session {} already exists", session.id)));
        }
        store.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, AgentError> {
        Ok(self.lock()?.get(session_id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), AgentError> {
        self.lock()?.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list(&self, app_name: &str, user_id: &str) -> Result<Vec<Session>, AgentError> {
        let mut sessions: Vec<Session> = self.lock()?
            .values()
            .filter(|s| s.app_name == app_name && s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn delete(&self, session_id: &str) -> Result<bool, AgentError> {
        Ok(self.lock()?.remove(session_id).is_some())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite store
// ─────────────────────────────────────────────────────────────────────────────

/// Sessions persisted to a SQLite database, one row per session.
pub struct SqliteSessionStore {
    path: PathBuf,
}

impl SqliteSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, AgentError> {
        let path = path.into();
        let conn = rusqlite::Connection::open(&path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id         TEXT PRIMARY KEY,
                app_name   TEXT NOT NULL,
                user_id    TEXT NOT NULL,
                messages   TEXT NOT NULL,
                usage      TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { path })
    }

    fn get_conn(&self) -> Result<rusqlite::Connection, AgentError> {
        Ok(rusqlite::Connection::open(&self.path)?)
    }

    fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, AgentError> {
        let messages_json: String = row.get(3)?;
        let usage_json: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        Ok(Session {
            id:         row.get(0)?,
            app_name:   row.get(1)?,
            user_id:    row.get(2)?,
            messages:   serde_json::from_str(&messages_json)?,
            usage:      serde_json::from_str(&usage_json)?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

/// Fixed-width UTC form, so text order matches time order.
fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, AgentError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AgentError::StorageError(format!("bad timestamp '{}': {}", s, e)))
}

const SELECT_COLUMNS: &str =
    "SELECT id, app_name, user_id, messages, usage, created_at, updated_at FROM sessions";

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, session: &Session) -> Result<(), AgentError> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO sessions (id, app_name, user_id, messages, usage, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                session.id,
                session.app_name,
                session.user_id,
                serde_json::to_string(&session.messages)?,
                serde_json::to_string(&session.usage)?,
                timestamp(&session.created_at),
                timestamp(&session.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, AgentError> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))?;
        let mut rows = stmt.query(rusqlite::params![session_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_session(row)?)),
            None      => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), AgentError> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO sessions (id, app_name, user_id, messages, usage, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                messages   = excluded.messages,
                usage      = excluded.usage,
                updated_at = excluded.updated_at",
            rusqlite::params![
                session.id,
                session.app_name,
                session.user_id,
                serde_json::to_string(&session.messages)?,
                serde_json::to_string(&session.usage)?,
                timestamp(&session.created_at),
                timestamp(&session.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn list(&self, app_name: &str, user_id: &str) -> Result<Vec<Session>, AgentError> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE app_name = ?1 AND user_id = ?2 ORDER BY created_at ASC", SELECT_COLUMNS
        ))?;
        let mut rows = stmt.query(rusqlite::params![app_name, user_id])?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(Self::row_to_session(row)?);
        }
        Ok(sessions)
    }

    async fn delete(&self, session_id: &str) -> Result<bool, AgentError> {
        let conn = self.get_conn()?;
        let removed = conn.execute("DELETE FROM sessions WHERE id = ?1", rusqlite::params![session_id])?;
        Ok(removed > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner
// ─────────────────────────────────────────────────────────────────────────────

/// Runs user turns against a root agent and keeps the session transcript.
pub struct Runner {
    agent:     Arc<LlmAgent>,
    llm:       Arc<dyn AsyncLlmCaller>,
    store:     Arc<dyn SessionStore>,
    config:    AgentConfig,
    output_tx: Option<UnboundedSender<AgentOutput>>,
}

impl Runner {
    pub fn new(agent: Arc<LlmAgent>, llm: Arc<dyn AsyncLlmCaller>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            agent,
            llm,
            store,
            config:    AgentConfig::default(),
            output_tx: None,
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config; self
    }

    pub fn with_output(mut self, tx: UnboundedSender<AgentOutput>) -> Self {
        self.output_tx = Some(tx); self
    }

    /// Sessions are grouped under the root agent's name.
    pub fn app_name(&self) -> &str {
        &self.agent.name
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub async fn create_session(&self, user_id: &str) -> Result<Session, AgentError> {
        let session = Session::new(self.app_name(), user_id);
        self.store.create(&session).await?;
        tracing::info!(session = %session.id, user = user_id, "session created");
        Ok(session)
    }

    /// Runs one user turn. On failure the session is left as it was.
    pub async fn send(&self, session_id: &str, text: &str) -> Result<String, AgentError> {
        self.send_traced(session_id, text).await.map(|(answer, _)| answer)
    }

    /// Like `send`, also returning the root agent's trace for the turn.
    pub async fn send_traced(&self, session_id: &str, text: &str) -> Result<(String, Trace), AgentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentError::AgentFailed("message is empty".to_string()));
        }

        let mut session = self.store.get(session_id).await?
            .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))?;

        let mut engine = AgentEngine::new(Arc::clone(&self.agent), Arc::clone(&self.llm), text)
            .with_config(self.config.clone())
            .with_history(session.messages.clone());
        if let Some(tx) = &self.output_tx {
            engine = engine.with_output(tx.clone());
        }

        let answer = engine.run().await?;

        session.messages = std::mem::take(&mut engine.memory.messages);
        session.usage.add(engine.memory.usage);
        session.updated_at = Utc::now();
        self.store.save(&session).await?;

        tracing::info!(
            session = %session.id,
            turns   = session.turn_count(),
            tokens  = session.usage.total_tokens,
            "turn complete"
        );
        Ok((answer, std::mem::take(&mut engine.memory.trace)))
    }
}
