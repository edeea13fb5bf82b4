//! SQLite-backed state store
//!
//! Sessions survive a restart of the root bot, so a conversation that was
//! handed to a skill keeps being forwarded after the process comes back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::{ConversationSession, StateStore};

/// State store on a single SQLite connection (thread-safe via Arc<Mutex>).
/// Queries run on the blocking pool, never on a runtime worker.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the database file and make sure the table exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open state database at {}", path.display()))?;
        init_state_table(&conn)?;
        info!("Conversation state database opened at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_state_table(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| {
        warn!("State database mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Create the conversation_state table. Safe to call multiple times.
fn init_state_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS conversation_state (
            key TEXT PRIMARY KEY,
            state_json TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create conversation_state table")?;
    Ok(())
}

#[async_trait]
impl StateStore for SqliteStorage {
    async fn read(&self, key: &str) -> Result<Option<ConversationSession>> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_owned();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let json: Option<String> = conn
                .query_row(
                    "SELECT state_json FROM conversation_state WHERE key = ?1",
                    params![&key],
                    |row| row.get(0),
                )
                .optional()
                .context("Failed to read conversation state")?;

            match json {
                Some(json) => Ok(Some(
                    serde_json::from_str(&json).context("Failed to decode stored session")?,
                )),
                None => Ok(None),
            }
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    async fn write(&self, key: &str, session: &ConversationSession) -> Result<()> {
        let json = serde_json::to_string(session).context("Failed to serialize session")?;
        let conn = Arc::clone(&self.conn);
        let key = key.to_owned();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            conn.execute(
                "INSERT INTO conversation_state (key, state_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    state_json = excluded.state_json,
                    updated_at = excluded.updated_at",
                params![&key, &json, Utc::now().to_rfc3339()],
            )
            .context("Failed to save conversation state")?;
            debug!("Wrote conversation state '{}'", key);
            Ok(())
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_owned();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            conn.execute(
                "DELETE FROM conversation_state WHERE key = ?1",
                params![&key],
            )
            .context("Failed to delete conversation state")?;
            debug!("Deleted conversation state '{}'", key);
            Ok(())
        })
        .await
        .context("spawn_blocking task panicked")?
    }
}
