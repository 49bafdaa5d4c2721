//! SQLite-backed `ServerStore`.
//!
//! All statements run on the dedicated `tokio_rusqlite` connection thread, so
//! callers never block the async runtime.

use crate::{
    config::DatabaseConfig,
    core::{NewServer, Server, ServerSnapshot, ServerStore, ServerUpdate},
    error::StoreError,
};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use std::time::Duration;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS servers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hostname TEXT NOT NULL,
    ip_address TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL DEFAULT 'RUNNING',
    cpu_usage REAL NOT NULL DEFAULT 0,
    memory_usage INTEGER NOT NULL DEFAULT 0,
    uptime INTEGER NOT NULL DEFAULT 0
);";

const SELECT_COLUMNS: &str =
    "SELECT id, hostname, ip_address, status, cpu_usage, memory_usage, uptime FROM servers";

pub struct SqliteServerStore {
    conn: Connection,
}

impl SqliteServerStore {
    /// Opens (or creates) the database described by `config` and ensures the
    /// `servers` table exists.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory().await?
        } else {
            Connection::open(&config.path).await?
        };
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let in_memory = config.is_in_memory();

        conn.call(move |conn: &mut rusqlite::Connection| {
            if !in_memory {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            }
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        info!(path = %config.path.display(), "Server store opened");
        Ok(Self { conn })
    }

    /// Opens a private in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::open(&DatabaseConfig::in_memory()).await
    }
}

fn row_to_server(row: &Row<'_>) -> rusqlite::Result<Server> {
    Ok(Server {
        id: row.get(0)?,
        hostname: row.get(1)?,
        ip_address: row.get(2)?,
        status: row.get(3)?,
        cpu_usage: row.get(4)?,
        memory_usage: row.get(5)?,
        uptime: row.get(6)?,
    })
}

fn select_one(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Option<Server>> {
    conn.query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), params![id], row_to_server)
        .optional()
}

#[async_trait]
impl ServerStore for SqliteServerStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn: &mut rusqlite::Connection| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count = self
            .conn
            .call(|conn: &mut rusqlite::Connection| {
                Ok(conn.query_row("SELECT COUNT(*) FROM servers", [], |row| row.get::<_, i64>(0))?)
            })
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn list(&self) -> Result<Vec<Server>, StoreError> {
        let servers = self
            .conn
            .call(|conn: &mut rusqlite::Connection| {
                let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))?;
                let rows = stmt.query_map([], row_to_server)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;
        Ok(servers)
    }

    async fn get(&self, id: i64) -> Result<Option<Server>, StoreError> {
        let server = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| Ok(select_one(conn, id)?))
            .await?;
        Ok(server)
    }

    async fn create(&self, server: NewServer) -> Result<Server, StoreError> {
        let created = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "INSERT INTO servers (hostname, ip_address, status, cpu_usage, memory_usage, uptime)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        server.hostname,
                        server.ip_address,
                        server.status.as_str(),
                        server.cpu_usage,
                        server.memory_usage,
                        server.uptime
                    ],
                )?;
                let id = conn.last_insert_rowid();
                Ok(Server {
                    id,
                    hostname: server.hostname,
                    ip_address: server.ip_address,
                    status: server.status.to_string(),
                    cpu_usage: server.cpu_usage,
                    memory_usage: server.memory_usage,
                    uptime: server.uptime,
                })
            })
            .await?;
        debug!(id = created.id, "Inserted server row");
        Ok(created)
    }

    async fn update(&self, id: i64, update: ServerUpdate) -> Result<Option<Server>, StoreError> {
        let updated = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let tx = conn.transaction()?;
                let Some(mut server) = select_one(&tx, id)? else {
                    return Ok(None);
                };
                update.apply_to(&mut server);
                tx.execute(
                    "UPDATE servers
                     SET hostname = ?1, ip_address = ?2, status = ?3, cpu_usage = ?4, memory_usage = ?5, uptime = ?6
                     WHERE id = ?7",
                    params![
                        server.hostname,
                        server.ip_address,
                        server.status,
                        server.cpu_usage,
                        server.memory_usage,
                        server.uptime,
                        id
                    ],
                )?;
                tx.commit()?;
                Ok(Some(server))
            })
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let affected = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                Ok(conn.execute("DELETE FROM servers WHERE id = ?1", params![id])?)
            })
            .await?;
        Ok(affected > 0)
    }

    async fn apply_snapshots(&self, snapshots: &[(i64, ServerSnapshot)]) -> Result<usize, StoreError> {
        if snapshots.is_empty() {
            return Ok(0);
        }
        let batch = snapshots.to_vec();
        let written = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let tx = conn.transaction()?;
                let mut written = 0;
                {
                    let mut stmt = tx.prepare(
                        "UPDATE servers SET status = ?1, cpu_usage = ?2, memory_usage = ?3, uptime = ?4 WHERE id = ?5",
                    )?;
                    for (id, snapshot) in &batch {
                        written += stmt.execute(params![
                            snapshot.state.as_str(),
                            snapshot.cpu_usage,
                            snapshot.memory_usage,
                            snapshot.uptime,
                            id
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(written)
            })
            .await?;
        Ok(written)
    }
}

/// A store whose every operation fails, for exercising degraded paths.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

#[cfg(any(test, feature = "test-utils"))]
impl UnavailableStore {
    fn err() -> StoreError {
        StoreError::Unavailable("connection refused".to_string())
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl ServerStore for UnavailableStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Err(Self::err())
    }

    async fn list(&self) -> Result<Vec<Server>, StoreError> {
        Err(Self::err())
    }

    async fn get(&self, _id: i64) -> Result<Option<Server>, StoreError> {
        Err(Self::err())
    }

    async fn create(&self, _server: NewServer) -> Result<Server, StoreError> {
        Err(Self::err())
    }

    async fn update(&self, _id: i64, _update: ServerUpdate) -> Result<Option<Server>, StoreError> {
        Err(Self::err())
    }

    async fn delete(&self, _id: i64) -> Result<bool, StoreError> {
        Err(Self::err())
    }

    async fn apply_snapshots(&self, _snapshots: &[(i64, ServerSnapshot)]) -> Result<usize, StoreError> {
        Err(Self::err())
    }
}
