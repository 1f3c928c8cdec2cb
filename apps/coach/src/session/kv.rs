//! Key-value session sink. Sessions live under `session:{id}` as JSON, no TTL.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::session::SessionState;

const SINK: &str = "key-value store";
const KEY_PREFIX: &str = "session:";
const MAX_ID_ATTEMPTS: u32 = 5;

/// New session id: `{YYYYMMDD_HHMMSS}_{8 random hex chars}`.
pub fn generate_session_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
}

fn session_key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

/// Minimal storage surface the session sink needs.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Stores `value` only if `key` is unused. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, AppError>;

    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// All keys matching a glob pattern. A full scan, not an index lookup.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, AppError>;
}

/// Redis-backed store. The connection is opened on first use and then shared
/// for the rest of the process, so an unreachable server only fails this sink.
pub struct RedisBackend {
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
}

impl RedisBackend {
    pub fn new(redis_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url).map_err(|e| AppError::persistence(SINK, e))?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, AppError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let mut conn = self.client.get_multiplexed_async_connection().await?;
                let _: String = redis::cmd("PING").query_async(&mut conn).await?;
                info!("Connected to Redis");
                Ok::<_, redis::RedisError>(conn)
            })
            .await
            .map_err(|e| AppError::persistence(SINK, e))?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, AppError> {
        let mut conn = self.connection().await?;
        conn.set_nx(key, value)
            .await
            .map_err(|e| AppError::persistence(SINK, e))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| AppError::persistence(SINK, e))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self.connection().await?;
        conn.keys(pattern)
            .await
            .map_err(|e| AppError::persistence(SINK, e))
    }
}

/// Session save/load/list on top of any [`KvBackend`].
#[derive(Clone)]
pub struct KvSessionStore {
    backend: Arc<dyn KvBackend>,
}

impl KvSessionStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Stores the full state and returns its session id.
    ///
    /// A state that already carries an id is stored under that id, and the
    /// save fails if the key is taken. Otherwise fresh ids are drawn until an
    /// unused one is found. Existing sessions are never overwritten.
    pub async fn save_session(&self, state: &SessionState) -> Result<String, AppError> {
        let result = self.try_save(state).await;
        match &result {
            Ok(id) => info!("Session saved to key-value store with ID: {id}"),
            Err(e) => error!("Failed to save session to key-value store: {e}"),
        }
        result
    }

    async fn try_save(&self, state: &SessionState) -> Result<String, AppError> {
        let mut doc = state.clone();

        if let Some(id) = doc.session_id.clone() {
            let body = serde_json::to_string(&doc).map_err(|e| AppError::persistence(SINK, e))?;
            if self.backend.set_if_absent(&session_key(&id), &body).await? {
                return Ok(id);
            }
            return Err(AppError::persistence(
                SINK,
                format!("session id {id} is already in use"),
            ));
        }

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_session_id();
            doc.session_id = Some(id.clone());
            let body = serde_json::to_string(&doc).map_err(|e| AppError::persistence(SINK, e))?;
            if self.backend.set_if_absent(&session_key(&id), &body).await? {
                return Ok(id);
            }
        }

        Err(AppError::persistence(
            SINK,
            format!("could not allocate an unused session id in {MAX_ID_ATTEMPTS} attempts"),
        ))
    }

    pub async fn load_session(&self, session_id: &str) -> Result<SessionState, AppError> {
        let raw = self
            .backend
            .get(&session_key(session_id))
            .await
            .inspect_err(|e| error!("Failed to load session ID {session_id}: {e}"))?
            .ok_or_else(|| AppError::NotFound(format!("Session ID {session_id} not found")))?;

        serde_json::from_str(&raw).map_err(|e| {
            error!("Session ID {session_id} holds an unreadable document: {e}");
            AppError::persistence(SINK, e)
        })
    }

    /// Ids of every stored session, sorted (ids sort chronologically).
    pub async fn list_sessions(&self) -> Result<Vec<String>, AppError> {
        let keys = self
            .backend
            .keys(&format!("{KEY_PREFIX}*"))
            .await
            .inspect_err(|e| error!("Failed to list sessions: {e}"))?;

        let mut ids: Vec<String> = keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(KEY_PREFIX).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }
}
