//! Conversation state persistence
//!
//! Keyed by conversation id. Backends: in-memory for development and tests,
//! Postgres (JSONB state column) when `DATABASE_URL` is configured.

use crate::error::AgentError;
use crate::state::ConversationState;
use crate::Result;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// Trait for conversation state persistence
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, conversation_id: Uuid) -> Result<Option<ConversationState>>;
    async fn save(&self, conversation_id: Uuid, state: &ConversationState) -> Result<()>;
}

/// In-memory state store for development and tests
#[derive(Clone)]
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<Uuid, ConversationState>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, conversation_id: Uuid) -> Result<Option<ConversationState>> {
        let states = self.states.read().await;
        Ok(states.get(&conversation_id).cloned())
    }

    async fn save(&self, conversation_id: Uuid, state: &ConversationState) -> Result<()> {
        let mut states = self.states.write().await;
        states.insert(conversation_id, state.clone());
        Ok(())
    }
}

/// Postgres-backed state store. The state record is stored as one JSONB
/// value per conversation; schema is created lazily on first use.
pub struct PostgresStateStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS conversation_states (
                      conversation_id UUID PRIMARY KEY,
                      state JSONB NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AgentError::Persistence(format!(
                    "failed to initialize conversation state schema: {}",
                    e
                ))
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl StateStore for PostgresStateStore {
    async fn load(&self, conversation_id: Uuid) -> Result<Option<ConversationState>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            "SELECT state FROM conversation_states WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AgentError::Persistence(format!("failed to load conversation state: {}", e))
        })?;

        match row {
            Some(row) => {
                let value: serde_json::Value = row.try_get("state").map_err(|e| {
                    AgentError::Persistence(format!("malformed state row: {}", e))
                })?;
                let state = serde_json::from_value(value)?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, conversation_id: Uuid, state: &ConversationState) -> Result<()> {
        self.ensure_schema().await?;

        let value = serde_json::to_value(state)?;

        sqlx::query(
            r#"
            INSERT INTO conversation_states (conversation_id, state)
            VALUES ($1, $2)
            ON CONFLICT (conversation_id)
            DO UPDATE SET state = EXCLUDED.state, updated_at = NOW()
            "#,
        )
        .bind(conversation_id)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AgentError::Persistence(format!("failed to save conversation state: {}", e))
        })?;

        Ok(())
    }
}

/// Pick a state store backend from the environment: Postgres when a database
/// URL is configured and the pool can be created, in-memory otherwise.
pub fn build_store() -> Box<dyn StateStore> {
    let database_url = env::var("DATABASE_URL")
        .or_else(|_| env::var("POSTGRES_URL"))
        .ok();

    if let Some(url) = database_url {
        match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&url)
        {
            Ok(pool) => {
                info!("Conversation state backend: postgres");
                return Box::new(PostgresStateStore::new(pool));
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres state backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Conversation state backend: in-memory");
    Box::new(InMemoryStateStore::new())
}
