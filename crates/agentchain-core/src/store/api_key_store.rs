use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::api_key::ApiKey;

const KEY_PREFIX: &str = "ac_";

#[derive(Clone)]
pub struct ApiKeyStore {
    db: Database,
}

impl ApiKeyStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Issue a fresh bearer key for an owner.
    pub async fn create(&self, owner_id: &str) -> Result<ApiKey, ServerError> {
        if owner_id.trim().is_empty() {
            return Err(ServerError::BadRequest("Owner id must not be empty".to_string()));
        }
        let key = ApiKey {
            key: format!("{}{}", KEY_PREFIX, Uuid::new_v4().simple()),
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        };
        let k = key.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO api_keys (key, owner_id, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![k.key, k.owner_id, k.created_at.timestamp_millis()],
                )?;
                Ok(())
            })
            .await?;
        Ok(key)
    }

    /// Owner id a key belongs to, if the key is known.
    pub async fn resolve(&self, key: &str) -> Result<Option<String>, ServerError> {
        let key = key.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT owner_id FROM api_keys WHERE key = ?1",
                    rusqlite::params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
            })
            .await
    }

    pub async fn revoke(&self, key: &str) -> Result<bool, ServerError> {
        let key = key.to_string();
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute("DELETE FROM api_keys WHERE key = ?1", rusqlite::params![key])?;
                Ok(n > 0)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_resolve_revoke() {
        let store = ApiKeyStore::new(Database::open_in_memory().unwrap());
        let key = store.create("alice").await.unwrap();
        assert!(key.key.starts_with(KEY_PREFIX));

        assert_eq!(store.resolve(&key.key).await.unwrap().as_deref(), Some("alice"));
        assert!(store.revoke(&key.key).await.unwrap());
        assert!(store.resolve(&key.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_owner_rejected() {
        let store = ApiKeyStore::new(Database::open_in_memory().unwrap());
        assert!(matches!(store.create("  ").await, Err(ServerError::BadRequest(_))));
    }
}
