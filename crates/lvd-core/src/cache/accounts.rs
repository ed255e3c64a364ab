//! Verified account records. Only the user id and a timestamp are stored.

use anyhow::Result;
use sqlx::Row;

use super::db::{unix_timestamp, StateDb};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub user_id: String,
    /// Unix seconds of the last verified login.
    pub last_verified_at: i64,
}

#[derive(Clone)]
pub struct AccountStore {
    db: StateDb,
}

impl AccountStore {
    pub fn new(db: StateDb) -> Self {
        Self { db }
    }

    pub async fn record_verified(&self, user_id: &str) -> Result<AccountRecord> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO accounts (user_id, last_verified_at)
            VALUES (?1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET last_verified_at = excluded.last_verified_at
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.db.pool)
        .await?;
        Ok(AccountRecord {
            user_id: user_id.to_string(),
            last_verified_at: now,
        })
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<AccountRecord>> {
        let row = sqlx::query("SELECT user_id, last_verified_at FROM accounts WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(row.map(|r| AccountRecord {
            user_id: r.get("user_id"),
            last_verified_at: r.get("last_verified_at"),
        }))
    }

    /// Most recently verified account, if any.
    pub async fn last_verified(&self) -> Result<Option<AccountRecord>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, last_verified_at
            FROM accounts
            ORDER BY last_verified_at DESC, user_id
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.map(|r| AccountRecord {
            user_id: r.get("user_id"),
            last_verified_at: r.get("last_verified_at"),
        }))
    }
}
