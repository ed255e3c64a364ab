//! TTL-keyed discovery cache.

use anyhow::Result;
use sqlx::Row;
use std::time::Duration;

use super::db::{unix_timestamp, StateDb};
use crate::model::DiscoverySnapshot;

/// Discovery results keyed by scope (`{userId}:{year}-{semester}`).
///
/// Expiry is checked at read time; expired rows stay until overwritten or cleared.
#[derive(Clone)]
pub struct CacheStore {
    db: StateDb,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(db: StateDb, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached snapshot for `scope_key`, if present, younger than the TTL
    /// and decodable.
    pub async fn get(&self, scope_key: &str) -> Result<Option<DiscoverySnapshot>> {
        self.get_at(scope_key, unix_timestamp()).await
    }

    pub(crate) async fn get_at(&self, scope_key: &str, now: i64) -> Result<Option<DiscoverySnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT payload, stored_at
            FROM discovery_cache
            WHERE scope_key = ?1
            "#,
        )
        .bind(scope_key)
        .fetch_optional(&self.db.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let stored_at: i64 = row.get("stored_at");
        if now - stored_at >= self.ttl.as_secs() as i64 {
            tracing::debug!(scope_key, age_secs = now - stored_at, "cache entry expired");
            return Ok(None);
        }
        let payload: String = row.get("payload");
        match serde_json::from_str(&payload) {
            Ok(snapshot) => Ok(Some(snapshot)),
            // Written by an older build; the next discovery overwrites it.
            Err(e) => {
                tracing::warn!(scope_key, "ignoring unreadable cache entry: {}", e);
                Ok(None)
            }
        }
    }

    /// Store `snapshot`, replacing any prior entry for the scope.
    pub async fn put(&self, scope_key: &str, snapshot: &DiscoverySnapshot) -> Result<()> {
        self.put_at(scope_key, snapshot, unix_timestamp()).await
    }

    pub(crate) async fn put_at(&self, scope_key: &str, snapshot: &DiscoverySnapshot, now: i64) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;
        sqlx::query(
            r#"
            INSERT INTO discovery_cache (scope_key, payload, stored_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(scope_key) DO UPDATE SET
                payload = excluded.payload,
                stored_at = excluded.stored_at
            "#,
        )
        .bind(scope_key)
        .bind(payload)
        .bind(now)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    /// Remove one scope, or every entry when `scope_key` is None. Returns rows removed.
    pub async fn clear(&self, scope_key: Option<&str>) -> Result<u64> {
        let result = match scope_key {
            Some(key) => {
                sqlx::query("DELETE FROM discovery_cache WHERE scope_key = ?1")
                    .bind(key)
                    .execute(&self.db.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM discovery_cache")
                    .execute(&self.db.pool)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::open_memory;
    use crate::model::{Semester, Term};
    use chrono::Utc;

    fn snapshot(failed: usize) -> DiscoverySnapshot {
        DiscoverySnapshot {
            term: Term::new(2024, Semester::First),
            courses: vec![],
            lectures: vec![],
            failed_courses: failed,
            discovered_at: Utc::now(),
        }
    }

    async fn store() -> CacheStore {
        CacheStore::new(open_memory().await.unwrap(), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn put_then_get_within_ttl() {
        let s = store().await;
        let snap = snapshot(1);
        s.put_at("u:2024-10", &snap, 1_000).await.unwrap();
        let got = s.get_at("u:2024-10", 1_000 + 3599).await.unwrap();
        assert_eq!(got, Some(snap));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_missing() {
        let s = store().await;
        s.put_at("u:2024-10", &snapshot(0), 1_000).await.unwrap();
        assert!(s.get_at("u:2024-10", 1_000 + 3600).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_replaces_wholesale() {
        let s = store().await;
        s.put_at("k", &snapshot(1), 1_000).await.unwrap();
        s.put_at("k", &snapshot(2), 2_000).await.unwrap();
        let got = s.get_at("k", 2_001).await.unwrap().unwrap();
        assert_eq!(got.failed_courses, 2);
    }

    #[tokio::test]
    async fn clear_one_or_all() {
        let s = store().await;
        s.put("a", &snapshot(0)).await.unwrap();
        s.put("b", &snapshot(0)).await.unwrap();
        assert_eq!(s.clear(Some("a")).await.unwrap(), 1);
        assert!(s.get("a").await.unwrap().is_none());
        assert!(s.get("b").await.unwrap().is_some());
        assert_eq!(s.clear(None).await.unwrap(), 1);
        assert!(s.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn undecodable_entry_reads_as_missing() {
        let s = store().await;
        sqlx::query("INSERT INTO discovery_cache (scope_key, payload, stored_at) VALUES (?1, ?2, ?3)")
            .bind("u:2024-10")
            .bind(r#"{"term":"2024-10","courses":"not a list"}"#)
            .bind(1_000i64)
            .execute(&s.db.pool)
            .await
            .unwrap();
        assert!(s.get_at("u:2024-10", 1_001).await.unwrap().is_none());

        // A fresh put replaces the bad row.
        s.put_at("u:2024-10", &snapshot(3), 1_002).await.unwrap();
        let got = s.get_at("u:2024-10", 1_003).await.unwrap().unwrap();
        assert_eq!(got.failed_courses, 3);
    }
}
