use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::DispatchRow;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// End-of-pass accuracy summary.
    Summary,
    /// Pre-game pick announcement.
    Announcement,
}

impl std::fmt::Display for DispatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchKind::Summary => write!(f, "summary"),
            DispatchKind::Announcement => write!(f, "announcement"),
        }
    }
}

/// Persists every publish attempt to SQLite.
#[derive(Clone)]
pub struct DispatchLog {
    pool: SqlitePool,
}

impl DispatchLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        kind: DispatchKind,
        game_id: Option<u64>,
        body: &str,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dispatches (kind, game_id, body, success, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(kind.to_string())
        .bind(game_id.and_then(|id| i64::try_from(id).ok()))
        .bind(body)
        .bind(error.is_none())
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent attempts first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<DispatchRow>> {
        let rows = sqlx::query_as::<_, DispatchRow>(
            r#"
            SELECT id, kind, game_id, body, success, error, created_at
            FROM dispatches
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
