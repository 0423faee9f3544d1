use crate::error::Result;
use chrono::{DateTime, Utc};
use keyflow_models::AccessSession;
use sqlx::PgPool;

/// Append-and-close store for `access_control_log`. Rows are never deleted;
/// a revoke soft-closes every row matching `(visitor_token, key_card)`.
#[derive(Clone)]
pub struct AccessLogRepository {
    pool: PgPool,
}

impl AccessLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new active session at grant time and return its id.
    /// `access_points` is the pre-encoded JSON blob; the store does not
    /// query into it.
    pub async fn record_check_in(
        &self,
        visitor_token: &str,
        key_card: &str,
        access_points: &str,
        checked_in_at: DateTime<Utc>,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO access_control_log (
                visitor_token, key_card, access_points,
                is_active, time_checked_in
            )
            VALUES ($1, $2, $3, TRUE, $4)
            RETURNING id
            "#,
        )
        .bind(visitor_token)
        .bind(key_card)
        .bind(access_points)
        .bind(checked_in_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Ids of the sessions recorded for an identity, in store order. Closed
    /// sessions match too: a repeated revoke re-stamps their checkout time
    /// rather than skipping them.
    pub async fn find_sessions(&self, visitor_token: &str, key_card: &str) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM access_control_log
            WHERE visitor_token = $1 AND key_card = $2
            "#,
        )
        .bind(visitor_token)
        .bind(key_card)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Close every session matching the identity, active or not. Re-running
    /// a checkout simply re-stamps `time_checked_out`; zero matching rows is
    /// not an error. Returns the number of rows updated.
    pub async fn record_check_out(
        &self,
        visitor_token: &str,
        key_card: &str,
        checked_out_at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE access_control_log
            SET is_active = FALSE, time_checked_out = $3
            WHERE visitor_token = $1 AND key_card = $2
            "#,
        )
        .bind(visitor_token)
        .bind(key_card)
        .bind(checked_out_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Full session history for an identity, newest first.
    pub async fn session_history(
        &self,
        visitor_token: &str,
        key_card: &str,
    ) -> Result<Vec<AccessSession>> {
        let sessions = sqlx::query_as::<_, AccessSession>(
            r#"
            SELECT id, visitor_token, key_card, access_points,
                   is_active, time_checked_in, time_checked_out,
                   admin_id, admin_name, created_at
            FROM access_control_log
            WHERE visitor_token = $1 AND key_card = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(visitor_token)
        .bind(key_card)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }
}
