use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyflow_database::AccessLogRepository;

/// Seam to the durable audit log. The sqlx-backed implementation lives in
/// `keyflow-database`; tests substitute an in-memory fake.
#[async_trait]
pub trait AccessLog: Send + Sync {
    /// Insert an active session, returning its id. `access_points` is the
    /// JSON-encoded ordered list.
    async fn record_check_in(
        &self,
        visitor_token: &str,
        key_card: &str,
        access_points: &str,
        checked_in_at: DateTime<Utc>,
    ) -> Result<i64>;

    /// Ids of the sessions recorded for the identity, any state, in store
    /// order.
    async fn find_sessions(&self, visitor_token: &str, key_card: &str) -> Result<Vec<i64>>;

    /// Soft-close every session matching the identity; idempotent. Returns
    /// the number of rows updated.
    async fn record_check_out(
        &self,
        visitor_token: &str,
        key_card: &str,
        checked_out_at: DateTime<Utc>,
    ) -> Result<u64>;
}

#[async_trait]
impl AccessLog for AccessLogRepository {
    async fn record_check_in(
        &self,
        visitor_token: &str,
        key_card: &str,
        access_points: &str,
        checked_in_at: DateTime<Utc>,
    ) -> Result<i64> {
        Ok(AccessLogRepository::record_check_in(
            self,
            visitor_token,
            key_card,
            access_points,
            checked_in_at,
        )
        .await?)
    }

    async fn find_sessions(&self, visitor_token: &str, key_card: &str) -> Result<Vec<i64>> {
        Ok(AccessLogRepository::find_sessions(self, visitor_token, key_card).await?)
    }

    async fn record_check_out(
        &self,
        visitor_token: &str,
        key_card: &str,
        checked_out_at: DateTime<Utc>,
    ) -> Result<u64> {
        Ok(
            AccessLogRepository::record_check_out(self, visitor_token, key_card, checked_out_at)
                .await?,
        )
    }
}
