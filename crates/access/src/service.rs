use crate::error::Result;
use crate::gateway::{ControlPlane, GatewayAction, GatewayResponse};
use crate::log::AccessLog;
use chrono::Utc;
use keyflow_models::{encode_access_points, AccessRequest};
use std::sync::Arc;

/// Orchestrates validator → upstream gateway → audit log for the two
/// operations. The upstream is the source of truth: the log is only touched
/// after the upstream acknowledges, and a log failure after that point is a
/// known inconsistency window with no compensating call.
///
/// Concurrent calls for the same `(visitor_token, key_card)` are not
/// coordinated: two racing grants can both insert, and a grant racing a
/// revoke resolves last-write-wins in the store.
#[derive(Clone)]
pub struct AccessService {
    gateway: Arc<dyn ControlPlane>,
    log: Arc<dyn AccessLog>,
}

impl AccessService {
    pub fn new(gateway: Arc<dyn ControlPlane>, log: Arc<dyn AccessLog>) -> Self {
        Self { gateway, log }
    }

    /// Grant access to the requested points and check the visitor in.
    pub async fn grant(&self, request: &AccessRequest) -> Result<GatewayResponse> {
        let valid = request.validate()?;
        tracing::info!(
            key_card = valid.key_card,
            visitor_token = valid.visitor_token,
            access_points = ?valid.access_points,
            idempotency_key = request.idempotency_key.as_deref(),
            "granting access"
        );

        let response = self
            .gateway
            .call(GatewayAction::Grant, valid.key_card, valid.access_points)
            .await?;

        // Upstream acknowledged; anything failing from here on leaves remote
        // state granted with no matching audit row.
        let blob = encode_access_points(valid.access_points)?;
        let session_id = self
            .log
            .record_check_in(valid.visitor_token, valid.key_card, &blob, Utc::now())
            .await
            .map_err(|e| {
                tracing::error!(
                    key_card = valid.key_card,
                    visitor_token = valid.visitor_token,
                    error = %e,
                    "upstream grant acknowledged but check-in write failed; audit gap"
                );
                e
            })?;

        tracing::debug!(session_id, "access session recorded");
        Ok(response)
    }

    /// Revoke access and check out every session for the identity. A missing
    /// session is not an error; the upstream acknowledgment alone makes the
    /// revoke successful.
    pub async fn revoke(&self, request: &AccessRequest) -> Result<GatewayResponse> {
        let valid = request.validate()?;
        tracing::info!(
            key_card = valid.key_card,
            visitor_token = valid.visitor_token,
            idempotency_key = request.idempotency_key.as_deref(),
            "revoking access"
        );

        let response = self
            .gateway
            .call(GatewayAction::Revoke, valid.key_card, valid.access_points)
            .await?;

        let sessions = self
            .log
            .find_sessions(valid.visitor_token, valid.key_card)
            .await?;

        if !sessions.is_empty() {
            let updated = self
                .log
                .record_check_out(valid.visitor_token, valid.key_card, Utc::now())
                .await
                .map_err(|e| {
                    tracing::error!(
                        key_card = valid.key_card,
                        visitor_token = valid.visitor_token,
                        error = %e,
                        "upstream revoke acknowledged but check-out write failed; audit gap"
                    );
                    e
                })?;
            tracing::debug!(updated, "access sessions checked out");
        } else {
            tracing::debug!("no matching session to check out");
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use keyflow_database::DatabaseError;
    use keyflow_models::ValidationError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted upstream: answers with a fixed status and counts calls.
    struct FakeGateway {
        status: u16,
        calls: AtomicUsize,
    }

    impl FakeGateway {
        fn answering(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ControlPlane for FakeGateway {
        async fn call(
            &self,
            _action: GatewayAction,
            _key_card: &str,
            _access_points: &[String],
        ) -> Result<GatewayResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.status == 200 || self.status == 201 {
                Ok(GatewayResponse {
                    status: self.status,
                    body: "ok".to_string(),
                })
            } else {
                Err(AccessError::UpstreamUnavailable {
                    status: Some(self.status),
                    detail: String::new(),
                })
            }
        }
    }

    #[derive(Debug, Clone)]
    struct FakeRow {
        id: i64,
        visitor_token: String,
        key_card: String,
        access_points: String,
        is_active: bool,
        time_checked_out: Option<DateTime<Utc>>,
    }

    /// In-memory stand-in for the repository, mirroring its matching rules.
    #[derive(Default)]
    struct FakeLog {
        rows: Mutex<Vec<FakeRow>>,
        fail_writes: bool,
    }

    impl FakeLog {
        fn empty() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(Vec::new()),
                fail_writes: true,
            })
        }

        fn rows(&self) -> Vec<FakeRow> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AccessLog for FakeLog {
        async fn record_check_in(
            &self,
            visitor_token: &str,
            key_card: &str,
            access_points: &str,
            _checked_in_at: DateTime<Utc>,
        ) -> Result<i64> {
            if self.fail_writes {
                return Err(AccessError::StoreUnavailable(DatabaseError::Other(
                    "store down".to_string(),
                )));
            }
            let mut rows = self.rows.lock().unwrap();
            let id = rows.len() as i64 + 1;
            rows.push(FakeRow {
                id,
                visitor_token: visitor_token.to_string(),
                key_card: key_card.to_string(),
                access_points: access_points.to_string(),
                is_active: true,
                time_checked_out: None,
            });
            Ok(id)
        }

        async fn find_sessions(
            &self,
            visitor_token: &str,
            key_card: &str,
        ) -> Result<Vec<i64>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.visitor_token == visitor_token && r.key_card == key_card)
                .map(|r| r.id)
                .collect())
        }

        async fn record_check_out(
            &self,
            visitor_token: &str,
            key_card: &str,
            checked_out_at: DateTime<Utc>,
        ) -> Result<u64> {
            if self.fail_writes {
                return Err(AccessError::StoreUnavailable(DatabaseError::Other(
                    "store down".to_string(),
                )));
            }
            let mut updated = 0;
            for row in self.rows.lock().unwrap().iter_mut() {
                if row.visitor_token == visitor_token && row.key_card == key_card {
                    row.is_active = false;
                    row.time_checked_out = Some(checked_out_at);
                    updated += 1;
                }
            }
            Ok(updated)
        }
    }

    fn request(key_card: &str, visitor_token: &str, points: &[&str]) -> AccessRequest {
        AccessRequest {
            key_card: Some(key_card.to_string()),
            visitor_token: Some(visitor_token.to_string()),
            access_points: Some(points.iter().map(|p| p.to_string()).collect()),
            idempotency_key: None,
        }
    }

    fn service(gateway: Arc<FakeGateway>, log: Arc<FakeLog>) -> AccessService {
        AccessService::new(gateway, log)
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_gateway_or_log() {
        let gateway = FakeGateway::answering(200);
        let log = FakeLog::empty();
        let svc = service(gateway.clone(), log.clone());

        let bad = AccessRequest::default();
        let err = svc.grant(&bad).await.unwrap_err();
        assert!(matches!(
            err,
            AccessError::Validation(ValidationError::MissingKeyCard)
        ));

        let err = svc.revoke(&bad).await.unwrap_err();
        assert!(matches!(err, AccessError::Validation(_)));

        assert_eq!(gateway.calls(), 0);
        assert!(log.rows().is_empty());
    }

    #[tokio::test]
    async fn acknowledged_grant_creates_one_active_session() {
        let gateway = FakeGateway::answering(200);
        let log = FakeLog::empty();
        let svc = service(gateway, log.clone());

        let response = svc.grant(&request("k1", "v1", &["door1"])).await.unwrap();
        assert_eq!(response.status, 200);

        let rows = log.rows();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_active);
        assert!(rows[0].time_checked_out.is_none());
        assert_eq!(rows[0].access_points, r#"["door1"]"#);
    }

    #[tokio::test]
    async fn failed_upstream_grant_writes_nothing() {
        let gateway = FakeGateway::answering(500);
        let log = FakeLog::empty();
        let svc = service(gateway.clone(), log.clone());

        let err = svc.grant(&request("k1", "v1", &["door1"])).await.unwrap_err();
        assert!(matches!(
            err,
            AccessError::UpstreamUnavailable {
                status: Some(500),
                ..
            }
        ));
        assert_eq!(gateway.calls(), 1);
        assert!(log.rows().is_empty());
    }

    #[tokio::test]
    async fn store_failure_after_acknowledged_grant_is_surfaced() {
        let gateway = FakeGateway::answering(201);
        let log = FakeLog::failing();
        let svc = service(gateway.clone(), log);

        let err = svc.grant(&request("k1", "v1", &["door1"])).await.unwrap_err();
        // The grant already happened upstream; the caller still sees failure.
        assert!(matches!(err, AccessError::StoreUnavailable(_)));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn revoke_closes_matching_sessions_idempotently() {
        let log = FakeLog::empty();
        let svc = service(FakeGateway::answering(200), log.clone());

        svc.grant(&request("k1", "v1", &["door1", "door2"]))
            .await
            .unwrap();

        let response = svc
            .revoke(&request("k1", "v1", &["door1", "door2"]))
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let rows = log.rows();
        assert!(!rows[0].is_active);
        let first_checkout = rows[0].time_checked_out.unwrap();

        // Second revoke re-stamps without erroring.
        svc.revoke(&request("k1", "v1", &["door1", "door2"]))
            .await
            .unwrap();
        let rows = log.rows();
        assert!(!rows[0].is_active);
        assert!(rows[0].time_checked_out.unwrap() >= first_checkout);
    }

    #[tokio::test]
    async fn revoke_without_session_still_succeeds() {
        let log = FakeLog::empty();
        let svc = service(FakeGateway::answering(200), log.clone());

        let response = svc
            .revoke(&request("k-unknown", "v-unknown", &["door1"]))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert!(log.rows().is_empty());
    }

    #[tokio::test]
    async fn failed_upstream_revoke_leaves_log_untouched() {
        let log = FakeLog::empty();
        let svc = service(FakeGateway::answering(200), log.clone());
        svc.grant(&request("k1", "v1", &["door1"])).await.unwrap();

        let svc_down = service(FakeGateway::answering(503), log.clone());
        let err = svc_down
            .revoke(&request("k1", "v1", &["door1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::UpstreamUnavailable { .. }));
        assert!(log.rows()[0].is_active);
    }

    #[tokio::test]
    async fn revoke_closes_every_session_for_the_identity() {
        let log = FakeLog::empty();
        let svc = service(FakeGateway::answering(200), log.clone());

        // Duplicate grants are accepted behavior; both insert.
        svc.grant(&request("k1", "v1", &["door1"])).await.unwrap();
        svc.grant(&request("k1", "v1", &["door2"])).await.unwrap();
        svc.grant(&request("k2", "v1", &["door1"])).await.unwrap();

        svc.revoke(&request("k1", "v1", &["door1"])).await.unwrap();

        let rows = log.rows();
        assert!(rows.iter().filter(|r| r.key_card == "k1").all(|r| !r.is_active));
        // Other key cards are untouched; revoke matches the whole identity only.
        assert!(rows.iter().find(|r| r.key_card == "k2").unwrap().is_active);
    }

    #[tokio::test]
    async fn grant_revoke_revoke_round_trip() {
        let log = FakeLog::empty();
        let svc = service(FakeGateway::answering(201), log.clone());

        svc.grant(&request("k1", "v1", &["door1", "door2"]))
            .await
            .unwrap();
        let rows = log.rows();
        assert!(rows[0].is_active);
        assert_eq!(
            keyflow_models::decode_access_points(&rows[0].access_points).unwrap(),
            vec!["door1".to_string(), "door2".to_string()]
        );

        let svc = service(FakeGateway::answering(200), log.clone());
        svc.revoke(&request("k1", "v1", &["door1", "door2"]))
            .await
            .unwrap();
        let rows = log.rows();
        assert!(!rows[0].is_active);
        assert!(rows[0].time_checked_out.is_some());

        svc.revoke(&request("k1", "v1", &["door1", "door2"]))
            .await
            .unwrap();
        let rows = log.rows();
        assert!(!rows[0].is_active);
        assert!(rows[0].time_checked_out.is_some());
    }
}
