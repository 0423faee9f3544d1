use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-supplied grant/revoke request. Field names on the wire are
/// camelCase, matching the device front-ends that already speak this API.
///
/// Fields are optional at the type level so that validation, not
/// deserialization, decides which precondition failed first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub key_card: Option<String>,
    pub visitor_token: Option<String>,
    pub access_points: Option<Vec<String>>,
    /// Optional caller-supplied key, propagated into traces so collaborators
    /// can correlate retried requests. Not used for deduplication here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Validated, borrowed view of an [`AccessRequest`]. Obtaining one proves
/// every precondition held; the workflow only ever consumes this view.
#[derive(Debug, Clone, Copy)]
pub struct ValidAccess<'a> {
    pub key_card: &'a str,
    pub visitor_token: &'a str,
    pub access_points: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("key card id was not provided")]
    MissingKeyCard,
    #[error("visitor token was not provided")]
    MissingVisitorToken,
    #[error("access points were not provided")]
    MissingAccessPoints,
    #[error("access points list is empty")]
    EmptyAccessPoints,
}

impl AccessRequest {
    /// Check preconditions in a fixed order (key card, visitor token,
    /// access-points presence, access-points non-emptiness) so the first
    /// violated one is the one reported. Identical for grant and revoke.
    pub fn validate(&self) -> Result<ValidAccess<'_>, ValidationError> {
        let key_card = match self.key_card.as_deref() {
            Some(k) if !k.is_empty() => k,
            _ => return Err(ValidationError::MissingKeyCard),
        };
        let visitor_token = match self.visitor_token.as_deref() {
            Some(v) if !v.is_empty() => v,
            _ => return Err(ValidationError::MissingVisitorToken),
        };
        let access_points = self
            .access_points
            .as_deref()
            .ok_or(ValidationError::MissingAccessPoints)?;
        if access_points.is_empty() {
            return Err(ValidationError::EmptyAccessPoints);
        }
        Ok(ValidAccess {
            key_card,
            visitor_token,
            access_points,
        })
    }
}

/// One grant-to-revoke lifetime for a `(visitor_token, key_card)` pair,
/// persisted in `access_control_log` for audit purposes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessSession {
    pub id: i64,
    pub visitor_token: String,
    pub key_card: String,
    /// JSON-encoded ordered list of access-point identifiers. Opaque to the
    /// store; decode with [`decode_access_points`].
    pub access_points: String,
    pub is_active: bool,
    pub time_checked_in: DateTime<Utc>,
    pub time_checked_out: Option<DateTime<Utc>>,
    /// Reserved for manual overrides by an operator; never written by the
    /// grant/revoke workflow.
    pub admin_id: Option<String>,
    pub admin_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Serialize the ordered access-point list into the opaque blob stored in
/// the `access_points` column.
pub fn encode_access_points(points: &[String]) -> Result<String, serde_json::Error> {
    serde_json::to_string(points)
}

/// Inverse of [`encode_access_points`].
pub fn decode_access_points(blob: &str) -> Result<Vec<String>, serde_json::Error> {
    serde_json::from_str(blob)
}
