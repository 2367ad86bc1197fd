//! CoA work queue and policy template models.
//!
//! The console never speaks RADIUS itself: `coa_requests` is a persistent
//! queue drained by an external dispatcher, which reports the outcome back
//! through the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of dynamic authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoaKind {
    /// Disconnect-Request: terminate the session.
    Disconnect,
    /// CoA-Request: change session attributes in place.
    Coa,
}

impl std::fmt::Display for CoaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoaKind::Disconnect => write!(f, "disconnect"),
            CoaKind::Coa => write!(f, "coa"),
        }
    }
}

impl std::str::FromStr for CoaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disconnect" => Ok(CoaKind::Disconnect),
            "coa" => Ok(CoaKind::Coa),
            _ => Err(format!("Invalid CoA kind: {s}")),
        }
    }
}

/// Queue state of a CoA request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoaStatus {
    Pending,
    Sent,
    Acked,
    Nacked,
    Failed,
    Cancelled,
}

impl CoaStatus {
    /// Only queued requests can be cancelled.
    pub fn can_cancel(self) -> bool {
        self == CoaStatus::Pending
    }

    /// States a dispatcher may report for a drained request.
    pub fn is_terminal_outcome(self) -> bool {
        matches!(self, CoaStatus::Acked | CoaStatus::Nacked | CoaStatus::Failed)
    }
}

impl std::fmt::Display for CoaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CoaStatus::Pending => "pending",
            CoaStatus::Sent => "sent",
            CoaStatus::Acked => "acked",
            CoaStatus::Nacked => "nacked",
            CoaStatus::Failed => "failed",
            CoaStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for CoaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(CoaStatus::Pending),
            "sent" => Ok(CoaStatus::Sent),
            "acked" => Ok(CoaStatus::Acked),
            "nacked" => Ok(CoaStatus::Nacked),
            "failed" => Ok(CoaStatus::Failed),
            "cancelled" => Ok(CoaStatus::Cancelled),
            _ => Err(format!("Invalid CoA status: {s}")),
        }
    }
}

/// A `coa_requests` row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CoaRequest {
    pub id: Uuid,
    pub kind: String,
    pub username: String,
    pub acct_session_id: Option<String>,
    pub nas_ip: Option<String>,
    /// RADIUS attributes to carry in the request, as `AttributeEntry` JSON.
    pub attributes: Option<JsonValue>,
    pub status: String,
    pub requested_by: String,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl CoaRequest {
    pub fn status_enum(&self) -> Option<CoaStatus> {
        self.status.parse().ok()
    }

    pub fn kind_enum(&self) -> Option<CoaKind> {
        self.kind.parse().ok()
    }
}

/// A `policy_templates` row: a reusable bundle of check/reply attributes.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PolicyTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// `AttributeEntry` array applied to check tables.
    pub check_attributes: JsonValue,
    /// `AttributeEntry` array applied to reply tables.
    pub reply_attributes: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a policy template is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyTarget {
    User,
    Group,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        assert_eq!("disconnect".parse::<CoaKind>().unwrap(), CoaKind::Disconnect);
        assert_eq!("COA".parse::<CoaKind>().unwrap(), CoaKind::Coa);
        assert!("dm".parse::<CoaKind>().is_err());
        assert_eq!(CoaKind::Disconnect.to_string(), "disconnect");
    }

    #[test]
    fn test_status_roundtrip_all() {
        for status in [
            CoaStatus::Pending,
            CoaStatus::Sent,
            CoaStatus::Acked,
            CoaStatus::Nacked,
            CoaStatus::Failed,
            CoaStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<CoaStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_only_pending_can_cancel() {
        assert!(CoaStatus::Pending.can_cancel());
        assert!(!CoaStatus::Sent.can_cancel());
        assert!(!CoaStatus::Acked.can_cancel());
        assert!(!CoaStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_terminal_outcomes() {
        assert!(CoaStatus::Acked.is_terminal_outcome());
        assert!(CoaStatus::Nacked.is_terminal_outcome());
        assert!(CoaStatus::Failed.is_terminal_outcome());
        assert!(!CoaStatus::Pending.is_terminal_outcome());
        assert!(!CoaStatus::Cancelled.is_terminal_outcome());
    }

    #[test]
    fn test_apply_target_serde() {
        assert_eq!(
            serde_json::from_str::<ApplyTarget>(r#""user""#).unwrap(),
            ApplyTarget::User
        );
        assert_eq!(
            serde_json::to_string(&ApplyTarget::Group).unwrap(),
            r#""group""#
        );
    }

    #[test]
    fn test_request_enum_accessors() {
        let row = CoaRequest {
            id: Uuid::nil(),
            kind: "disconnect".to_string(),
            username: "alice".to_string(),
            acct_session_id: Some("5E1F0001".to_string()),
            nas_ip: Some("10.0.0.1".to_string()),
            attributes: None,
            status: "pending".to_string(),
            requested_by: "admin".to_string(),
            result: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        assert_eq!(row.status_enum(), Some(CoaStatus::Pending));
        assert_eq!(row.kind_enum(), Some(CoaKind::Disconnect));
    }
}
