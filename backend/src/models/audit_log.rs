//! Append-only audit trail for console operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// What an audit entry records having happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    LoginFailed,
    Logout,
    TokenRefresh,
    Create,
    Update,
    Delete,
    PasswordChange,
    RoleGrant,
    RoleRevoke,
    Export,
    Purge,
    Disconnect,
    SessionClose,
    TemplateApply,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::TokenRefresh => "token_refresh",
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::PasswordChange => "password_change",
            AuditAction::RoleGrant => "role_grant",
            AuditAction::RoleRevoke => "role_revoke",
            AuditAction::Export => "export",
            AuditAction::Purge => "purge",
            AuditAction::Disconnect => "disconnect",
            AuditAction::SessionClose => "session_close",
            AuditAction::TemplateApply => "template_apply",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "login" => Ok(AuditAction::Login),
            "login_failed" => Ok(AuditAction::LoginFailed),
            "logout" => Ok(AuditAction::Logout),
            "token_refresh" => Ok(AuditAction::TokenRefresh),
            "create" => Ok(AuditAction::Create),
            "update" => Ok(AuditAction::Update),
            "delete" => Ok(AuditAction::Delete),
            "password_change" => Ok(AuditAction::PasswordChange),
            "role_grant" => Ok(AuditAction::RoleGrant),
            "role_revoke" => Ok(AuditAction::RoleRevoke),
            "export" => Ok(AuditAction::Export),
            "purge" => Ok(AuditAction::Purge),
            "disconnect" => Ok(AuditAction::Disconnect),
            "session_close" => Ok(AuditAction::SessionClose),
            "template_apply" => Ok(AuditAction::TemplateApply),
            _ => Err(format!("Invalid audit action: {s}")),
        }
    }
}

/// Which part of the console the entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Auth,
    AdminUser,
    RadiusUser,
    RadiusGroup,
    Session,
    Audit,
    Coa,
    PolicyTemplate,
    System,
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditCategory::Auth => "auth",
            AuditCategory::AdminUser => "admin_user",
            AuditCategory::RadiusUser => "radius_user",
            AuditCategory::RadiusGroup => "radius_group",
            AuditCategory::Session => "session",
            AuditCategory::Audit => "audit",
            AuditCategory::Coa => "coa",
            AuditCategory::PolicyTemplate => "policy_template",
            AuditCategory::System => "system",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AuditCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auth" => Ok(AuditCategory::Auth),
            "admin_user" => Ok(AuditCategory::AdminUser),
            "radius_user" => Ok(AuditCategory::RadiusUser),
            "radius_group" => Ok(AuditCategory::RadiusGroup),
            "session" => Ok(AuditCategory::Session),
            "audit" => Ok(AuditCategory::Audit),
            "coa" => Ok(AuditCategory::Coa),
            "policy_template" => Ok(AuditCategory::PolicyTemplate),
            "system" => Ok(AuditCategory::System),
            _ => Err(format!("Invalid audit category: {s}")),
        }
    }
}

/// An `audit_logs` row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    /// Actor username; `system` for scheduler-driven entries.
    pub username: String,
    pub action: String,
    pub category: String,
    /// What the action applied to, e.g. a username or group name.
    pub target: Option<String>,
    pub detail: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn action_enum(&self) -> Option<AuditAction> {
        self.action.parse().ok()
    }

    pub fn category_enum(&self) -> Option<AuditCategory> {
        self.category.parse().ok()
    }
}

/// Input for writing one audit entry.
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub username: String,
    pub action: AuditAction,
    pub category: AuditCategory,
    pub target: Option<String>,
    pub detail: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewAuditLog {
    /// Entry attributed to the background scheduler rather than a request.
    pub fn system(action: AuditAction, category: AuditCategory, target: Option<String>) -> Self {
        Self {
            username: "system".to_string(),
            action,
            category,
            target,
            detail: None,
            ip_address: None,
            user_agent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_display() {
        assert_eq!(AuditAction::Login.to_string(), "login");
        assert_eq!(AuditAction::LoginFailed.to_string(), "login_failed");
        assert_eq!(AuditAction::TemplateApply.to_string(), "template_apply");
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("login".parse::<AuditAction>().unwrap(), AuditAction::Login);
        assert_eq!(
            "LOGIN_FAILED".parse::<AuditAction>().unwrap(),
            AuditAction::LoginFailed
        );
        assert!("invalid".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_action_roundtrip_all() {
        for action in [
            AuditAction::Login,
            AuditAction::LoginFailed,
            AuditAction::Logout,
            AuditAction::TokenRefresh,
            AuditAction::Create,
            AuditAction::Update,
            AuditAction::Delete,
            AuditAction::PasswordChange,
            AuditAction::RoleGrant,
            AuditAction::RoleRevoke,
            AuditAction::Export,
            AuditAction::Purge,
            AuditAction::Disconnect,
            AuditAction::SessionClose,
            AuditAction::TemplateApply,
        ] {
            assert_eq!(action.to_string().parse::<AuditAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_category_display() {
        assert_eq!(AuditCategory::RadiusUser.to_string(), "radius_user");
        assert_eq!(AuditCategory::PolicyTemplate.to_string(), "policy_template");
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!(
            "radius_group".parse::<AuditCategory>().unwrap(),
            AuditCategory::RadiusGroup
        );
        assert!("radius".parse::<AuditCategory>().is_err());
    }

    #[test]
    fn test_enum_accessors_tolerate_unknown_values() {
        let row = AuditLog {
            id: Uuid::nil(),
            username: "alice".to_string(),
            action: "defragment".to_string(),
            category: "auth".to_string(),
            target: None,
            detail: None,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        };
        assert!(row.action_enum().is_none());
        assert_eq!(row.category_enum(), Some(AuditCategory::Auth));
    }

    #[test]
    fn test_system_entry() {
        let entry = NewAuditLog::system(AuditAction::Purge, AuditCategory::Audit, None);
        assert_eq!(entry.username, "system");
        assert!(entry.ip_address.is_none());
    }
}
