//! Console administrator accounts and RBAC roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A console administrator account (`admin_users` table).
///
/// The password hash and TOTP secret never leave the server: both are
/// skipped during serialization.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,
    pub totp_enabled: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An RBAC role (`rbac_roles` table).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Role names with built-in meaning. `ADMIN_ROLE` gates all mutating
/// console operations; other roles are read-only viewers.
pub const ADMIN_ROLE: &str = "admin";
pub const OPERATOR_ROLE: &str = "operator";
pub const VIEWER_ROLE: &str = "viewer";

/// Roles that may be granted through the API.
pub const ASSIGNABLE_ROLES: &[&str] = &[ADMIN_ROLE, OPERATOR_ROLE, VIEWER_ROLE];

/// An administrator together with their resolved role names.
#[derive(Debug, Clone, Serialize)]
pub struct AdminUserWithRoles {
    #[serde(flatten)]
    pub user: AdminUser,
    pub roles: Vec<String>,
}

/// Request body for creating an administrator.
#[derive(Debug, Deserialize)]
pub struct CreateAdminUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Request body for updating an administrator. Absent fields are unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateAdminUserRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> AdminUser {
        AdminUser {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            display_name: Some("Alice".to_string()),
            password_hash: "$2b$12$secret".to_string(),
            totp_secret: Some("JBSWY3DPEHPK3PXP".to_string()),
            totp_enabled: true,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("totp_secret").is_none());
        assert!(json.get("username").is_some());
    }

    #[test]
    fn test_user_with_roles_flattens() {
        let with_roles = AdminUserWithRoles {
            user: sample_user(),
            roles: vec!["admin".to_string()],
        };
        let json = serde_json::to_value(&with_roles).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["roles"][0], "admin");
        assert!(json.get("user").is_none(), "user must be flattened");
    }

    #[test]
    fn test_create_request_roles_default_empty() {
        let req: CreateAdminUserRequest = serde_json::from_str(
            r#"{"username": "bob", "email": "bob@example.com", "password": "hunter22!"}"#,
        )
        .unwrap();
        assert!(req.roles.is_empty());
        assert!(req.display_name.is_none());
    }

    #[test]
    fn test_assignable_roles_include_admin() {
        assert!(ASSIGNABLE_ROLES.contains(&ADMIN_ROLE));
        assert!(ASSIGNABLE_ROLES.contains(&VIEWER_ROLE));
    }
}
