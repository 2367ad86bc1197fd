//! Console administrator accounts: CRUD, passwords and role assignment.

use chrono::Utc;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::api::validation::{
    escape_like, validate_email, validate_password, validate_username,
};
use crate::error::{AppError, Result};
use crate::models::user::{
    AdminUser, AdminUserWithRoles, CreateAdminUserRequest, Role, UpdateAdminUserRequest,
    ADMIN_ROLE, ASSIGNABLE_ROLES,
};

const USER_COLUMNS: &str = "id, username, email, display_name, password_hash, totp_secret, \
                            totp_enabled, is_active, last_login_at, created_at, updated_at";

/// True when the error is a unique-index violation (duplicate username/email
/// losing a race with the insert).
fn is_duplicate(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub struct UserService {
    db: MySqlPool,
}

impl UserService {
    pub fn new(db: MySqlPool) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        page: u32,
        per_page: u32,
        search: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<(Vec<AdminUserWithRoles>, i64)> {
        let offset = ((page.max(1) - 1) * per_page) as i64;
        let pattern = search.map(|s| format!("%{}%", escape_like(s)));

        let users: Vec<AdminUser> = sqlx::query_as(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM admin_users
            WHERE (? IS NULL OR username LIKE ? OR email LIKE ?)
              AND (? IS NULL OR is_active = ?)
            ORDER BY username
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(is_active)
        .bind(is_active)
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM admin_users
            WHERE (? IS NULL OR username LIKE ? OR email LIKE ?)
              AND (? IS NULL OR is_active = ?)
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(is_active)
        .bind(is_active)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let mut out = Vec::with_capacity(users.len());
        for user in users {
            let roles = self.roles_for(user.id).await?;
            out.push(AdminUserWithRoles { user, roles });
        }
        Ok((out, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<AdminUserWithRoles> {
        let user = self.get_row(id).await?;
        let roles = self.roles_for(user.id).await?;
        Ok(AdminUserWithRoles { user, roles })
    }

    pub async fn get_row(&self, id: Uuid) -> Result<AdminUser> {
        sqlx::query_as::<_, AdminUser>(&format!(
            "SELECT {USER_COLUMNS} FROM admin_users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<AdminUser>> {
        sqlx::query_as::<_, AdminUser>(&format!(
            "SELECT {USER_COLUMNS} FROM admin_users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn create(
        &self,
        req: CreateAdminUserRequest,
        bcrypt_cost: u32,
    ) -> Result<AdminUserWithRoles> {
        validate_username(&req.username, "Username")?;
        validate_email(&req.email)?;
        validate_password(&req.password)?;
        for role in &req.roles {
            if !ASSIGNABLE_ROLES.contains(&role.as_str()) {
                return Err(AppError::Validation(format!("Unknown role '{role}'")));
            }
        }

        let password_hash = bcrypt::hash(&req.password, bcrypt_cost)
            .map_err(|e| AppError::Internal(format!("bcrypt: {e}")))?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO admin_users (id, username, email, display_name, password_hash,
                                     totp_secret, totp_enabled, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, NULL, FALSE, TRUE, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&req.username)
        .bind(&req.email)
        .bind(&req.display_name)
        .bind(&password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if is_duplicate(&e) {
                AppError::Conflict("Username or email already exists".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        for role in &req.roles {
            self.grant_role(id, role).await?;
        }

        self.get(id).await
    }

    pub async fn update(&self, id: Uuid, req: UpdateAdminUserRequest) -> Result<AdminUserWithRoles> {
        let current = self.get_row(id).await?;

        if let Some(email) = &req.email {
            validate_email(email)?;
        }

        // Deactivating the last active administrator would lock the console.
        if req.is_active == Some(false)
            && current.is_active
            && self.is_last_active_admin(id).await?
        {
            return Err(AppError::Conflict(
                "Cannot deactivate the last active administrator".to_string(),
            ));
        }

        sqlx::query(
            r#"
            UPDATE admin_users
            SET email = COALESCE(?, email),
                display_name = COALESCE(?, display_name),
                is_active = COALESCE(?, is_active),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&req.email)
        .bind(&req.display_name)
        .bind(req.is_active)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if is_duplicate(&e) {
                AppError::Conflict("Email already exists".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        self.get(id).await
    }

    pub async fn delete(&self, id: Uuid, acting_user_id: Uuid) -> Result<()> {
        if id == acting_user_id {
            return Err(AppError::Conflict(
                "Cannot delete your own account".to_string(),
            ));
        }
        let target = self.get_row(id).await?;
        if target.is_active && self.is_last_active_admin(id).await? {
            return Err(AppError::Conflict(
                "Cannot delete the last active administrator".to_string(),
            ));
        }

        sqlx::query("DELETE FROM rbac_user_roles WHERE user_id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        sqlx::query("DELETE FROM admin_users WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Replace the stored password hash. Callers revoke refresh tokens.
    pub async fn set_password(&self, id: Uuid, new_password: &str, bcrypt_cost: u32) -> Result<()> {
        validate_password(new_password)?;
        let hash = bcrypt::hash(new_password, bcrypt_cost)
            .map_err(|e| AppError::Internal(format!("bcrypt: {e}")))?;
        let result = sqlx::query(
            "UPDATE admin_users SET password_hash = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    pub async fn record_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE admin_users SET last_login_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    pub async fn roles_for(&self, user_id: Uuid) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT r.name
            FROM rbac_roles r
            JOIN rbac_user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = ?
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at FROM rbac_roles ORDER BY name",
        )
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn grant_role(&self, user_id: Uuid, role: &str) -> Result<()> {
        if !ASSIGNABLE_ROLES.contains(&role) {
            return Err(AppError::Validation(format!("Unknown role '{role}'")));
        }
        let role_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM rbac_roles WHERE name = ?")
                .bind(role)
                .fetch_optional(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        let role_id =
            role_id.ok_or_else(|| AppError::NotFound(format!("Role '{role}' not found")))?;

        sqlx::query(
            "INSERT IGNORE INTO rbac_user_roles (user_id, role_id) VALUES (?, ?)",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn revoke_role(&self, user_id: Uuid, role: &str) -> Result<()> {
        if role == ADMIN_ROLE && self.is_last_active_admin(user_id).await? {
            return Err(AppError::Conflict(
                "Cannot revoke admin from the last active administrator".to_string(),
            ));
        }
        let result = sqlx::query(
            r#"
            DELETE ur FROM rbac_user_roles ur
            JOIN rbac_roles r ON r.id = ur.role_id
            WHERE ur.user_id = ? AND r.name = ?
            "#,
        )
        .bind(user_id)
        .bind(role)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "User does not have role '{role}'"
            )));
        }
        Ok(())
    }

    /// True when no other active account holds the admin role.
    async fn is_last_active_admin(&self, user_id: Uuid) -> Result<bool> {
        let others: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM admin_users u
            JOIN rbac_user_roles ur ON ur.user_id = u.id
            JOIN rbac_roles r ON r.id = ur.role_id
            WHERE r.name = ? AND u.is_active = TRUE AND u.id <> ?
            "#,
        )
        .bind(ADMIN_ROLE)
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(others == 0)
    }

    // -----------------------------------------------------------------------
    // TOTP state
    // -----------------------------------------------------------------------

    /// Store a pending TOTP secret (not yet enabled).
    pub async fn set_totp_secret(&self, id: Uuid, secret: &str) -> Result<()> {
        sqlx::query(
            "UPDATE admin_users SET totp_secret = ?, totp_enabled = FALSE, updated_at = ? WHERE id = ?",
        )
        .bind(secret)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn set_totp_enabled(&self, id: Uuid, enabled: bool) -> Result<()> {
        if enabled {
            sqlx::query(
                "UPDATE admin_users SET totp_enabled = TRUE, updated_at = ? WHERE id = ?",
            )
            .bind(Utc::now())
            .bind(id)
        } else {
            sqlx::query(
                "UPDATE admin_users SET totp_enabled = FALSE, totp_secret = NULL, updated_at = ? WHERE id = ?",
            )
            .bind(Utc::now())
            .bind(id)
        }
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Bootstrap
    // -----------------------------------------------------------------------

    /// Create the initial administrator when the table is empty.
    pub async fn ensure_bootstrap_admin(
        &self,
        username: &str,
        password: Option<&str>,
        bcrypt_cost: u32,
    ) -> Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_users")
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if count > 0 {
            return Ok(());
        }

        let Some(password) = password else {
            return Err(AppError::Config(
                "No administrators exist and BOOTSTRAP_ADMIN_PASSWORD is not set".to_string(),
            ));
        };

        let created = self
            .create(
                CreateAdminUserRequest {
                    username: username.to_string(),
                    email: format!("{username}@localhost.localdomain"),
                    password: password.to_string(),
                    display_name: Some("Bootstrap administrator".to_string()),
                    roles: vec![ADMIN_ROLE.to_string()],
                },
                bcrypt_cost,
            )
            .await?;
        tracing::info!(username = %created.user.username, "Created bootstrap administrator");
        Ok(())
    }
}
