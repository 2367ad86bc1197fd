//! Authentication handlers: login, token refresh, logout, self-service
//! password changes and TOTP enrollment.

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::auth::AuthExtension;
use crate::api::{handlers::client_meta, SharedState};
use crate::error::{AppError, Result};
use crate::models::audit_log::{AuditAction, AuditCategory, NewAuditLog};
use crate::models::user::AdminUserWithRoles;
use crate::services::audit_service::AuditService;
use crate::services::auth_service::AuthService;
use crate::services::token_service::TokenPair;
use crate::services::user_service::UserService;

/// Routes reachable without a token.
pub fn public_router() -> Router<SharedState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
}

/// Routes behind the bearer-token middleware.
pub fn protected_router() -> Router<SharedState> {
    Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/password", post(change_password))
        .route("/totp/enroll", post(totp_enroll))
        .route("/totp/confirm", post(totp_confirm))
        .route("/totp", delete(totp_disable))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub totp_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: AdminUserWithRoles,
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (ip, user_agent) = client_meta(&headers);
    let auth = AuthService::new(state.db.clone(), &state.config.jwt_issuer);
    let audit = AuditService::new(state.db.clone());

    let outcome = auth
        .authenticate(&payload.username, &payload.password, payload.totp_code.as_deref())
        .await;

    let (user, roles) = match outcome {
        Ok(pair) => pair,
        Err(e) => {
            audit
                .record_best_effort(NewAuditLog {
                    username: payload.username.clone(),
                    action: AuditAction::LoginFailed,
                    category: AuditCategory::Auth,
                    target: None,
                    detail: None,
                    ip_address: ip,
                    user_agent,
                })
                .await;
            return Err(e);
        }
    };

    let tokens = state.tokens.issue_pair(user.id, &user.username, &roles)?;

    audit
        .record_best_effort(NewAuditLog {
            username: user.username.clone(),
            action: AuditAction::Login,
            category: AuditCategory::Auth,
            target: None,
            detail: None,
            ip_address: ip,
            user_agent,
        })
        .await;

    Ok(Json(LoginResponse {
        tokens,
        user: AdminUserWithRoles { user, roles },
    }))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /api/v1/auth/refresh - rotate a refresh token into a new pair
pub async fn refresh(
    State(state): State<SharedState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>> {
    let user_id = state.tokens.consume_refresh(&payload.refresh_token)?;

    let users = UserService::new(state.db.clone());
    let user = users.get_row(user_id).await.map_err(|_| {
        AppError::Unauthorized("Account no longer exists".to_string())
    })?;
    if !user.is_active {
        return Err(AppError::Unauthorized("Account is disabled".to_string()));
    }
    let roles = users.roles_for(user.id).await?;

    let tokens = state.tokens.issue_pair(user.id, &user.username, &roles)?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: user.username.clone(),
            action: AuditAction::TokenRefresh,
            category: AuditCategory::Auth,
            target: None,
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(tokens))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// POST /api/v1/auth/logout - denylist the access token, revoke the refresh
/// token when supplied
pub async fn logout(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    payload: Option<Json<LogoutRequest>>,
) -> Result<Json<serde_json::Value>> {
    state.tokens.deny_access(&auth.claims);
    if let Some(Json(body)) = payload {
        if let Some(refresh_token) = body.refresh_token {
            state.tokens.revoke_refresh(&refresh_token);
        }
    }

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Logout,
            category: AuditCategory::Auth,
            target: None,
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "logged_out": true })))
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<AdminUserWithRoles>> {
    let user = UserService::new(state.db.clone()).get(auth.user_id).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/v1/auth/password - self-service password change
pub async fn change_password(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    let service = AuthService::new(state.db.clone(), &state.config.jwt_issuer);
    service
        .change_password(
            auth.user_id,
            &payload.current_password,
            &payload.new_password,
            state.config.bcrypt_cost,
        )
        .await?;

    // Changing the password invalidates every outstanding session.
    state.tokens.revoke_all_for_user(auth.user_id);

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::PasswordChange,
            category: AuditCategory::Auth,
            target: None,
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "changed": true })))
}

#[derive(Debug, Serialize)]
pub struct TotpEnrollResponse {
    pub secret: String,
    pub otpauth_url: String,
}

/// POST /api/v1/auth/totp/enroll
pub async fn totp_enroll(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<TotpEnrollResponse>> {
    let service = AuthService::new(state.db.clone(), &state.config.jwt_issuer);
    let (secret, otpauth_url) = service.totp_enroll(auth.user_id).await?;
    Ok(Json(TotpEnrollResponse { secret, otpauth_url }))
}

#[derive(Debug, Deserialize)]
pub struct TotpConfirmRequest {
    pub code: String,
}

/// POST /api/v1/auth/totp/confirm
pub async fn totp_confirm(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<TotpConfirmRequest>,
) -> Result<Json<serde_json::Value>> {
    let service = AuthService::new(state.db.clone(), &state.config.jwt_issuer);
    service.totp_confirm(auth.user_id, &payload.code).await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Update,
            category: AuditCategory::Auth,
            target: Some("totp_enabled".to_string()),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "totp_enabled": true })))
}

#[derive(Debug, Deserialize)]
pub struct TotpDisableRequest {
    pub password: String,
}

/// DELETE /api/v1/auth/totp
pub async fn totp_disable(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<TotpDisableRequest>,
) -> Result<Json<serde_json::Value>> {
    let service = AuthService::new(state.db.clone(), &state.config.jwt_issuer);
    service.totp_disable(auth.user_id, &payload.password).await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Update,
            category: AuditCategory::Auth,
            target: Some("totp_disabled".to_string()),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "totp_enabled": false })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_optional_totp() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"username": "alice", "password": "pw"}"#).unwrap();
        assert!(req.totp_code.is_none());
    }

    #[test]
    fn test_logout_request_allows_empty_body() {
        let req: LogoutRequest = serde_json::from_str("{}").unwrap();
        assert!(req.refresh_token.is_none());
    }

    #[test]
    fn test_login_response_flattens_tokens() {
        use crate::models::user::AdminUser;
        use chrono::Utc;
        use uuid::Uuid;

        let response = LoginResponse {
            tokens: TokenPair {
                access_token: "a.b.c".to_string(),
                refresh_token: "r".to_string(),
                token_type: "Bearer",
                expires_in: 900,
            },
            user: AdminUserWithRoles {
                user: AdminUser {
                    id: Uuid::nil(),
                    username: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                    display_name: None,
                    password_hash: "h".to_string(),
                    totp_secret: None,
                    totp_enabled: false,
                    is_active: true,
                    last_login_at: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
                roles: vec!["admin".to_string()],
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["access_token"], "a.b.c");
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["user"]["username"], "alice");
        assert!(json["user"].get("password_hash").is_none());
    }
}
