//! Console administrator management handlers.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::handlers::{clamp_paging, Page};
use crate::api::middleware::auth::{require_admin, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::audit_log::{AuditAction, AuditCategory, NewAuditLog};
use crate::models::user::{
    AdminUserWithRoles, CreateAdminUserRequest, Role, UpdateAdminUserRequest,
};
use crate::services::audit_service::AuditService;
use crate::services::user_service::UserService;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/roles", get(list_roles))
        .route(
            "/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/:id/password", put(reset_password))
        .route("/:id/roles", post(grant_role))
        .route("/:id/roles/:role", axum::routing::delete(revoke_role))
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<SharedState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Page<AdminUserWithRoles>>> {
    let (page, per_page) = clamp_paging(query.page, query.per_page);
    let service = UserService::new(state.db.clone());
    let (items, total) = service
        .list(page, per_page, query.search.as_deref(), query.is_active)
        .await?;
    Ok(Json(Page::new(items, page, per_page, total)))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CreateAdminUserRequest>,
) -> Result<Json<AdminUserWithRoles>> {
    require_admin(&auth)?;
    let service = UserService::new(state.db.clone());
    let created = service.create(payload, state.config.bcrypt_cost).await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Create,
            category: AuditCategory::AdminUser,
            target: Some(created.user.username.clone()),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(created))
}

/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminUserWithRoles>> {
    let user = UserService::new(state.db.clone()).get(id).await?;
    Ok(Json(user))
}

/// PATCH /api/v1/users/:id
pub async fn update_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAdminUserRequest>,
) -> Result<Json<AdminUserWithRoles>> {
    require_admin(&auth)?;
    let service = UserService::new(state.db.clone());
    let updated = service.update(id, payload).await?;

    // A deactivated account must not keep refreshing sessions.
    if !updated.user.is_active {
        state.tokens.revoke_all_for_user(id);
    }

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Update,
            category: AuditCategory::AdminUser,
            target: Some(updated.user.username.clone()),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(updated))
}

/// DELETE /api/v1/users/:id
pub async fn delete_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    let service = UserService::new(state.db.clone());
    let target = service.get_row(id).await?;
    service.delete(id, auth.user_id).await?;
    state.tokens.revoke_all_for_user(id);

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Delete,
            category: AuditCategory::AdminUser,
            target: Some(target.username),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

/// PUT /api/v1/users/:id/password - administrative reset
pub async fn reset_password(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    let service = UserService::new(state.db.clone());
    let target = service.get_row(id).await?;
    service
        .set_password(id, &payload.new_password, state.config.bcrypt_cost)
        .await?;
    state.tokens.revoke_all_for_user(id);

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::PasswordChange,
            category: AuditCategory::AdminUser,
            target: Some(target.username),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "reset": true })))
}

/// GET /api/v1/users/roles
pub async fn list_roles(State(state): State<SharedState>) -> Result<Json<Vec<Role>>> {
    let roles = UserService::new(state.db.clone()).list_roles().await?;
    Ok(Json(roles))
}

#[derive(Debug, Deserialize)]
pub struct GrantRoleRequest {
    pub role: String,
}

/// POST /api/v1/users/:id/roles
pub async fn grant_role(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GrantRoleRequest>,
) -> Result<Json<AdminUserWithRoles>> {
    require_admin(&auth)?;
    let service = UserService::new(state.db.clone());
    service.grant_role(id, &payload.role).await?;
    let user = service.get(id).await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::RoleGrant,
            category: AuditCategory::AdminUser,
            target: Some(user.user.username.clone()),
            detail: Some(serde_json::json!({ "role": payload.role })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(user))
}

/// DELETE /api/v1/users/:id/roles/:role
pub async fn revoke_role(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path((id, role)): Path<(Uuid, String)>,
) -> Result<Json<AdminUserWithRoles>> {
    require_admin(&auth)?;
    let service = UserService::new(state.db.clone());
    service.revoke_role(id, &role).await?;
    let user = service.get(id).await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::RoleRevoke,
            category: AuditCategory::AdminUser,
            target: Some(user.user.username.clone()),
            detail: Some(serde_json::json!({ "role": role })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(user))
}
