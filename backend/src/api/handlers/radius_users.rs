//! RADIUS user management: check/reply attributes and group membership.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::handlers::{clamp_paging, Page};
use crate::api::middleware::auth::{require_admin, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::audit_log::{AuditAction, AuditCategory, NewAuditLog};
use crate::models::radius::AttributeEntry;
use crate::services::audit_service::AuditService;
use crate::services::radius_service::{
    AttrKind, CreateRadiusUserRequest, RadiusService, RadiusUserDetail, RadiusUserSummary,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:username", get(get_user).delete(delete_user))
        .route("/:username/password", put(set_password))
        .route("/:username/attributes", post(add_attribute))
        .route(
            "/:username/attributes/:kind/:id",
            axum::routing::patch(update_attribute).delete(delete_attribute),
        )
        .route("/:username/groups", post(add_group))
        .route(
            "/:username/groups/:groupname",
            axum::routing::patch(set_group_priority).delete(remove_group),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

/// GET /api/v1/radius/users
pub async fn list_users(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<RadiusUserSummary>>> {
    let (page, per_page) = clamp_paging(query.page, query.per_page);
    let service = RadiusService::new(state.db.clone());
    let (items, total) = service
        .list_users(page, per_page, query.search.as_deref())
        .await?;
    Ok(Json(Page::new(items, page, per_page, total)))
}

/// POST /api/v1/radius/users
pub async fn create_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CreateRadiusUserRequest>,
) -> Result<Json<RadiusUserDetail>> {
    require_admin(&auth)?;
    let service = RadiusService::new(state.db.clone());
    let created = service.create_user(payload).await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Create,
            category: AuditCategory::RadiusUser,
            target: Some(created.username.clone()),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(created))
}

/// GET /api/v1/radius/users/:username
pub async fn get_user(
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<RadiusUserDetail>> {
    let user = RadiusService::new(state.db.clone()).get_user(&username).await?;
    Ok(Json(user))
}

/// DELETE /api/v1/radius/users/:username
pub async fn delete_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    let removed = RadiusService::new(state.db.clone())
        .delete_user(&username)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Delete,
            category: AuditCategory::RadiusUser,
            target: Some(username),
            detail: Some(serde_json::json!({ "rows_removed": removed })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "deleted": true, "rows_removed": removed })))
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub password: String,
    pub password_attribute: Option<String>,
}

/// PUT /api/v1/radius/users/:username/password
pub async fn set_password(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(username): Path<String>,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    RadiusService::new(state.db.clone())
        .set_user_password(
            &username,
            &payload.password,
            payload.password_attribute.as_deref(),
        )
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::PasswordChange,
            category: AuditCategory::RadiusUser,
            target: Some(username),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "changed": true })))
}

#[derive(Debug, Deserialize)]
pub struct AddAttributeRequest {
    pub kind: AttrKind,
    #[serde(flatten)]
    pub entry: AttributeEntry,
}

/// POST /api/v1/radius/users/:username/attributes
pub async fn add_attribute(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(username): Path<String>,
    Json(payload): Json<AddAttributeRequest>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    let id = RadiusService::new(state.db.clone())
        .add_user_attribute(&username, payload.kind, &payload.entry)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Create,
            category: AuditCategory::RadiusUser,
            target: Some(username),
            detail: Some(serde_json::json!({
                "attribute": payload.entry.attribute,
                "kind": payload.kind,
            })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "id": id })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAttributeRequest {
    pub op: String,
    pub value: String,
}

/// PATCH /api/v1/radius/users/:username/attributes/:kind/:id
pub async fn update_attribute(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path((username, kind, id)): Path<(String, AttrKind, u32)>,
    Json(payload): Json<UpdateAttributeRequest>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    RadiusService::new(state.db.clone())
        .update_user_attribute(kind, id, &payload.op, &payload.value)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Update,
            category: AuditCategory::RadiusUser,
            target: Some(username),
            detail: Some(serde_json::json!({ "attribute_id": id })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "updated": true })))
}

/// DELETE /api/v1/radius/users/:username/attributes/:kind/:id
pub async fn delete_attribute(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path((username, kind, id)): Path<(String, AttrKind, u32)>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    RadiusService::new(state.db.clone())
        .delete_user_attribute(kind, id)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Delete,
            category: AuditCategory::RadiusUser,
            target: Some(username),
            detail: Some(serde_json::json!({ "attribute_id": id })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct AddGroupRequest {
    pub groupname: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    1
}

/// POST /api/v1/radius/users/:username/groups
pub async fn add_group(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(username): Path<String>,
    Json(payload): Json<AddGroupRequest>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    let membership = RadiusService::new(state.db.clone())
        .add_membership(&username, &payload.groupname, payload.priority)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Update,
            category: AuditCategory::RadiusUser,
            target: Some(username),
            detail: Some(serde_json::json!({ "group_added": payload.groupname })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::to_value(membership)?))
}

#[derive(Debug, Deserialize)]
pub struct SetPriorityRequest {
    pub priority: i32,
}

/// PATCH /api/v1/radius/users/:username/groups/:groupname
pub async fn set_group_priority(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path((username, groupname)): Path<(String, String)>,
    Json(payload): Json<SetPriorityRequest>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    RadiusService::new(state.db.clone())
        .set_membership_priority(&username, &groupname, payload.priority)
        .await?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

/// DELETE /api/v1/radius/users/:username/groups/:groupname
pub async fn remove_group(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path((username, groupname)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    RadiusService::new(state.db.clone())
        .remove_membership(&username, &groupname)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Update,
            category: AuditCategory::RadiusUser,
            target: Some(username),
            detail: Some(serde_json::json!({ "group_removed": groupname })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "removed": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_attribute_request_flattens_entry() {
        let req: AddAttributeRequest = serde_json::from_str(
            r#"{"kind": "reply", "attribute": "Session-Timeout", "op": ":=", "value": "3600"}"#,
        )
        .unwrap();
        assert_eq!(req.kind, AttrKind::Reply);
        assert_eq!(req.entry.attribute, "Session-Timeout");
    }

    #[test]
    fn test_add_group_request_default_priority() {
        let req: AddGroupRequest = serde_json::from_str(r#"{"groupname": "staff"}"#).unwrap();
        assert_eq!(req.priority, 1);
    }
}
