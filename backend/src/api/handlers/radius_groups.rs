//! RADIUS group management: group attributes and membership.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::handlers::{clamp_paging, Page};
use crate::api::middleware::auth::{require_admin, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::audit_log::{AuditAction, AuditCategory, NewAuditLog};
use crate::models::radius::{AttributeEntry, RadUserGroup};
use crate::services::audit_service::AuditService;
use crate::services::radius_service::{
    AttrKind, CreateRadiusGroupRequest, RadiusGroupDetail, RadiusGroupSummary, RadiusService,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_groups).post(create_group))
        .route("/:groupname", get(get_group).delete(delete_group))
        .route("/:groupname/members", get(list_members))
        .route("/:groupname/attributes", post(add_attribute))
        .route(
            "/:groupname/attributes/:kind/:id",
            axum::routing::patch(update_attribute).delete(delete_attribute),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

/// GET /api/v1/radius/groups
pub async fn list_groups(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<RadiusGroupSummary>>> {
    let (page, per_page) = clamp_paging(query.page, query.per_page);
    let service = RadiusService::new(state.db.clone());
    let (items, total) = service
        .list_groups(page, per_page, query.search.as_deref())
        .await?;
    Ok(Json(Page::new(items, page, per_page, total)))
}

/// POST /api/v1/radius/groups
pub async fn create_group(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CreateRadiusGroupRequest>,
) -> Result<Json<RadiusGroupDetail>> {
    require_admin(&auth)?;
    let created = RadiusService::new(state.db.clone())
        .create_group(payload)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Create,
            category: AuditCategory::RadiusGroup,
            target: Some(created.groupname.clone()),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(created))
}

/// GET /api/v1/radius/groups/:groupname
pub async fn get_group(
    State(state): State<SharedState>,
    Path(groupname): Path<String>,
) -> Result<Json<RadiusGroupDetail>> {
    let group = RadiusService::new(state.db.clone())
        .get_group(&groupname)
        .await?;
    Ok(Json(group))
}

#[derive(Debug, Deserialize)]
pub struct DeleteGroupQuery {
    #[serde(default)]
    pub force: bool,
}

/// DELETE /api/v1/radius/groups/:groupname
pub async fn delete_group(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(groupname): Path<String>,
    Query(query): Query<DeleteGroupQuery>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    let removed = RadiusService::new(state.db.clone())
        .delete_group(&groupname, query.force)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Delete,
            category: AuditCategory::RadiusGroup,
            target: Some(groupname),
            detail: Some(serde_json::json!({ "rows_removed": removed, "forced": query.force })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "deleted": true, "rows_removed": removed })))
}

#[derive(Debug, Deserialize)]
pub struct MembersQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/radius/groups/:groupname/members
pub async fn list_members(
    State(state): State<SharedState>,
    Path(groupname): Path<String>,
    Query(query): Query<MembersQuery>,
) -> Result<Json<Vec<RadUserGroup>>> {
    let members = RadiusService::new(state.db.clone())
        .group_members(&groupname, query.limit.unwrap_or(200))
        .await?;
    Ok(Json(members))
}

#[derive(Debug, Deserialize)]
pub struct AddAttributeRequest {
    pub kind: AttrKind,
    #[serde(flatten)]
    pub entry: AttributeEntry,
}

/// POST /api/v1/radius/groups/:groupname/attributes
pub async fn add_attribute(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(groupname): Path<String>,
    Json(payload): Json<AddAttributeRequest>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    let id = RadiusService::new(state.db.clone())
        .add_group_attribute(&groupname, payload.kind, &payload.entry)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Create,
            category: AuditCategory::RadiusGroup,
            target: Some(groupname),
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

/// PATCH /api/v1/radius/groups/:groupname/attributes/:kind/:id
pub async fn update_attribute(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path((groupname, kind, id)): Path<(String, AttrKind, u32)>,
    Json(payload): Json<UpdateAttributeRequest>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    RadiusService::new(state.db.clone())
        .update_group_attribute(kind, id, &payload.op, &payload.value)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Update,
            category: AuditCategory::RadiusGroup,
            target: Some(groupname),
            detail: Some(serde_json::json!({ "attribute_id": id })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "updated": true })))
}

/// DELETE /api/v1/radius/groups/:groupname/attributes/:kind/:id
pub async fn delete_attribute(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path((groupname, kind, id)): Path<(String, AttrKind, u32)>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    RadiusService::new(state.db.clone())
        .delete_group_attribute(kind, id)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Delete,
            category: AuditCategory::RadiusGroup,
            target: Some(groupname),
            detail: Some(serde_json::json!({ "attribute_id": id })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
