//! CoA queue and policy template handlers.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::handlers::{clamp_paging, Page};
use crate::api::middleware::auth::{require_admin, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::audit_log::{AuditAction, AuditCategory, NewAuditLog};
use crate::models::coa::{ApplyTarget, CoaRequest, CoaStatus, PolicyTemplate};
use crate::services::audit_service::AuditService;
use crate::services::coa_service::{
    ApplyResult, CoaService, CreateCoaRequest, PolicyTemplateRequest,
};

/// Routes nested under /api/v1/radius/coa.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route("/:id", get(get_request))
        .route("/:id/cancel", post(cancel_request))
        .route("/:id/complete", post(complete_request))
}

/// Routes nested under /api/v1/radius/policy-templates.
pub fn templates_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_templates).post(create_template))
        .route(
            "/:id",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/:id/apply", post(apply_template))
}

#[derive(Debug, Deserialize)]
pub struct ListCoaQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
    pub username: Option<String>,
}

/// GET /api/v1/radius/coa
pub async fn list_requests(
    State(state): State<SharedState>,
    Query(query): Query<ListCoaQuery>,
) -> Result<Json<Page<CoaRequest>>> {
    let (page, per_page) = clamp_paging(query.page, query.per_page);
    let service = CoaService::new(state.db.clone());
    let (items, total) = service
        .list(
            query.status.as_deref(),
            query.username.as_deref(),
            page,
            per_page,
        )
        .await?;
    Ok(Json(Page::new(items, page, per_page, total)))
}

/// POST /api/v1/radius/coa
pub async fn create_request(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CreateCoaRequest>,
) -> Result<Json<CoaRequest>> {
    require_admin(&auth)?;
    let request = CoaService::new(state.db.clone())
        .create(payload, &auth.username)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Disconnect,
            category: AuditCategory::Coa,
            target: Some(request.username.clone()),
            detail: Some(serde_json::json!({ "kind": request.kind, "id": request.id })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(request))
}

/// GET /api/v1/radius/coa/:id
pub async fn get_request(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CoaRequest>> {
    let request = CoaService::new(state.db.clone()).get(id).await?;
    Ok(Json(request))
}

/// POST /api/v1/radius/coa/:id/cancel
pub async fn cancel_request(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
) -> Result<Json<CoaRequest>> {
    require_admin(&auth)?;
    let request = CoaService::new(state.db.clone()).cancel(id).await?;
    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub status: CoaStatus,
    pub result: Option<String>,
}

/// POST /api/v1/radius/coa/:id/complete - dispatcher outcome callback
pub async fn complete_request(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteRequest>,
) -> Result<Json<CoaRequest>> {
    require_admin(&auth)?;
    let request = CoaService::new(state.db.clone())
        .complete(id, payload.status, payload.result)
        .await?;
    Ok(Json(request))
}

// ---------------------------------------------------------------------------
// Policy templates
// ---------------------------------------------------------------------------

/// GET /api/v1/radius/policy-templates
pub async fn list_templates(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PolicyTemplate>>> {
    let templates = CoaService::new(state.db.clone()).list_templates().await?;
    Ok(Json(templates))
}

/// POST /api/v1/radius/policy-templates
pub async fn create_template(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<PolicyTemplateRequest>,
) -> Result<Json<PolicyTemplate>> {
    require_admin(&auth)?;
    let template = CoaService::new(state.db.clone())
        .create_template(payload)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Create,
            category: AuditCategory::PolicyTemplate,
            target: Some(template.name.clone()),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(template))
}

/// GET /api/v1/radius/policy-templates/:id
pub async fn get_template(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PolicyTemplate>> {
    let template = CoaService::new(state.db.clone()).get_template(id).await?;
    Ok(Json(template))
}

/// PUT /api/v1/radius/policy-templates/:id
pub async fn update_template(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PolicyTemplateRequest>,
) -> Result<Json<PolicyTemplate>> {
    require_admin(&auth)?;
    let template = CoaService::new(state.db.clone())
        .update_template(id, payload)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Update,
            category: AuditCategory::PolicyTemplate,
            target: Some(template.name.clone()),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(template))
}

/// DELETE /api/v1/radius/policy-templates/:id
pub async fn delete_template(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    CoaService::new(state.db.clone()).delete_template(id).await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Delete,
            category: AuditCategory::PolicyTemplate,
            target: Some(id.to_string()),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub target: ApplyTarget,
    pub name: String,
}

/// POST /api/v1/radius/policy-templates/:id/apply
pub async fn apply_template(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApplyRequest>,
) -> Result<Json<ApplyResult>> {
    require_admin(&auth)?;
    let result = CoaService::new(state.db.clone())
        .apply_template(id, payload.target, &payload.name)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::TemplateApply,
            category: AuditCategory::PolicyTemplate,
            target: Some(payload.name.clone()),
            detail: Some(serde_json::json!({
                "template_id": id,
                "target_kind": payload.target,
                "check_rows": result.check_rows,
                "reply_rows": result.reply_rows,
            })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(result))
}
