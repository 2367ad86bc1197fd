//! Accounting session and authentication log handlers.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::handlers::{clamp_paging, parse_naive, Page};
use crate::api::middleware::auth::{require_admin, AuthExtension};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::audit_log::{AuditAction, AuditCategory, NewAuditLog};
use crate::models::coa::CoaRequest;
use crate::models::radius::{RadAcct, RadPostAuth};
use crate::services::audit_service::AuditService;
use crate::services::coa_service::CoaService;
use crate::services::session_service::{AuthLogFilter, SessionFilter, SessionService};

/// Routes nested under /api/v1/radius/sessions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_sessions))
        .route("/active", get(list_active))
        .route("/close-stale", post(close_stale))
        .route("/:radacctid", get(get_session))
        .route("/:radacctid/disconnect", post(disconnect))
}

/// Routes nested under /api/v1/radius/auth-log.
pub fn auth_log_router() -> Router<SharedState> {
    Router::new().route("/", get(auth_log))
}

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub username: Option<String>,
    pub groupname: Option<String>,
    pub nas_ip: Option<String>,
    #[serde(default)]
    pub active_only: bool,
    pub started_after: Option<String>,
    pub started_before: Option<String>,
}

impl SessionsQuery {
    fn to_filter(&self) -> Result<SessionFilter> {
        let started_after = self
            .started_after
            .as_deref()
            .map(|s| {
                parse_naive(s)
                    .ok_or_else(|| AppError::Validation(format!("Invalid started_after '{s}'")))
            })
            .transpose()?;
        let started_before = self
            .started_before
            .as_deref()
            .map(|s| {
                parse_naive(s)
                    .ok_or_else(|| AppError::Validation(format!("Invalid started_before '{s}'")))
            })
            .transpose()?;
        Ok(SessionFilter {
            username: self.username.clone(),
            groupname: self.groupname.clone(),
            nas_ip: self.nas_ip.clone(),
            active_only: self.active_only,
            started_after,
            started_before,
        })
    }
}

/// GET /api/v1/radius/sessions
pub async fn list_sessions(
    State(state): State<SharedState>,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<Page<RadAcct>>> {
    let (page, per_page) = clamp_paging(query.page, query.per_page);
    let filter = query.to_filter()?;
    let service = SessionService::new(state.db.clone());
    let (items, total) = service.list(&filter, page, per_page).await?;
    Ok(Json(Page::new(items, page, per_page, total)))
}

/// GET /api/v1/radius/sessions/active
pub async fn list_active(
    State(state): State<SharedState>,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<Page<RadAcct>>> {
    let (page, per_page) = clamp_paging(query.page, query.per_page);
    let mut filter = query.to_filter()?;
    filter.active_only = true;
    let service = SessionService::new(state.db.clone());
    let (items, total) = service.list(&filter, page, per_page).await?;
    Ok(Json(Page::new(items, page, per_page, total)))
}

/// GET /api/v1/radius/sessions/:radacctid
pub async fn get_session(
    State(state): State<SharedState>,
    Path(radacctid): Path<i64>,
) -> Result<Json<RadAcct>> {
    let session = SessionService::new(state.db.clone()).get(radacctid).await?;
    Ok(Json(session))
}

/// POST /api/v1/radius/sessions/:radacctid/disconnect - enqueue a
/// Disconnect-Request for an active session
pub async fn disconnect(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(radacctid): Path<i64>,
) -> Result<Json<CoaRequest>> {
    require_admin(&auth)?;
    let session = SessionService::new(state.db.clone()).get(radacctid).await?;
    let request = CoaService::new(state.db.clone())
        .enqueue_disconnect(&session, &auth.username)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Disconnect,
            category: AuditCategory::Session,
            target: Some(session.username.clone()),
            detail: Some(serde_json::json!({
                "radacctid": radacctid,
                "acctsessionid": session.acctsessionid,
                "coa_request_id": request.id,
            })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
pub struct CloseStaleRequest {
    pub hours: i64,
}

/// POST /api/v1/radius/sessions/close-stale
pub async fn close_stale(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CloseStaleRequest>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    let closed = SessionService::new(state.db.clone())
        .close_stale(payload.hours)
        .await?;

    AuditService::new(state.db.clone())
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::SessionClose,
            category: AuditCategory::Session,
            target: None,
            detail: Some(serde_json::json!({ "closed": closed, "stale_hours": payload.hours })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "closed": closed })))
}

#[derive(Debug, Deserialize)]
pub struct AuthLogQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub username: Option<String>,
    /// `Access-Accept` or `Access-Reject`
    pub reply: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// GET /api/v1/radius/auth-log
pub async fn auth_log(
    State(state): State<SharedState>,
    Query(query): Query<AuthLogQuery>,
) -> Result<Json<Page<RadPostAuth>>> {
    let (page, per_page) = clamp_paging(query.page, query.per_page);
    let from = query
        .from
        .as_deref()
        .map(|s| parse_naive(s).ok_or_else(|| AppError::Validation(format!("Invalid from '{s}'"))))
        .transpose()?;
    let to = query
        .to
        .as_deref()
        .map(|s| parse_naive(s).ok_or_else(|| AppError::Validation(format!("Invalid to '{s}'"))))
        .transpose()?;

    let filter = AuthLogFilter {
        username: query.username.clone(),
        reply: query.reply.clone(),
        from,
        to,
    };
    let service = SessionService::new(state.db.clone());
    let (items, total) = service.auth_log(&filter, page, per_page).await?;
    Ok(Json(Page::new(items, page, per_page, total)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_query_rejects_bad_dates() {
        let query = SessionsQuery {
            page: None,
            per_page: None,
            username: None,
            groupname: None,
            nas_ip: None,
            active_only: false,
            started_after: Some("last tuesday".to_string()),
            started_before: None,
        };
        assert!(query.to_filter().is_err());
    }

    #[test]
    fn test_sessions_query_parses_dates() {
        let query = SessionsQuery {
            page: None,
            per_page: None,
            username: Some("alice".to_string()),
            groupname: None,
            nas_ip: None,
            active_only: true,
            started_after: Some("2026-02-01".to_string()),
            started_before: Some("2026-02-02T08:30:00".to_string()),
        };
        let filter = query.to_filter().unwrap();
        assert!(filter.active_only);
        assert!(filter.started_after.is_some());
        assert!(filter.started_before.is_some());
        assert_eq!(filter.username.as_deref(), Some("alice"));
    }
}
