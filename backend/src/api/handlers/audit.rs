//! Audit log handlers: querying, statistics, export and retention.

use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::handlers::{clamp_paging, parse_utc, Page};
use crate::api::middleware::auth::{require_admin, AuthExtension};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::audit_log::{AuditAction, AuditCategory, AuditLog, NewAuditLog};
use crate::services::audit_service::{AuditFilter, AuditService, AuditStats, ExportFormat};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_entries))
        .route("/stats", get(stats))
        .route("/export", get(export))
        .route("/purge", post(purge))
        .route("/:id", get(get_entry))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub username: Option<String>,
    pub action: Option<String>,
    pub category: Option<String>,
    pub target: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl AuditQuery {
    fn to_filter(&self) -> Result<AuditFilter> {
        if let Some(action) = &self.action {
            action
                .parse::<AuditAction>()
                .map_err(AppError::Validation)?;
        }
        if let Some(category) = &self.category {
            category
                .parse::<AuditCategory>()
                .map_err(AppError::Validation)?;
        }
        let from = self
            .from
            .as_deref()
            .map(|s| parse_utc(s).ok_or_else(|| AppError::Validation(format!("Invalid from '{s}'"))))
            .transpose()?;
        let to = self
            .to
            .as_deref()
            .map(|s| parse_utc(s).ok_or_else(|| AppError::Validation(format!("Invalid to '{s}'"))))
            .transpose()?;

        Ok(AuditFilter {
            username: self.username.clone(),
            action: self.action.clone(),
            category: self.category.clone(),
            target: self.target.clone(),
            from,
            to,
        })
    }
}

/// GET /api/v1/audit-logs
pub async fn list_entries(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Page<AuditLog>>> {
    require_admin(&auth)?;
    let (page, per_page) = clamp_paging(query.page, query.per_page);
    let filter = query.to_filter()?;
    let service = AuditService::new(state.db.clone());
    let (items, total) = service.list(&filter, page, per_page).await?;
    Ok(Json(Page::new(items, page, per_page, total)))
}

/// GET /api/v1/audit-logs/:id
pub async fn get_entry(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditLog>> {
    require_admin(&auth)?;
    let entry = AuditService::new(state.db.clone()).get(id).await?;
    Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<i64>,
}

/// GET /api/v1/audit-logs/stats
pub async fn stats(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<AuditStats>> {
    require_admin(&auth)?;
    let stats = AuditService::new(state.db.clone())
        .stats(query.days.unwrap_or(30))
        .await?;
    Ok(Json(stats))
}

// Not flattened into AuditQuery: serde_urlencoded cannot deserialize
// flattened structs with typed fields, so the filter fields are repeated.
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
    pub username: Option<String>,
    pub action: Option<String>,
    pub category: Option<String>,
    pub target: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ExportQuery {
    fn to_filter(&self) -> Result<AuditFilter> {
        AuditQuery {
            page: None,
            per_page: None,
            username: self.username.clone(),
            action: self.action.clone(),
            category: self.category.clone(),
            target: self.target.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
        }
        .to_filter()
    }
}

/// GET /api/v1/audit-logs/export - download matching entries as a file
pub async fn export(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    require_admin(&auth)?;
    let format = query
        .format
        .as_deref()
        .unwrap_or("csv")
        .parse::<ExportFormat>()
        .map_err(AppError::Validation)?;
    let filter = query.to_filter()?;

    let service = AuditService::new(state.db.clone());
    let result = service
        .export(&filter, format, state.config.export_max_rows)
        .await?;

    service
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Export,
            category: AuditCategory::Audit,
            target: None,
            detail: Some(serde_json::json!({
                "format": format.file_extension(),
                "rows": result.rows,
                "truncated": result.truncated,
            })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    let filename = format!(
        "audit-logs-{}.{}",
        Utc::now().format("%Y%m%d-%H%M%S"),
        format.file_extension()
    );
    let response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (
                header::HeaderName::from_static("x-export-truncated"),
                result.truncated.to_string(),
            ),
        ],
        result.body,
    );
    Ok(response.into_response())
}

#[derive(Debug, Deserialize)]
pub struct PurgeRequest {
    pub older_than_days: i64,
}

/// POST /api/v1/audit-logs/purge
pub async fn purge(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<PurgeRequest>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&auth)?;
    let service = AuditService::new(state.db.clone());
    let removed = service.purge(payload.older_than_days).await?;

    service
        .record_best_effort(NewAuditLog {
            username: auth.username.clone(),
            action: AuditAction::Purge,
            category: AuditCategory::Audit,
            target: None,
            detail: Some(serde_json::json!({
                "removed": removed,
                "older_than_days": payload.older_than_days,
            })),
            ip_address: None,
            user_agent: None,
        })
        .await;

    Ok(Json(serde_json::json!({ "removed": removed })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(action: Option<&str>, from: Option<&str>) -> AuditQuery {
        AuditQuery {
            page: None,
            per_page: None,
            username: None,
            action: action.map(str::to_string),
            category: None,
            target: None,
            from: from.map(str::to_string),
            to: None,
        }
    }

    #[test]
    fn test_filter_rejects_unknown_action() {
        assert!(query(Some("defragment"), None).to_filter().is_err());
    }

    #[test]
    fn test_filter_accepts_known_action() {
        let filter = query(Some("login_failed"), None).to_filter().unwrap();
        assert_eq!(filter.action.as_deref(), Some("login_failed"));
    }

    #[test]
    fn test_filter_rejects_bad_dates() {
        assert!(query(None, Some("not-a-date")).to_filter().is_err());
    }

    #[test]
    fn test_filter_parses_bare_date() {
        let filter = query(None, Some("2026-01-15")).to_filter().unwrap();
        assert!(filter.from.is_some());
    }
}
