//! CoA/Disconnect work queue and policy templates.
//!
//! The console enqueues dynamic-authorization work as rows; an external
//! dispatcher (a radclient wrapper) drains the queue and reports outcomes
//! back. Policy templates bundle attribute sets that can be stamped onto
//! users or groups in one call.

use chrono::Utc;
use serde::Deserialize;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::coa::{ApplyTarget, CoaKind, CoaRequest, CoaStatus, PolicyTemplate};
use crate::models::radius::{AttributeEntry, RadAcct};

const COA_COLUMNS: &str = "id, kind, username, acct_session_id, nas_ip, attributes, status, \
                           requested_by, result, created_at, processed_at";

const TEMPLATE_COLUMNS: &str =
    "id, name, description, check_attributes, reply_attributes, created_at, updated_at";

fn is_duplicate(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Request body for enqueueing a CoA request directly.
#[derive(Debug, Deserialize)]
pub struct CreateCoaRequest {
    pub kind: CoaKind,
    pub username: String,
    pub acct_session_id: Option<String>,
    pub nas_ip: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeEntry>,
}

/// Request body for creating or updating a policy template.
#[derive(Debug, Deserialize)]
pub struct PolicyTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub check_attributes: Vec<AttributeEntry>,
    #[serde(default)]
    pub reply_attributes: Vec<AttributeEntry>,
}

/// Outcome of applying a template.
#[derive(Debug, serde::Serialize)]
pub struct ApplyResult {
    pub target: String,
    pub check_rows: usize,
    pub reply_rows: usize,
}

pub struct CoaService {
    db: MySqlPool,
}

impl CoaService {
    pub fn new(db: MySqlPool) -> Self {
        Self { db }
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    pub async fn list(
        &self,
        status: Option<&str>,
        username: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<CoaRequest>, i64)> {
        if let Some(status) = status {
            status
                .parse::<CoaStatus>()
                .map_err(AppError::Validation)?;
        }
        let offset = ((page.max(1) - 1) * per_page) as i64;

        let requests: Vec<CoaRequest> = sqlx::query_as(&format!(
            r#"
            SELECT {COA_COLUMNS}
            FROM coa_requests
            WHERE (? IS NULL OR status = ?)
              AND (? IS NULL OR username = ?)
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(status)
        .bind(status)
        .bind(username)
        .bind(username)
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM coa_requests
            WHERE (? IS NULL OR status = ?)
              AND (? IS NULL OR username = ?)
            "#,
        )
        .bind(status)
        .bind(status)
        .bind(username)
        .bind(username)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((requests, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<CoaRequest> {
        sqlx::query_as::<_, CoaRequest>(&format!(
            "SELECT {COA_COLUMNS} FROM coa_requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("CoA request not found".to_string()))
    }

    pub async fn create(&self, req: CreateCoaRequest, requested_by: &str) -> Result<CoaRequest> {
        if req.username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        if req.kind == CoaKind::Coa && req.attributes.is_empty() {
            return Err(AppError::Validation(
                "A CoA-Request needs at least one attribute".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let attributes = if req.attributes.is_empty() {
            None
        } else {
            Some(serde_json::to_value(&req.attributes)?)
        };
        sqlx::query(
            r#"
            INSERT INTO coa_requests (id, kind, username, acct_session_id, nas_ip,
                                      attributes, status, requested_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(req.kind.to_string())
        .bind(&req.username)
        .bind(&req.acct_session_id)
        .bind(&req.nas_ip)
        .bind(&attributes)
        .bind(CoaStatus::Pending.to_string())
        .bind(requested_by)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.get(id).await
    }

    /// Enqueue a Disconnect-Request for an active accounting session.
    pub async fn enqueue_disconnect(
        &self,
        session: &RadAcct,
        requested_by: &str,
    ) -> Result<CoaRequest> {
        if !session.is_active() {
            return Err(AppError::Conflict(
                "Session is already closed".to_string(),
            ));
        }
        self.create(
            CreateCoaRequest {
                kind: CoaKind::Disconnect,
                username: session.username.clone(),
                acct_session_id: Some(session.acctsessionid.clone()),
                nas_ip: Some(session.nasipaddress.clone()),
                attributes: Vec::new(),
            },
            requested_by,
        )
        .await
    }

    /// Cancel a queued request. Only `pending` rows can be cancelled.
    pub async fn cancel(&self, id: Uuid) -> Result<CoaRequest> {
        let request = self.get(id).await?;
        let status = request
            .status_enum()
            .ok_or_else(|| AppError::Internal(format!("Unknown CoA status '{}'", request.status)))?;
        if !status.can_cancel() {
            return Err(AppError::Conflict(format!(
                "Cannot cancel a request in state '{status}'"
            )));
        }

        sqlx::query("UPDATE coa_requests SET status = ?, processed_at = ? WHERE id = ? AND status = ?")
            .bind(CoaStatus::Cancelled.to_string())
            .bind(Utc::now())
            .bind(id)
            .bind(CoaStatus::Pending.to_string())
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.get(id).await
    }

    /// Dispatcher callback: advance a request to `sent` or a terminal state.
    pub async fn complete(
        &self,
        id: Uuid,
        outcome: CoaStatus,
        result: Option<String>,
    ) -> Result<CoaRequest> {
        if outcome != CoaStatus::Sent && !outcome.is_terminal_outcome() {
            return Err(AppError::Validation(format!(
                "'{outcome}' is not a reportable outcome"
            )));
        }

        let request = self.get(id).await?;
        let current = request
            .status_enum()
            .ok_or_else(|| AppError::Internal(format!("Unknown CoA status '{}'", request.status)))?;
        let allowed = match outcome {
            CoaStatus::Sent => current == CoaStatus::Pending,
            _ => matches!(current, CoaStatus::Pending | CoaStatus::Sent),
        };
        if !allowed {
            return Err(AppError::Conflict(format!(
                "Cannot move a request from '{current}' to '{outcome}'"
            )));
        }

        sqlx::query("UPDATE coa_requests SET status = ?, result = ?, processed_at = ? WHERE id = ?")
            .bind(outcome.to_string())
            .bind(&result)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.get(id).await
    }

    // -----------------------------------------------------------------------
    // Policy templates
    // -----------------------------------------------------------------------

    pub async fn list_templates(&self) -> Result<Vec<PolicyTemplate>> {
        sqlx::query_as::<_, PolicyTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM policy_templates ORDER BY name"
        ))
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn get_template(&self, id: Uuid) -> Result<PolicyTemplate> {
        sqlx::query_as::<_, PolicyTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM policy_templates WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Policy template not found".to_string()))
    }

    pub async fn create_template(&self, req: PolicyTemplateRequest) -> Result<PolicyTemplate> {
        validate_template(&req)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO policy_templates (id, name, description, check_attributes,
                                          reply_attributes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(serde_json::to_value(&req.check_attributes)?)
        .bind(serde_json::to_value(&req.reply_attributes)?)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if is_duplicate(&e) {
                AppError::Conflict(format!("Template '{}' already exists", req.name))
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        self.get_template(id).await
    }

    pub async fn update_template(
        &self,
        id: Uuid,
        req: PolicyTemplateRequest,
    ) -> Result<PolicyTemplate> {
        validate_template(&req)?;
        let result = sqlx::query(
            r#"
            UPDATE policy_templates
            SET name = ?, description = ?, check_attributes = ?, reply_attributes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&req.name)
        .bind(&req.description)
        .bind(serde_json::to_value(&req.check_attributes)?)
        .bind(serde_json::to_value(&req.reply_attributes)?)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if is_duplicate(&e) {
                AppError::Conflict(format!("Template '{}' already exists", req.name))
            } else {
                AppError::Database(e.to_string())
            }
        })?;
        if result.rows_affected() == 0 {
            // rows_affected is 0 both for missing ids and no-op updates;
            // distinguish by fetching.
            return self.get_template(id).await;
        }
        self.get_template(id).await
    }

    pub async fn delete_template(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM policy_templates WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Policy template not found".to_string()));
        }
        Ok(())
    }

    /// Stamp a template's attribute sets onto a user or group.
    pub async fn apply_template(
        &self,
        id: Uuid,
        target: ApplyTarget,
        name: &str,
    ) -> Result<ApplyResult> {
        if name.is_empty() {
            return Err(AppError::Validation("Target name is required".to_string()));
        }
        let template = self.get_template(id).await?;
        let checks: Vec<AttributeEntry> =
            serde_json::from_value(template.check_attributes.clone())?;
        let replies: Vec<AttributeEntry> =
            serde_json::from_value(template.reply_attributes.clone())?;

        let (check_table, reply_table, key_column) = match target {
            ApplyTarget::User => ("radcheck", "radreply", "username"),
            ApplyTarget::Group => ("radgroupcheck", "radgroupreply", "groupname"),
        };

        let mut tx = self.db.begin().await?;
        for entry in &checks {
            sqlx::query(&format!(
                "INSERT INTO {check_table} ({key_column}, attribute, op, value) VALUES (?, ?, ?, ?)"
            ))
            .bind(name)
            .bind(&entry.attribute)
            .bind(&entry.op)
            .bind(&entry.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }
        for entry in &replies {
            sqlx::query(&format!(
                "INSERT INTO {reply_table} ({key_column}, attribute, op, value) VALUES (?, ?, ?, ?)"
            ))
            .bind(name)
            .bind(&entry.attribute)
            .bind(&entry.op)
            .bind(&entry.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }
        tx.commit().await?;

        Ok(ApplyResult {
            target: name.to_string(),
            check_rows: checks.len(),
            reply_rows: replies.len(),
        })
    }
}

fn validate_template(req: &PolicyTemplateRequest) -> Result<()> {
    if req.name.is_empty() || req.name.len() > 64 {
        return Err(AppError::Validation(
            "Template name must be 1-64 characters".to_string(),
        ));
    }
    if req.check_attributes.is_empty() && req.reply_attributes.is_empty() {
        return Err(AppError::Validation(
            "A template needs at least one attribute".to_string(),
        ));
    }
    for entry in req.check_attributes.iter().chain(&req.reply_attributes) {
        crate::api::validation::validate_attribute_name(&entry.attribute)?;
        crate::api::validation::validate_op(&entry.op)?;
        crate::api::validation::validate_attribute_value(&entry.value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(attribute: &str) -> AttributeEntry {
        AttributeEntry {
            attribute: attribute.to_string(),
            op: ":=".to_string(),
            value: "x".to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Template validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_template_requires_name_and_attributes() {
        let req = PolicyTemplateRequest {
            name: String::new(),
            description: None,
            check_attributes: vec![entry("Session-Timeout")],
            reply_attributes: vec![],
        };
        assert!(validate_template(&req).is_err());

        let req = PolicyTemplateRequest {
            name: "guest".to_string(),
            description: None,
            check_attributes: vec![],
            reply_attributes: vec![],
        };
        assert!(validate_template(&req).is_err());
    }

    #[test]
    fn test_template_validates_entries() {
        let mut bad = entry("Session-Timeout");
        bad.op = "bogus".to_string();
        let req = PolicyTemplateRequest {
            name: "guest".to_string(),
            description: None,
            check_attributes: vec![bad],
            reply_attributes: vec![],
        };
        assert!(validate_template(&req).is_err());
    }

    #[test]
    fn test_template_accepts_reply_only() {
        let req = PolicyTemplateRequest {
            name: "bandwidth-cap".to_string(),
            description: Some("128k up/down".to_string()),
            check_attributes: vec![],
            reply_attributes: vec![entry("Mikrotik-Rate-Limit")],
        };
        assert!(validate_template(&req).is_ok());
    }

    // -----------------------------------------------------------------------
    // CoA request body
    // -----------------------------------------------------------------------

    #[test]
    fn test_create_coa_request_deserializes() {
        let req: CreateCoaRequest = serde_json::from_str(
            r#"{"kind": "disconnect", "username": "alice", "nas_ip": "10.0.0.1"}"#,
        )
        .unwrap();
        assert_eq!(req.kind, CoaKind::Disconnect);
        assert!(req.attributes.is_empty());
        assert!(req.acct_session_id.is_none());
    }
}
