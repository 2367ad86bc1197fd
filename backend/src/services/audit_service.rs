//! Audit trail: recording, querying, statistics, export and retention.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::audit_log::{AuditLog, NewAuditLog};

/// Filters shared by the list, stats and export endpoints.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub username: Option<String>,
    pub action: Option<String>,
    pub category: Option<String>,
    pub target: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    /// Build the WHERE clause and the bind order for this filter.
    fn where_clause(&self) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();

        if let Some(username) = &self.username {
            conditions.push("username = ?");
            binds.push(username.clone());
        }
        if let Some(action) = &self.action {
            conditions.push("action = ?");
            binds.push(action.clone());
        }
        if let Some(category) = &self.category {
            conditions.push("category = ?");
            binds.push(category.clone());
        }
        if let Some(target) = &self.target {
            conditions.push("target = ?");
            binds.push(target.clone());
        }
        // Bound as "YYYY-MM-DD hh:mm:ss" literals, which every MySQL
        // version parses for TIMESTAMP comparison.
        if let Some(from) = &self.from {
            conditions.push("created_at >= ?");
            binds.push(from.format("%Y-%m-%d %H:%M:%S").to_string());
        }
        if let Some(to) = &self.to {
            conditions.push("created_at <= ?");
            binds.push(to.format("%Y-%m-%d %H:%M:%S").to_string());
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (clause, binds)
    }
}

/// Count of one grouped dimension (action, category or day).
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AuditCount {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AuditDayCount {
    pub day: NaiveDate,
    pub count: i64,
}

/// Aggregated audit statistics.
#[derive(Debug, Serialize)]
pub struct AuditStats {
    pub total: i64,
    pub by_action: Vec<AuditCount>,
    pub by_category: Vec<AuditCount>,
    pub by_day: Vec<AuditDayCount>,
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Xml,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Xml => "application/xml",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xml => "xml",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "xml" => Ok(ExportFormat::Xml),
            _ => Err(format!("Unsupported export format: {s}")),
        }
    }
}

/// A rendered export: body plus a flag for the row cap having been hit.
#[derive(Debug)]
pub struct ExportResult {
    pub body: String,
    pub truncated: bool,
    pub rows: usize,
}

const AUDIT_COLUMNS: &str =
    "id, username, action, category, target, detail, ip_address, user_agent, created_at";

pub struct AuditService {
    db: MySqlPool,
}

impl AuditService {
    pub fn new(db: MySqlPool) -> Self {
        Self { db }
    }

    /// Append one audit entry.
    pub async fn record(&self, entry: NewAuditLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, username, action, category, target, detail,
                                    ip_address, user_agent, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.username)
        .bind(entry.action.to_string())
        .bind(entry.category.to_string())
        .bind(&entry.target)
        .bind(&entry.detail)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Append one audit entry; a write failure is logged, never propagated.
    /// Audit must not take the audited operation down with it.
    pub async fn record_best_effort(&self, entry: NewAuditLog) {
        let action = entry.action;
        if let Err(e) = self.record(entry).await {
            tracing::warn!(error = %e, action = %action, "Failed to write audit entry");
        }
    }

    /// List entries matching the filter, newest first.
    pub async fn list(
        &self,
        filter: &AuditFilter,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<AuditLog>, i64)> {
        let (clause, binds) = filter.where_clause();
        let offset = ((page.max(1) - 1) * per_page) as i64;

        let query = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs {clause} ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );
        let mut q = sqlx::query_as::<_, AuditLog>(&query);
        for bind in &binds {
            q = q.bind(bind);
        }
        let entries = q
            .bind(per_page as i64)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let count_query = format!("SELECT COUNT(*) FROM audit_logs {clause}");
        let mut cq = sqlx::query_scalar::<_, i64>(&count_query);
        for bind in &binds {
            cq = cq.bind(bind);
        }
        let total = cq
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((entries, total))
    }

    /// Fetch one entry.
    pub async fn get(&self, id: Uuid) -> Result<AuditLog> {
        sqlx::query_as::<_, AuditLog>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Audit entry not found".to_string()))
    }

    /// Aggregate counts by action, category and day over the last `days`.
    pub async fn stats(&self, days: i64) -> Result<AuditStats> {
        let days = days.clamp(1, 365);
        let since = Utc::now() - chrono::Duration::days(days);

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs WHERE created_at >= ?")
                .bind(since)
                .fetch_one(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        let by_action: Vec<AuditCount> = sqlx::query_as(
            r#"
            SELECT action AS `key`, COUNT(*) AS count
            FROM audit_logs
            WHERE created_at >= ?
            GROUP BY action
            ORDER BY count DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let by_category: Vec<AuditCount> = sqlx::query_as(
            r#"
            SELECT category AS `key`, COUNT(*) AS count
            FROM audit_logs
            WHERE created_at >= ?
            GROUP BY category
            ORDER BY count DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let by_day: Vec<AuditDayCount> = sqlx::query_as(
            r#"
            SELECT DATE(created_at) AS day, COUNT(*) AS count
            FROM audit_logs
            WHERE created_at >= ?
            GROUP BY DATE(created_at)
            ORDER BY day
            "#,
        )
        .bind(since)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(AuditStats {
            total,
            by_action,
            by_category,
            by_day,
        })
    }

    /// Render matching entries in the requested format, capped at `max_rows`.
    pub async fn export(
        &self,
        filter: &AuditFilter,
        format: ExportFormat,
        max_rows: i64,
    ) -> Result<ExportResult> {
        let (clause, binds) = filter.where_clause();

        // Fetch one row past the cap to detect truncation.
        let query = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs {clause} ORDER BY created_at DESC LIMIT ?"
        );
        let mut q = sqlx::query_as::<_, AuditLog>(&query);
        for bind in &binds {
            q = q.bind(bind);
        }
        let mut entries = q
            .bind(max_rows + 1)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let truncated = entries.len() as i64 > max_rows;
        entries.truncate(max_rows as usize);
        let rows = entries.len();

        let body = match format {
            ExportFormat::Csv => render_csv(&entries),
            ExportFormat::Json => serde_json::to_string_pretty(&entries)?,
            ExportFormat::Xml => render_xml(&entries)?,
        };

        Ok(ExportResult {
            body,
            truncated,
            rows,
        })
    }

    /// Delete entries older than `days`. Returns the number removed.
    pub async fn purge(&self, days: i64) -> Result<u64> {
        if days <= 0 {
            return Err(AppError::Validation(
                "Retention window must be positive".to_string(),
            ));
        }
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let result = sqlx::query("DELETE FROM audit_logs WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

/// Escape one CSV field per RFC 4180: quote when the value contains a comma,
/// quote or line break, doubling embedded quotes.
fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn render_csv(entries: &[AuditLog]) -> String {
    let mut out = String::from(
        "id,username,action,category,target,detail,ip_address,user_agent,created_at\n",
    );
    for entry in entries {
        let detail = entry
            .detail
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();
        let fields = [
            entry.id.to_string(),
            entry.username.clone(),
            entry.action.clone(),
            entry.category.clone(),
            entry.target.clone().unwrap_or_default(),
            detail,
            entry.ip_address.clone().unwrap_or_default(),
            entry.user_agent.clone().unwrap_or_default(),
            entry.created_at.to_rfc3339(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Flattened entry shape for the XML serializer: optionals become empty
/// elements, detail is embedded as its JSON text.
#[derive(Serialize)]
#[serde(rename = "entry")]
struct XmlEntry {
    id: String,
    username: String,
    action: String,
    category: String,
    target: String,
    detail: String,
    ip_address: String,
    user_agent: String,
    created_at: String,
}

#[derive(Serialize)]
#[serde(rename = "audit_logs")]
struct XmlExport {
    entry: Vec<XmlEntry>,
}

fn render_xml(entries: &[AuditLog]) -> Result<String> {
    let export = XmlExport {
        entry: entries
            .iter()
            .map(|e| XmlEntry {
                id: e.id.to_string(),
                username: e.username.clone(),
                action: e.action.clone(),
                category: e.category.clone(),
                target: e.target.clone().unwrap_or_default(),
                detail: e.detail.as_ref().map(|d| d.to_string()).unwrap_or_default(),
                ip_address: e.ip_address.clone().unwrap_or_default(),
                user_agent: e.user_agent.clone().unwrap_or_default(),
                created_at: e.created_at.to_rfc3339(),
            })
            .collect(),
    };
    quick_xml::se::to_string(&export).map_err(|e| AppError::Export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(username: &str, action: &str) -> AuditLog {
        AuditLog {
            id: Uuid::nil(),
            username: username.to_string(),
            action: action.to_string(),
            category: "radius_user".to_string(),
            target: Some("alice".to_string()),
            detail: Some(serde_json::json!({"attribute": "Session-Timeout"})),
            ip_address: Some("198.51.100.7".to_string()),
            user_agent: Some("curl/8.5".to_string()),
            created_at: DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    // -----------------------------------------------------------------------
    // CSV escaping
    // -----------------------------------------------------------------------

    #[test]
    fn test_csv_escape_plain() {
        assert_eq!(csv_escape("alice"), "alice");
    }

    #[test]
    fn test_csv_escape_comma() {
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
    }

    #[test]
    fn test_csv_escape_quotes() {
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_escape_newline() {
        assert_eq!(csv_escape("line1\nline2"), "\"line1\nline2\"");
    }

    #[test]
    fn test_render_csv_header_and_rows() {
        let csv = render_csv(&[sample_entry("alice", "create")]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,username,action,category,target,detail,ip_address,user_agent,created_at"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("alice"));
        assert!(row.contains("create"));
        // detail JSON contains commas and quotes, so it must be quoted
        assert!(row.contains("\"{\"\"attribute\"\":\"\"Session-Timeout\"\"}\""));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_render_csv_empty() {
        let csv = render_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
    }

    // -----------------------------------------------------------------------
    // XML rendering
    // -----------------------------------------------------------------------

    #[test]
    fn test_render_xml_structure() {
        let xml = render_xml(&[sample_entry("alice", "create")]).unwrap();
        assert!(xml.starts_with("<audit_logs>"));
        assert!(xml.ends_with("</audit_logs>"));
        assert!(xml.contains("<entry>"));
        assert!(xml.contains("<username>alice</username>"));
        assert!(xml.contains("<action>create</action>"));
    }

    #[test]
    fn test_render_xml_escapes_markup() {
        let mut entry = sample_entry("alice", "create");
        entry.user_agent = Some("<script>alert(1)</script>".to_string());
        let xml = render_xml(&[entry]).unwrap();
        assert!(!xml.contains("<script>"));
        assert!(xml.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_render_xml_empty_optional_fields() {
        let mut entry = sample_entry("alice", "create");
        entry.target = None;
        entry.detail = None;
        let xml = render_xml(&[entry]).unwrap();
        // Empty elements may serialize collapsed or paired.
        assert!(xml.contains("<target/>") || xml.contains("<target></target>"));
    }

    // -----------------------------------------------------------------------
    // Export format plumbing
    // -----------------------------------------------------------------------

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("xml".parse::<ExportFormat>().unwrap(), ExportFormat::Xml);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_export_format_content_types() {
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv; charset=utf-8");
        assert_eq!(ExportFormat::Json.content_type(), "application/json");
        assert_eq!(ExportFormat::Xml.content_type(), "application/xml");
        assert_eq!(ExportFormat::Csv.file_extension(), "csv");
    }

    // -----------------------------------------------------------------------
    // Filter clause assembly
    // -----------------------------------------------------------------------

    #[test]
    fn test_empty_filter_has_no_where() {
        let (clause, binds) = AuditFilter::default().where_clause();
        assert!(clause.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn test_filter_clause_orders_binds() {
        let filter = AuditFilter {
            username: Some("alice".to_string()),
            category: Some("auth".to_string()),
            ..Default::default()
        };
        let (clause, binds) = filter.where_clause();
        assert_eq!(clause, "WHERE username = ? AND category = ?");
        assert_eq!(binds, vec!["alice".to_string(), "auth".to_string()]);
    }

    #[test]
    fn test_filter_clause_with_dates() {
        let from = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let filter = AuditFilter {
            from: Some(from),
            ..Default::default()
        };
        let (clause, binds) = filter.where_clause();
        assert_eq!(clause, "WHERE created_at >= ?");
        assert_eq!(binds.len(), 1);
        assert!(binds[0].starts_with("2026-01-01"));
    }
}
