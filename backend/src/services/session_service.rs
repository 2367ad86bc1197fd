//! Accounting session and authentication log queries.
//!
//! `radacct` and `radpostauth` are written by FreeRADIUS; the console only
//! reads them, with one exception: administrative closure of sessions whose
//! NAS died without sending Accounting-Stop.

use chrono::NaiveDateTime;
use sqlx::MySqlPool;

use crate::error::{AppError, Result};
use crate::models::radius::{RadAcct, RadPostAuth};

const RADACCT_COLUMNS: &str = "radacctid, acctsessionid, acctuniqueid, username, realm, \
     nasipaddress, nasportid, nasporttype, acctstarttime, acctupdatetime, acctstoptime, \
     acctsessiontime, acctauthentic, acctinputoctets, acctoutputoctets, calledstationid, \
     callingstationid, acctterminatecause, servicetype, framedprotocol, framedipaddress";

/// Filters for the session listing.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub username: Option<String>,
    pub groupname: Option<String>,
    pub nas_ip: Option<String>,
    pub active_only: bool,
    pub started_after: Option<NaiveDateTime>,
    pub started_before: Option<NaiveDateTime>,
}

impl SessionFilter {
    fn where_clause(&self) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();

        if let Some(username) = &self.username {
            conditions.push("a.username = ?".to_string());
            binds.push(username.clone());
        }
        if let Some(groupname) = &self.groupname {
            conditions.push(
                "a.username IN (SELECT username FROM radusergroup WHERE groupname = ?)".to_string(),
            );
            binds.push(groupname.clone());
        }
        if let Some(nas_ip) = &self.nas_ip {
            conditions.push("a.nasipaddress = ?".to_string());
            binds.push(nas_ip.clone());
        }
        if self.active_only {
            conditions.push("a.acctstoptime IS NULL".to_string());
        }
        if let Some(after) = &self.started_after {
            conditions.push("a.acctstarttime >= ?".to_string());
            binds.push(after.format("%Y-%m-%d %H:%M:%S").to_string());
        }
        if let Some(before) = &self.started_before {
            conditions.push("a.acctstarttime <= ?".to_string());
            binds.push(before.format("%Y-%m-%d %H:%M:%S").to_string());
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (clause, binds)
    }
}

/// Filters for the authentication log.
#[derive(Debug, Clone, Default)]
pub struct AuthLogFilter {
    pub username: Option<String>,
    pub reply: Option<String>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

pub struct SessionService {
    db: MySqlPool,
}

impl SessionService {
    pub fn new(db: MySqlPool) -> Self {
        Self { db }
    }

    /// List sessions matching the filter, newest start first.
    pub async fn list(
        &self,
        filter: &SessionFilter,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<RadAcct>, i64)> {
        let (clause, binds) = filter.where_clause();
        let offset = ((page.max(1) - 1) * per_page) as i64;

        let query = format!(
            "SELECT {RADACCT_COLUMNS} FROM radacct a {clause} \
             ORDER BY a.acctstarttime DESC LIMIT ? OFFSET ?"
        );
        let mut q = sqlx::query_as::<_, RadAcct>(&query);
        for bind in &binds {
            q = q.bind(bind);
        }
        let sessions = q
            .bind(per_page as i64)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let count_query = format!("SELECT COUNT(*) FROM radacct a {clause}");
        let mut cq = sqlx::query_scalar::<_, i64>(&count_query);
        for bind in &binds {
            cq = cq.bind(bind);
        }
        let total = cq
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((sessions, total))
    }

    pub async fn get(&self, radacctid: i64) -> Result<RadAcct> {
        sqlx::query_as::<_, RadAcct>(&format!(
            "SELECT {RADACCT_COLUMNS} FROM radacct WHERE radacctid = ?"
        ))
        .bind(radacctid)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
    }

    /// Administratively close sessions whose last interim update (or start,
    /// when no update ever arrived) is older than `hours`. Returns how many
    /// rows were closed.
    pub async fn close_stale(&self, hours: i64) -> Result<u64> {
        if hours <= 0 {
            return Err(AppError::Validation(
                "Stale threshold must be positive".to_string(),
            ));
        }
        let result = sqlx::query(
            r#"
            UPDATE radacct
            SET acctstoptime = NOW(),
                acctsessiontime = TIMESTAMPDIFF(SECOND, acctstarttime, NOW()),
                acctterminatecause = 'Admin-Reset'
            WHERE acctstoptime IS NULL
              AND COALESCE(acctupdatetime, acctstarttime) < NOW() - INTERVAL ? HOUR
            "#,
        )
        .bind(hours)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// List `radpostauth` rows, newest first.
    pub async fn auth_log(
        &self,
        filter: &AuthLogFilter,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<RadPostAuth>, i64)> {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        if let Some(username) = &filter.username {
            conditions.push("username = ?");
            binds.push(username.clone());
        }
        if let Some(reply) = &filter.reply {
            conditions.push("reply = ?");
            binds.push(reply.clone());
        }
        if let Some(from) = &filter.from {
            conditions.push("authdate >= ?");
            binds.push(from.format("%Y-%m-%d %H:%M:%S").to_string());
        }
        if let Some(to) = &filter.to {
            conditions.push("authdate <= ?");
            binds.push(to.format("%Y-%m-%d %H:%M:%S").to_string());
        }
        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let offset = ((page.max(1) - 1) * per_page) as i64;

        let query = format!(
            "SELECT id, username, reply, authdate FROM radpostauth {clause} \
             ORDER BY authdate DESC LIMIT ? OFFSET ?"
        );
        let mut q = sqlx::query_as::<_, RadPostAuth>(&query);
        for bind in &binds {
            q = q.bind(bind);
        }
        let entries = q
            .bind(per_page as i64)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let count_query = format!("SELECT COUNT(*) FROM radpostauth {clause}");
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
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Filter clause assembly
    // -----------------------------------------------------------------------

    #[test]
    fn test_empty_session_filter() {
        let (clause, binds) = SessionFilter::default().where_clause();
        assert!(clause.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn test_active_only_adds_no_bind() {
        let filter = SessionFilter {
            active_only: true,
            ..Default::default()
        };
        let (clause, binds) = filter.where_clause();
        assert_eq!(clause, "WHERE a.acctstoptime IS NULL");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_combined_filter_bind_order() {
        let filter = SessionFilter {
            username: Some("alice".to_string()),
            nas_ip: Some("10.0.0.1".to_string()),
            active_only: true,
            ..Default::default()
        };
        let (clause, binds) = filter.where_clause();
        assert_eq!(
            clause,
            "WHERE a.username = ? AND a.nasipaddress = ? AND a.acctstoptime IS NULL"
        );
        assert_eq!(binds, vec!["alice".to_string(), "10.0.0.1".to_string()]);
    }

    #[test]
    fn test_group_filter_uses_membership_subquery() {
        let filter = SessionFilter {
            groupname: Some("staff".to_string()),
            ..Default::default()
        };
        let (clause, binds) = filter.where_clause();
        assert!(clause.contains("radusergroup"));
        assert_eq!(binds, vec!["staff".to_string()]);
    }

    #[test]
    fn test_date_filters_format_as_sql_literals() {
        let after =
            NaiveDateTime::parse_from_str("2026-02-01 08:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let filter = SessionFilter {
            started_after: Some(after),
            ..Default::default()
        };
        let (clause, binds) = filter.where_clause();
        assert_eq!(clause, "WHERE a.acctstarttime >= ?");
        assert_eq!(binds, vec!["2026-02-01 08:30:00".to_string()]);
    }
}
