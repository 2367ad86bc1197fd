//! Dashboard statistics.
//!
//! Every figure is aggregated inside MySQL (COUNT/SUM/GROUP BY with bounded
//! windows); result sets stay small no matter how large the accounting
//! tables grow. `SUM` over BIGINT columns yields DECIMAL in MySQL, so sums
//! are cast back to SIGNED before they cross the wire.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;

use crate::error::{AppError, Result};
use crate::models::radius::{RadPostAuth, REPLY_REJECT};

/// Headline numbers for the dashboard landing page.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DashboardOverview {
    pub admin_users: i64,
    pub radius_users: i64,
    pub radius_groups: i64,
    pub active_sessions: i64,
    pub sessions_today: i64,
    pub accepts_24h: i64,
    pub rejects_24h: i64,
    pub input_octets_today: i64,
    pub output_octets_today: i64,
}

/// One day of authentication outcomes.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AuthTrendPoint {
    pub day: NaiveDate,
    pub accepts: i64,
    pub rejects: i64,
}

/// One day of traffic volume.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TrafficTrendPoint {
    pub day: NaiveDate,
    pub input_octets: i64,
    pub output_octets: i64,
    pub sessions: i64,
}

/// One user in the top-N listing.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TopUser {
    pub username: String,
    pub total_octets: i64,
    pub session_count: i64,
}

/// Per-NAS session totals.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct NasBreakdown {
    pub nasipaddress: String,
    pub session_count: i64,
    pub active_count: i64,
    pub user_count: i64,
}

/// Ranking dimension for the top-users endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopUsersBy {
    Traffic,
    Sessions,
}

impl Default for TopUsersBy {
    fn default() -> Self {
        TopUsersBy::Traffic
    }
}

pub struct DashboardService {
    db: MySqlPool,
}

impl DashboardService {
    pub fn new(db: MySqlPool) -> Self {
        Self { db }
    }

    pub async fn overview(&self) -> Result<DashboardOverview> {
        sqlx::query_as::<_, DashboardOverview>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM admin_users) AS admin_users,
                (SELECT COUNT(*) FROM (
                    SELECT username FROM radcheck
                    UNION
                    SELECT username FROM radusergroup
                ) u) AS radius_users,
                (SELECT COUNT(*) FROM (
                    SELECT groupname FROM radgroupcheck
                    UNION
                    SELECT groupname FROM radgroupreply
                    UNION
                    SELECT groupname FROM radusergroup
                ) g) AS radius_groups,
                (SELECT COUNT(*) FROM radacct WHERE acctstoptime IS NULL) AS active_sessions,
                (SELECT COUNT(*) FROM radacct WHERE acctstarttime >= CURDATE()) AS sessions_today,
                (SELECT COUNT(*) FROM radpostauth
                 WHERE reply = 'Access-Accept' AND authdate >= NOW() - INTERVAL 24 HOUR) AS accepts_24h,
                (SELECT COUNT(*) FROM radpostauth
                 WHERE reply = 'Access-Reject' AND authdate >= NOW() - INTERVAL 24 HOUR) AS rejects_24h,
                (SELECT CAST(COALESCE(SUM(acctinputoctets), 0) AS SIGNED) FROM radacct
                 WHERE acctstarttime >= CURDATE()) AS input_octets_today,
                (SELECT CAST(COALESCE(SUM(acctoutputoctets), 0) AS SIGNED) FROM radacct
                 WHERE acctstarttime >= CURDATE()) AS output_octets_today
            "#,
        )
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Per-day accept/reject counts for the last `days` (1..=90).
    pub async fn auth_trend(&self, days: i64) -> Result<Vec<AuthTrendPoint>> {
        let days = days.clamp(1, 90);
        sqlx::query_as::<_, AuthTrendPoint>(
            r#"
            SELECT DATE(authdate) AS day,
                   COUNT(CASE WHEN reply = 'Access-Accept' THEN 1 END) AS accepts,
                   COUNT(CASE WHEN reply = 'Access-Reject' THEN 1 END) AS rejects
            FROM radpostauth
            WHERE authdate >= CURDATE() - INTERVAL ? DAY
            GROUP BY DATE(authdate)
            ORDER BY day
            "#,
        )
        .bind(days)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Per-day traffic totals for the last `days` (1..=90).
    pub async fn traffic_trend(&self, days: i64) -> Result<Vec<TrafficTrendPoint>> {
        let days = days.clamp(1, 90);
        sqlx::query_as::<_, TrafficTrendPoint>(
            r#"
            SELECT DATE(acctstarttime) AS day,
                   CAST(COALESCE(SUM(acctinputoctets), 0) AS SIGNED) AS input_octets,
                   CAST(COALESCE(SUM(acctoutputoctets), 0) AS SIGNED) AS output_octets,
                   COUNT(*) AS sessions
            FROM radacct
            WHERE acctstarttime >= CURDATE() - INTERVAL ? DAY
            GROUP BY DATE(acctstarttime)
            ORDER BY day
            "#,
        )
        .bind(days)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Heaviest users over the last `days`, ranked by `by`.
    pub async fn top_users(
        &self,
        by: TopUsersBy,
        limit: i64,
        days: i64,
    ) -> Result<Vec<TopUser>> {
        let limit = limit.clamp(1, 100);
        let days = days.clamp(1, 365);
        let order = match by {
            TopUsersBy::Traffic => "total_octets DESC",
            TopUsersBy::Sessions => "session_count DESC",
        };
        let query = format!(
            r#"
            SELECT username,
                   CAST(COALESCE(SUM(COALESCE(acctinputoctets, 0) + COALESCE(acctoutputoctets, 0)), 0) AS SIGNED) AS total_octets,
                   COUNT(*) AS session_count
            FROM radacct
            WHERE acctstarttime >= CURDATE() - INTERVAL ? DAY
            GROUP BY username
            ORDER BY {order}
            LIMIT ?
            "#
        );
        sqlx::query_as::<_, TopUser>(&query)
            .bind(days)
            .bind(limit)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Session totals per NAS over the last `days`.
    pub async fn nas_breakdown(&self, days: i64) -> Result<Vec<NasBreakdown>> {
        let days = days.clamp(1, 365);
        sqlx::query_as::<_, NasBreakdown>(
            r#"
            SELECT nasipaddress,
                   COUNT(*) AS session_count,
                   COUNT(CASE WHEN acctstoptime IS NULL THEN 1 END) AS active_count,
                   COUNT(DISTINCT username) AS user_count
            FROM radacct
            WHERE acctstarttime >= CURDATE() - INTERVAL ? DAY
            GROUP BY nasipaddress
            ORDER BY session_count DESC
            LIMIT 100
            "#,
        )
        .bind(days)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Most recent Access-Reject entries.
    pub async fn recent_rejects(&self, limit: i64) -> Result<Vec<RadPostAuth>> {
        sqlx::query_as::<_, RadPostAuth>(
            r#"
            SELECT id, username, reply, authdate
            FROM radpostauth
            WHERE reply = ?
            ORDER BY authdate DESC
            LIMIT ?
            "#,
        )
        .bind(REPLY_REJECT)
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_users_by_deserializes() {
        assert_eq!(
            serde_json::from_str::<TopUsersBy>(r#""traffic""#).unwrap(),
            TopUsersBy::Traffic
        );
        assert_eq!(
            serde_json::from_str::<TopUsersBy>(r#""sessions""#).unwrap(),
            TopUsersBy::Sessions
        );
        assert!(serde_json::from_str::<TopUsersBy>(r#""octets""#).is_err());
    }

    #[test]
    fn test_top_users_by_default_is_traffic() {
        assert_eq!(TopUsersBy::default(), TopUsersBy::Traffic);
    }

    #[test]
    fn test_overview_serializes_all_fields() {
        let overview = DashboardOverview {
            admin_users: 2,
            radius_users: 150,
            radius_groups: 4,
            active_sessions: 37,
            sessions_today: 120,
            accepts_24h: 400,
            rejects_24h: 13,
            input_octets_today: 1_000_000,
            output_octets_today: 9_000_000,
        };
        let json = serde_json::to_value(&overview).unwrap();
        assert_eq!(json["active_sessions"], 37);
        assert_eq!(json["rejects_24h"], 13);
        assert_eq!(json.as_object().unwrap().len(), 9);
    }

    #[test]
    fn test_utc_today_is_well_formed() {
        // The trend endpoints group on server-side DATE(); this only pins
        // that chrono's date formatting matches what the API documents.
        let today = chrono::Utc::now().date_naive();
        assert_eq!(today.format("%Y-%m-%d").to_string().len(), 10);
    }
}
