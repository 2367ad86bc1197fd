//! HTTP handlers, one module per resource.

pub mod audit;
pub mod auth;
pub mod coa;
pub mod dashboard;
pub mod health;
pub mod radius_groups;
pub mod radius_users;
pub mod sessions;
pub mod users;

use axum::http::HeaderMap;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32, total: i64) -> Self {
        let total_pages = ((total as f64) / (per_page as f64)).ceil() as u32;
        Self {
            page,
            per_page,
            total,
            total_pages,
        }
    }
}

/// Standard list envelope: items plus pagination metadata.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: i64) -> Self {
        Self {
            items,
            pagination: Pagination::new(page, per_page, total),
        }
    }
}

/// Clamp raw pagination query values: page >= 1, 1 <= per_page <= 100.
pub fn clamp_paging(page: Option<u32>, per_page: Option<u32>) -> (u32, u32) {
    (
        page.unwrap_or(1).max(1),
        per_page.unwrap_or(20).clamp(1, 100),
    )
}

/// Client address and user agent for audit entries. The console runs behind
/// a reverse proxy, so the forwarded headers are the source of truth.
pub fn client_meta(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (ip, user_agent)
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| DateTime::from_naive_utc_and_offset(d.and_time(NaiveTime::MIN), Utc))
}

/// Parse a local timestamp (`YYYY-MM-DDTHH:MM:SS`, space separator also
/// accepted) or a bare date, for the DATETIME-backed accounting tables.
pub fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Pagination
    // -----------------------------------------------------------------------

    #[test]
    fn test_pagination_total_pages() {
        assert_eq!(Pagination::new(1, 20, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 20, 20).total_pages, 1);
        assert_eq!(Pagination::new(1, 20, 21).total_pages, 2);
    }

    #[test]
    fn test_clamp_paging() {
        assert_eq!(clamp_paging(None, None), (1, 20));
        assert_eq!(clamp_paging(Some(0), Some(0)), (1, 1));
        assert_eq!(clamp_paging(Some(3), Some(500)), (3, 100));
    }

    // -----------------------------------------------------------------------
    // Client metadata
    // -----------------------------------------------------------------------

    #[test]
    fn test_client_meta_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "198.51.100.7, 10.0.0.2".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        headers.insert("user-agent", "curl/8.5".parse().unwrap());
        let (ip, ua) = client_meta(&headers);
        assert_eq!(ip.as_deref(), Some("198.51.100.7"));
        assert_eq!(ua.as_deref(), Some("curl/8.5"));
    }

    #[test]
    fn test_client_meta_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.4".parse().unwrap());
        let (ip, ua) = client_meta(&headers);
        assert_eq!(ip.as_deref(), Some("203.0.113.4"));
        assert!(ua.is_none());
    }

    #[test]
    fn test_client_meta_empty() {
        let (ip, ua) = client_meta(&HeaderMap::new());
        assert!(ip.is_none());
        assert!(ua.is_none());
    }

    // -----------------------------------------------------------------------
    // Date parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_utc_rfc3339() {
        let dt = parse_utc("2026-03-01T12:30:00Z").unwrap();
        assert_eq!(dt.timestamp(), 1772368200);
    }

    #[test]
    fn test_parse_utc_bare_date() {
        let dt = parse_utc("2026-03-01").unwrap();
        assert_eq!(dt.format("%H:%M:%S").to_string(), "00:00:00");
    }

    #[test]
    fn test_parse_utc_garbage() {
        assert!(parse_utc("yesterday").is_none());
    }

    #[test]
    fn test_parse_naive_variants() {
        assert!(parse_naive("2026-03-01T08:00:00").is_some());
        assert!(parse_naive("2026-03-01 08:00:00").is_some());
        assert!(parse_naive("2026-03-01").is_some());
        assert!(parse_naive("08:00").is_none());
    }
}
