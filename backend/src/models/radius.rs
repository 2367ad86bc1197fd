//! Row types for the standard FreeRADIUS SQL schema.
//!
//! These tables are owned by FreeRADIUS itself; the console reads and writes
//! them but never alters their shape. Attribute rows (`radcheck`, `radreply`,
//! `radgroupcheck`, `radgroupreply`) share one layout. Accounting rows use
//! local-time `DATETIME` columns, hence `NaiveDateTime` here rather than the
//! timezone-aware timestamps of the console's own tables.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// FreeRADIUS attribute operators accepted in check/reply items.
pub const RADIUS_OPS: &[&str] = &[
    ":=", "==", "+=", "!=", ">", ">=", "<", "<=", "=~", "!~", "=*", "!*", "=",
];

/// Returns true if `op` is a valid FreeRADIUS attribute operator.
pub fn is_valid_op(op: &str) -> bool {
    RADIUS_OPS.contains(&op)
}

/// Password check attributes the console can manage. `Cleartext-Password`
/// is the FreeRADIUS default; hashed variants are written verbatim.
pub const PASSWORD_ATTRIBUTES: &[&str] = &[
    "Cleartext-Password",
    "Crypt-Password",
    "MD5-Password",
    "SHA-Password",
    "NT-Password",
];

/// A `radcheck` row: per-user authentication check attribute.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RadCheck {
    pub id: u32,
    pub username: String,
    pub attribute: String,
    pub op: String,
    pub value: String,
}

/// A `radreply` row: per-user authorization reply attribute.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RadReply {
    pub id: u32,
    pub username: String,
    pub attribute: String,
    pub op: String,
    pub value: String,
}

/// A `radgroupcheck` row: per-group check attribute.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RadGroupCheck {
    pub id: u32,
    pub groupname: String,
    pub attribute: String,
    pub op: String,
    pub value: String,
}

/// A `radgroupreply` row: per-group reply attribute.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RadGroupReply {
    pub id: u32,
    pub groupname: String,
    pub attribute: String,
    pub op: String,
    pub value: String,
}

/// A `radusergroup` row: user-to-group membership with priority.
///
/// The stock schema has no primary key on this table; the console requires
/// the common `id INT AUTO_INCREMENT` variant (see docs/schema.sql).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RadUserGroup {
    pub id: u32,
    pub username: String,
    pub groupname: String,
    pub priority: i32,
}

/// A `radacct` row: one accounting session.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RadAcct {
    pub radacctid: i64,
    pub acctsessionid: String,
    pub acctuniqueid: String,
    pub username: String,
    pub realm: Option<String>,
    pub nasipaddress: String,
    pub nasportid: Option<String>,
    pub nasporttype: Option<String>,
    pub acctstarttime: Option<NaiveDateTime>,
    pub acctupdatetime: Option<NaiveDateTime>,
    pub acctstoptime: Option<NaiveDateTime>,
    pub acctsessiontime: Option<u32>,
    pub acctauthentic: Option<String>,
    pub acctinputoctets: Option<i64>,
    pub acctoutputoctets: Option<i64>,
    pub calledstationid: String,
    pub callingstationid: String,
    pub acctterminatecause: String,
    pub servicetype: Option<String>,
    pub framedprotocol: Option<String>,
    pub framedipaddress: String,
}

impl RadAcct {
    /// A session is active while accounting has not recorded a stop time.
    pub fn is_active(&self) -> bool {
        self.acctstoptime.is_none()
    }
}

/// A `radpostauth` row: one authentication attempt as logged by FreeRADIUS.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RadPostAuth {
    pub id: i32,
    pub username: String,
    pub reply: String,
    pub authdate: DateTime<Utc>,
}

/// Reply values FreeRADIUS writes into `radpostauth.reply`.
pub const REPLY_ACCEPT: &str = "Access-Accept";
pub const REPLY_REJECT: &str = "Access-Reject";

/// An attribute definition as supplied by API clients and policy templates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeEntry {
    pub attribute: String,
    pub op: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Operator validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_valid_ops() {
        assert!(is_valid_op(":="));
        assert!(is_valid_op("=="));
        assert!(is_valid_op("+="));
        assert!(is_valid_op("=~"));
        assert!(is_valid_op("="));
    }

    #[test]
    fn test_invalid_ops() {
        assert!(!is_valid_op("~="));
        assert!(!is_valid_op("=>"));
        assert!(!is_valid_op(""));
        assert!(!is_valid_op("set"));
    }

    #[test]
    fn test_password_attributes_include_cleartext() {
        assert!(PASSWORD_ATTRIBUTES.contains(&"Cleartext-Password"));
        assert!(!PASSWORD_ATTRIBUTES.contains(&"User-Password"));
    }

    // -----------------------------------------------------------------------
    // Session state
    // -----------------------------------------------------------------------

    fn sample_session(stopped: bool) -> RadAcct {
        RadAcct {
            radacctid: 1,
            acctsessionid: "5E1F0001".to_string(),
            acctuniqueid: "a1b2c3d4".to_string(),
            username: "alice".to_string(),
            realm: None,
            nasipaddress: "10.0.0.1".to_string(),
            nasportid: Some("15".to_string()),
            nasporttype: Some("Wireless-802.11".to_string()),
            acctstarttime: Some(
                NaiveDateTime::parse_from_str("2026-01-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            ),
            acctupdatetime: None,
            acctstoptime: if stopped {
                Some(
                    NaiveDateTime::parse_from_str("2026-01-01 11:00:00", "%Y-%m-%d %H:%M:%S")
                        .unwrap(),
                )
            } else {
                None
            },
            acctsessiontime: Some(3600),
            acctauthentic: Some("RADIUS".to_string()),
            acctinputoctets: Some(1024),
            acctoutputoctets: Some(2048),
            calledstationid: "AA-BB-CC-DD-EE-FF:corp".to_string(),
            callingstationid: "11-22-33-44-55-66".to_string(),
            acctterminatecause: String::new(),
            servicetype: Some("Framed-User".to_string()),
            framedprotocol: Some("PPP".to_string()),
            framedipaddress: "192.0.2.10".to_string(),
        }
    }

    #[test]
    fn test_session_active_without_stoptime() {
        assert!(sample_session(false).is_active());
        assert!(!sample_session(true).is_active());
    }

    // -----------------------------------------------------------------------
    // Attribute entry JSON contract
    // -----------------------------------------------------------------------

    #[test]
    fn test_attribute_entry_roundtrip() {
        let entry = AttributeEntry {
            attribute: "Framed-IP-Address".to_string(),
            op: ":=".to_string(),
            value: "192.0.2.7".to_string(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: AttributeEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_attribute_entry_requires_all_fields() {
        let result =
            serde_json::from_str::<AttributeEntry>(r#"{"attribute": "Session-Timeout"}"#);
        assert!(result.is_err());
    }
}
