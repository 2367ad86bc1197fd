//! CRUD over the FreeRADIUS attribute tables: per-user check/reply items,
//! group check/reply items and group membership.

use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;

use crate::api::validation::{
    escape_like, validate_attribute_name, validate_attribute_value, validate_groupname,
    validate_op, validate_username,
};
use crate::error::{AppError, Result};
use crate::models::radius::{
    AttributeEntry, RadCheck, RadGroupCheck, RadGroupReply, RadReply, RadUserGroup,
    PASSWORD_ATTRIBUTES,
};

/// Which attribute table a CRUD call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrKind {
    Check,
    Reply,
}

impl AttrKind {
    fn user_table(self) -> &'static str {
        match self {
            AttrKind::Check => "radcheck",
            AttrKind::Reply => "radreply",
        }
    }

    fn group_table(self) -> &'static str {
        match self {
            AttrKind::Check => "radgroupcheck",
            AttrKind::Reply => "radgroupreply",
        }
    }
}

/// One username as shown in the user listing.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RadiusUserSummary {
    pub username: String,
    pub check_count: i64,
    pub reply_count: i64,
    pub group_count: i64,
}

/// Full per-user view.
#[derive(Debug, Serialize)]
pub struct RadiusUserDetail {
    pub username: String,
    pub check_attributes: Vec<RadCheck>,
    pub reply_attributes: Vec<RadReply>,
    pub groups: Vec<RadUserGroup>,
    pub active_sessions: i64,
}

/// One group as shown in the group listing.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RadiusGroupSummary {
    pub groupname: String,
    pub check_count: i64,
    pub reply_count: i64,
    pub member_count: i64,
}

/// Full per-group view.
#[derive(Debug, Serialize)]
pub struct RadiusGroupDetail {
    pub groupname: String,
    pub check_attributes: Vec<RadGroupCheck>,
    pub reply_attributes: Vec<RadGroupReply>,
    pub member_count: i64,
}

/// Requested group membership when creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMembership {
    pub groupname: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    1
}

/// Request body for creating a RADIUS user.
#[derive(Debug, Deserialize)]
pub struct CreateRadiusUserRequest {
    pub username: String,
    pub password: String,
    /// Password check attribute; defaults to `Cleartext-Password`.
    pub password_attribute: Option<String>,
    #[serde(default)]
    pub groups: Vec<GroupMembership>,
    #[serde(default)]
    pub reply_attributes: Vec<AttributeEntry>,
}

/// Request body for creating a RADIUS group.
#[derive(Debug, Deserialize)]
pub struct CreateRadiusGroupRequest {
    pub groupname: String,
    #[serde(default)]
    pub check_attributes: Vec<AttributeEntry>,
    #[serde(default)]
    pub reply_attributes: Vec<AttributeEntry>,
}

fn validate_entry(entry: &AttributeEntry) -> Result<()> {
    validate_attribute_name(&entry.attribute)?;
    validate_op(&entry.op)?;
    validate_attribute_value(&entry.value)
}

fn validate_password_attribute(attribute: &str) -> Result<()> {
    if !PASSWORD_ATTRIBUTES.contains(&attribute) {
        return Err(AppError::Validation(format!(
            "'{attribute}' is not a supported password attribute"
        )));
    }
    Ok(())
}

pub struct RadiusService {
    db: MySqlPool,
}

impl RadiusService {
    pub fn new(db: MySqlPool) -> Self {
        Self { db }
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// List distinct usernames known to any of the three per-user tables.
    pub async fn list_users(
        &self,
        page: u32,
        per_page: u32,
        search: Option<&str>,
    ) -> Result<(Vec<RadiusUserSummary>, i64)> {
        let offset = ((page.max(1) - 1) * per_page) as i64;
        let pattern = search.map(|s| format!("%{}%", escape_like(s)));

        let users: Vec<RadiusUserSummary> = sqlx::query_as(
            r#"
            SELECT u.username,
                   (SELECT COUNT(*) FROM radcheck c WHERE c.username = u.username) AS check_count,
                   (SELECT COUNT(*) FROM radreply r WHERE r.username = u.username) AS reply_count,
                   (SELECT COUNT(*) FROM radusergroup g WHERE g.username = u.username) AS group_count
            FROM (
                SELECT username FROM radcheck
                UNION
                SELECT username FROM radreply
                UNION
                SELECT username FROM radusergroup
            ) u
            WHERE (? IS NULL OR u.username LIKE ?)
            ORDER BY u.username
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT username FROM radcheck
                UNION
                SELECT username FROM radreply
                UNION
                SELECT username FROM radusergroup
            ) u
            WHERE (? IS NULL OR u.username LIKE ?)
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((users, total))
    }

    pub async fn get_user(&self, username: &str) -> Result<RadiusUserDetail> {
        let check_attributes: Vec<RadCheck> = sqlx::query_as(
            "SELECT id, username, attribute, op, value FROM radcheck WHERE username = ? ORDER BY attribute",
        )
        .bind(username)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let reply_attributes: Vec<RadReply> = sqlx::query_as(
            "SELECT id, username, attribute, op, value FROM radreply WHERE username = ? ORDER BY attribute",
        )
        .bind(username)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let groups: Vec<RadUserGroup> = sqlx::query_as(
            "SELECT id, username, groupname, priority FROM radusergroup WHERE username = ? ORDER BY priority, groupname",
        )
        .bind(username)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if check_attributes.is_empty() && reply_attributes.is_empty() && groups.is_empty() {
            return Err(AppError::NotFound(format!(
                "RADIUS user '{username}' not found"
            )));
        }

        let active_sessions: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM radacct WHERE username = ? AND acctstoptime IS NULL",
        )
        .bind(username)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(RadiusUserDetail {
            username: username.to_string(),
            check_attributes,
            reply_attributes,
            groups,
            active_sessions,
        })
    }

    pub async fn create_user(&self, req: CreateRadiusUserRequest) -> Result<RadiusUserDetail> {
        validate_username(&req.username, "Username")?;
        validate_attribute_value(&req.password)?;
        let password_attribute = req
            .password_attribute
            .as_deref()
            .unwrap_or("Cleartext-Password");
        validate_password_attribute(password_attribute)?;
        for entry in &req.reply_attributes {
            validate_entry(entry)?;
        }
        for membership in &req.groups {
            validate_groupname(&membership.groupname)?;
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM radcheck WHERE username = ?")
            .bind(&req.username)
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if existing > 0 {
            return Err(AppError::Conflict(format!(
                "RADIUS user '{}' already exists",
                req.username
            )));
        }

        let mut tx = self.db.begin().await?;

        sqlx::query("INSERT INTO radcheck (username, attribute, op, value) VALUES (?, ?, ':=', ?)")
            .bind(&req.username)
            .bind(password_attribute)
            .bind(&req.password)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for entry in &req.reply_attributes {
            sqlx::query("INSERT INTO radreply (username, attribute, op, value) VALUES (?, ?, ?, ?)")
                .bind(&req.username)
                .bind(&entry.attribute)
                .bind(&entry.op)
                .bind(&entry.value)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        for membership in &req.groups {
            sqlx::query(
                "INSERT INTO radusergroup (username, groupname, priority) VALUES (?, ?, ?)",
            )
            .bind(&req.username)
            .bind(&membership.groupname)
            .bind(membership.priority)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        tx.commit().await?;

        self.get_user(&req.username).await
    }

    /// Remove every per-user row. Returns how many rows went away.
    pub async fn delete_user(&self, username: &str) -> Result<u64> {
        let mut tx = self.db.begin().await?;
        let mut removed = 0;
        for table in ["radcheck", "radreply", "radusergroup"] {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE username = ?"))
                .bind(username)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            removed += result.rows_affected();
        }
        tx.commit().await?;

        if removed == 0 {
            return Err(AppError::NotFound(format!(
                "RADIUS user '{username}' not found"
            )));
        }
        Ok(removed)
    }

    /// Replace the user's password attribute row.
    pub async fn set_user_password(
        &self,
        username: &str,
        password: &str,
        password_attribute: Option<&str>,
    ) -> Result<()> {
        validate_attribute_value(password)?;
        let attribute = password_attribute.unwrap_or("Cleartext-Password");
        validate_password_attribute(attribute)?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM radcheck WHERE username = ?")
            .bind(username)
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if existing == 0 {
            return Err(AppError::NotFound(format!(
                "RADIUS user '{username}' not found"
            )));
        }

        let mut tx = self.db.begin().await?;

        // Drop any previous password item regardless of its hash flavor, so
        // a user never ends up with two competing password attributes.
        let placeholders = vec!["?"; PASSWORD_ATTRIBUTES.len()].join(", ");
        let delete_sql = format!(
            "DELETE FROM radcheck WHERE username = ? AND attribute IN ({placeholders})"
        );
        let mut del = sqlx::query(&delete_sql).bind(username);
        for attr in PASSWORD_ATTRIBUTES {
            del = del.bind(attr);
        }
        del.execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query("INSERT INTO radcheck (username, attribute, op, value) VALUES (?, ?, ':=', ?)")
            .bind(username)
            .bind(attribute)
            .bind(password)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn add_user_attribute(
        &self,
        username: &str,
        kind: AttrKind,
        entry: &AttributeEntry,
    ) -> Result<u32> {
        validate_username(username, "Username")?;
        validate_entry(entry)?;
        let table = kind.user_table();
        let result = sqlx::query(&format!(
            "INSERT INTO {table} (username, attribute, op, value) VALUES (?, ?, ?, ?)"
        ))
        .bind(username)
        .bind(&entry.attribute)
        .bind(&entry.op)
        .bind(&entry.value)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.last_insert_id() as u32)
    }

    pub async fn update_user_attribute(
        &self,
        kind: AttrKind,
        id: u32,
        op: &str,
        value: &str,
    ) -> Result<()> {
        validate_op(op)?;
        validate_attribute_value(value)?;
        let table = kind.user_table();
        let result = sqlx::query(&format!("UPDATE {table} SET op = ?, value = ? WHERE id = ?"))
            .bind(op)
            .bind(value)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Attribute not found".to_string()));
        }
        Ok(())
    }

    pub async fn delete_user_attribute(&self, kind: AttrKind, id: u32) -> Result<()> {
        let table = kind.user_table();
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Attribute not found".to_string()));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    pub async fn add_membership(
        &self,
        username: &str,
        groupname: &str,
        priority: i32,
    ) -> Result<RadUserGroup> {
        validate_username(username, "Username")?;
        validate_groupname(groupname)?;

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM radusergroup WHERE username = ? AND groupname = ?",
        )
        .bind(username)
        .bind(groupname)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        if existing > 0 {
            return Err(AppError::Conflict(format!(
                "'{username}' is already a member of '{groupname}'"
            )));
        }

        let result = sqlx::query(
            "INSERT INTO radusergroup (username, groupname, priority) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(groupname)
        .bind(priority)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(RadUserGroup {
            id: result.last_insert_id() as u32,
            username: username.to_string(),
            groupname: groupname.to_string(),
            priority,
        })
    }

    pub async fn remove_membership(&self, username: &str, groupname: &str) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM radusergroup WHERE username = ? AND groupname = ?")
                .bind(username)
                .bind(groupname)
                .execute(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "'{username}' is not a member of '{groupname}'"
            )));
        }
        Ok(())
    }

    pub async fn set_membership_priority(
        &self,
        username: &str,
        groupname: &str,
        priority: i32,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE radusergroup SET priority = ? WHERE username = ? AND groupname = ?",
        )
        .bind(priority)
        .bind(username)
        .bind(groupname)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "'{username}' is not a member of '{groupname}'"
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    pub async fn list_groups(
        &self,
        page: u32,
        per_page: u32,
        search: Option<&str>,
    ) -> Result<(Vec<RadiusGroupSummary>, i64)> {
        let offset = ((page.max(1) - 1) * per_page) as i64;
        let pattern = search.map(|s| format!("%{}%", escape_like(s)));

        let groups: Vec<RadiusGroupSummary> = sqlx::query_as(
            r#"
            SELECT g.groupname,
                   (SELECT COUNT(*) FROM radgroupcheck c WHERE c.groupname = g.groupname) AS check_count,
                   (SELECT COUNT(*) FROM radgroupreply r WHERE r.groupname = g.groupname) AS reply_count,
                   (SELECT COUNT(*) FROM radusergroup m WHERE m.groupname = g.groupname) AS member_count
            FROM (
                SELECT groupname FROM radgroupcheck
                UNION
                SELECT groupname FROM radgroupreply
                UNION
                SELECT groupname FROM radusergroup
            ) g
            WHERE (? IS NULL OR g.groupname LIKE ?)
            ORDER BY g.groupname
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT groupname FROM radgroupcheck
                UNION
                SELECT groupname FROM radgroupreply
                UNION
                SELECT groupname FROM radusergroup
            ) g
            WHERE (? IS NULL OR g.groupname LIKE ?)
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((groups, total))
    }

    pub async fn get_group(&self, groupname: &str) -> Result<RadiusGroupDetail> {
        let check_attributes: Vec<RadGroupCheck> = sqlx::query_as(
            "SELECT id, groupname, attribute, op, value FROM radgroupcheck WHERE groupname = ? ORDER BY attribute",
        )
        .bind(groupname)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let reply_attributes: Vec<RadGroupReply> = sqlx::query_as(
            "SELECT id, groupname, attribute, op, value FROM radgroupreply WHERE groupname = ? ORDER BY attribute",
        )
        .bind(groupname)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let member_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM radusergroup WHERE groupname = ?")
                .bind(groupname)
                .fetch_one(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        if check_attributes.is_empty() && reply_attributes.is_empty() && member_count == 0 {
            return Err(AppError::NotFound(format!(
                "RADIUS group '{groupname}' not found"
            )));
        }

        Ok(RadiusGroupDetail {
            groupname: groupname.to_string(),
            check_attributes,
            reply_attributes,
            member_count,
        })
    }

    pub async fn create_group(&self, req: CreateRadiusGroupRequest) -> Result<RadiusGroupDetail> {
        validate_groupname(&req.groupname)?;
        if req.check_attributes.is_empty() && req.reply_attributes.is_empty() {
            return Err(AppError::Validation(
                "A group needs at least one check or reply attribute".to_string(),
            ));
        }
        for entry in req.check_attributes.iter().chain(&req.reply_attributes) {
            validate_entry(entry)?;
        }

        let existing: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT groupname FROM radgroupcheck WHERE groupname = ?
                UNION
                SELECT groupname FROM radgroupreply WHERE groupname = ?
            ) g
            "#,
        )
        .bind(&req.groupname)
        .bind(&req.groupname)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        if existing > 0 {
            return Err(AppError::Conflict(format!(
                "RADIUS group '{}' already exists",
                req.groupname
            )));
        }

        let mut tx = self.db.begin().await?;
        for entry in &req.check_attributes {
            sqlx::query(
                "INSERT INTO radgroupcheck (groupname, attribute, op, value) VALUES (?, ?, ?, ?)",
            )
            .bind(&req.groupname)
            .bind(&entry.attribute)
            .bind(&entry.op)
            .bind(&entry.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }
        for entry in &req.reply_attributes {
            sqlx::query(
                "INSERT INTO radgroupreply (groupname, attribute, op, value) VALUES (?, ?, ?, ?)",
            )
            .bind(&req.groupname)
            .bind(&entry.attribute)
            .bind(&entry.op)
            .bind(&entry.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }
        tx.commit().await?;

        self.get_group(&req.groupname).await
    }

    /// Delete a group's attribute rows. Members block deletion unless
    /// `force`, which detaches them too.
    pub async fn delete_group(&self, groupname: &str, force: bool) -> Result<u64> {
        let member_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM radusergroup WHERE groupname = ?")
                .bind(groupname)
                .fetch_one(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        if member_count > 0 && !force {
            return Err(AppError::Conflict(format!(
                "Group '{groupname}' still has {member_count} members"
            )));
        }

        let mut tx = self.db.begin().await?;
        let mut removed = 0;
        let tables: &[&str] = if force {
            &["radgroupcheck", "radgroupreply", "radusergroup"]
        } else {
            &["radgroupcheck", "radgroupreply"]
        };
        for table in tables {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE groupname = ?"))
                .bind(groupname)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            removed += result.rows_affected();
        }
        tx.commit().await?;

        if removed == 0 {
            return Err(AppError::NotFound(format!(
                "RADIUS group '{groupname}' not found"
            )));
        }
        Ok(removed)
    }

    pub async fn add_group_attribute(
        &self,
        groupname: &str,
        kind: AttrKind,
        entry: &AttributeEntry,
    ) -> Result<u32> {
        validate_groupname(groupname)?;
        validate_entry(entry)?;
        let table = kind.group_table();
        let result = sqlx::query(&format!(
            "INSERT INTO {table} (groupname, attribute, op, value) VALUES (?, ?, ?, ?)"
        ))
        .bind(groupname)
        .bind(&entry.attribute)
        .bind(&entry.op)
        .bind(&entry.value)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.last_insert_id() as u32)
    }

    pub async fn update_group_attribute(
        &self,
        kind: AttrKind,
        id: u32,
        op: &str,
        value: &str,
    ) -> Result<()> {
        validate_op(op)?;
        validate_attribute_value(value)?;
        let table = kind.group_table();
        let result = sqlx::query(&format!("UPDATE {table} SET op = ?, value = ? WHERE id = ?"))
            .bind(op)
            .bind(value)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Attribute not found".to_string()));
        }
        Ok(())
    }

    pub async fn delete_group_attribute(&self, kind: AttrKind, id: u32) -> Result<()> {
        let table = kind.group_table();
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Attribute not found".to_string()));
        }
        Ok(())
    }

    pub async fn group_members(&self, groupname: &str, limit: i64) -> Result<Vec<RadUserGroup>> {
        sqlx::query_as(
            r#"
            SELECT id, username, groupname, priority
            FROM radusergroup
            WHERE groupname = ?
            ORDER BY username
            LIMIT ?
            "#,
        )
        .bind(groupname)
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Table name mapping (interpolated into SQL, so it must stay closed)
    // -----------------------------------------------------------------------

    #[test]
    fn test_attr_kind_user_tables() {
        assert_eq!(AttrKind::Check.user_table(), "radcheck");
        assert_eq!(AttrKind::Reply.user_table(), "radreply");
    }

    #[test]
    fn test_attr_kind_group_tables() {
        assert_eq!(AttrKind::Check.group_table(), "radgroupcheck");
        assert_eq!(AttrKind::Reply.group_table(), "radgroupreply");
    }

    #[test]
    fn test_attr_kind_deserializes_lowercase() {
        assert_eq!(
            serde_json::from_str::<AttrKind>(r#""check""#).unwrap(),
            AttrKind::Check
        );
        assert_eq!(
            serde_json::from_str::<AttrKind>(r#""reply""#).unwrap(),
            AttrKind::Reply
        );
        assert!(serde_json::from_str::<AttrKind>(r#""Check""#).is_err());
    }

    // -----------------------------------------------------------------------
    // Request validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_validate_entry_rejects_bad_op() {
        let entry = AttributeEntry {
            attribute: "Session-Timeout".to_string(),
            op: "~=".to_string(),
            value: "3600".to_string(),
        };
        assert!(validate_entry(&entry).is_err());
    }

    #[test]
    fn test_validate_entry_accepts_standard_item() {
        let entry = AttributeEntry {
            attribute: "Framed-IP-Address".to_string(),
            op: ":=".to_string(),
            value: "192.0.2.9".to_string(),
        };
        assert!(validate_entry(&entry).is_ok());
    }

    #[test]
    fn test_password_attribute_allowlist() {
        assert!(validate_password_attribute("Cleartext-Password").is_ok());
        assert!(validate_password_attribute("NT-Password").is_ok());
        assert!(validate_password_attribute("Auth-Type").is_err());
        assert!(validate_password_attribute("").is_err());
    }

    #[test]
    fn test_group_membership_default_priority() {
        let m: GroupMembership = serde_json::from_str(r#"{"groupname": "staff"}"#).unwrap();
        assert_eq!(m.priority, 1);
    }

    #[test]
    fn test_create_user_request_defaults() {
        let req: CreateRadiusUserRequest =
            serde_json::from_str(r#"{"username": "alice", "password": "s3cret"}"#).unwrap();
        assert!(req.password_attribute.is_none());
        assert!(req.groups.is_empty());
        assert!(req.reply_attributes.is_empty());
    }
}
