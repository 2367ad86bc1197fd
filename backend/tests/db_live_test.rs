//! Live integration test against a real MySQL with the console schema and
//! the FreeRADIUS tables loaded (see docs/schema.sql).
//!
//! Requires env vars:
//!   TEST_DATABASE_URL
//!
//! Run with:
//!   cargo test --test db_live_test -- --ignored --nocapture

use sqlx::mysql::MySqlPoolOptions;
use uuid::Uuid;

use radius_console_backend::models::audit_log::{AuditAction, AuditCategory, NewAuditLog};
use radius_console_backend::models::radius::AttributeEntry;
use radius_console_backend::services::audit_service::{AuditFilter, AuditService, ExportFormat};
use radius_console_backend::services::radius_service::{
    AttrKind, CreateRadiusUserRequest, GroupMembership, RadiusService,
};

#[tokio::test]
#[ignore]
async fn test_radius_user_lifecycle_and_audit() {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL not set");
    let db = MySqlPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");

    let radius = RadiusService::new(db.clone());
    let audit = AuditService::new(db.clone());

    let username = format!("it-{}", Uuid::new_v4().simple());
    println!("Testing lifecycle for {}", username);

    // CREATE
    println!("  create user");
    let created = radius
        .create_user(CreateRadiusUserRequest {
            username: username.clone(),
            password: "s3cret-pass".to_string(),
            password_attribute: None,
            groups: vec![GroupMembership {
                groupname: "it-test-group".to_string(),
                priority: 2,
            }],
            reply_attributes: vec![AttributeEntry {
                attribute: "Session-Timeout".to_string(),
                op: ":=".to_string(),
                value: "3600".to_string(),
            }],
        })
        .await
        .expect("create_user failed");
    assert_eq!(created.check_attributes.len(), 1);
    assert_eq!(created.check_attributes[0].attribute, "Cleartext-Password");
    assert_eq!(created.reply_attributes.len(), 1);
    assert_eq!(created.groups.len(), 1);

    // Duplicate create must conflict
    println!("  duplicate create conflicts");
    let duplicate = radius
        .create_user(CreateRadiusUserRequest {
            username: username.clone(),
            password: "other".to_string(),
            password_attribute: None,
            groups: vec![],
            reply_attributes: vec![],
        })
        .await;
    assert!(duplicate.is_err(), "duplicate username must be rejected");

    // ADD + UPDATE + DELETE attribute
    println!("  attribute CRUD");
    let attr_id = radius
        .add_user_attribute(
            &username,
            AttrKind::Reply,
            &AttributeEntry {
                attribute: "Framed-IP-Address".to_string(),
                op: ":=".to_string(),
                value: "192.0.2.77".to_string(),
            },
        )
        .await
        .expect("add attribute failed");
    radius
        .update_user_attribute(AttrKind::Reply, attr_id, ":=", "192.0.2.78")
        .await
        .expect("update attribute failed");
    radius
        .delete_user_attribute(AttrKind::Reply, attr_id)
        .await
        .expect("delete attribute failed");

    // PASSWORD
    println!("  password change");
    radius
        .set_user_password(&username, "new-pass", None)
        .await
        .expect("set password failed");
    let detail = radius.get_user(&username).await.expect("get_user failed");
    let pw = detail
        .check_attributes
        .iter()
        .find(|a| a.attribute == "Cleartext-Password")
        .expect("password attribute missing");
    assert_eq!(pw.value, "new-pass");

    // AUDIT record + export
    println!("  audit record/export");
    audit
        .record(NewAuditLog {
            username: "it-runner".to_string(),
            action: AuditAction::Create,
            category: AuditCategory::RadiusUser,
            target: Some(username.clone()),
            detail: None,
            ip_address: None,
            user_agent: None,
        })
        .await
        .expect("audit record failed");
    let filter = AuditFilter {
        username: Some("it-runner".to_string()),
        ..Default::default()
    };
    let (entries, total) = audit.list(&filter, 1, 10).await.expect("audit list failed");
    assert!(total >= 1);
    assert!(!entries.is_empty());
    let export = audit
        .export(&filter, ExportFormat::Csv, 100)
        .await
        .expect("audit export failed");
    assert!(export.body.contains("it-runner"));

    // DELETE user
    println!("  delete user");
    let removed = radius.delete_user(&username).await.expect("delete failed");
    assert!(removed >= 3, "expected check+reply+group rows, got {removed}");
    assert!(radius.get_user(&username).await.is_err());

    println!("  lifecycle OK");
}
