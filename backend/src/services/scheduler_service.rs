//! Background maintenance tasks.
//!
//! Runs periodic jobs: token-store sweeping, stale accounting-session
//! closure, and audit log retention.

use chrono::Utc;
use sqlx::MySqlPool;
use tokio::time::{interval, Duration};

use crate::config::Config;
use crate::models::audit_log::{AuditAction, AuditCategory, NewAuditLog};
use crate::services::audit_service::AuditService;
use crate::services::session_service::SessionService;
use crate::services::token_service::TokenStore;

/// Spawn all background tasks. Fire-and-forget: each loop logs failures and
/// keeps running.
pub fn spawn_all(db: MySqlPool, config: Config, store: TokenStore) {
    // Token store sweep (every 5 minutes)
    {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            let mut ticker = interval(Duration::from_secs(300));

            loop {
                ticker.tick().await;
                let (refresh, denied) = store.sweep(Utc::now());
                if refresh > 0 || denied > 0 {
                    tracing::debug!(
                        refresh_removed = refresh,
                        denylist_removed = denied,
                        outstanding = store.refresh_count(),
                        "Swept token store"
                    );
                }
            }
        });
    }

    // Stale session closure (hourly, when configured)
    if config.stale_session_hours > 0 {
        let db = db.clone();
        let hours = config.stale_session_hours;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let sessions = SessionService::new(db.clone());
            let audit = AuditService::new(db);
            let mut ticker = interval(Duration::from_secs(3600));

            loop {
                ticker.tick().await;
                match sessions.close_stale(hours).await {
                    Ok(0) => {}
                    Ok(closed) => {
                        tracing::info!(closed, stale_hours = hours, "Closed stale sessions");
                        audit
                            .record_best_effort(NewAuditLog::system(
                                AuditAction::SessionClose,
                                AuditCategory::Session,
                                Some(format!("{closed} stale sessions")),
                            ))
                            .await;
                    }
                    Err(e) => {
                        tracing::warn!("Stale session closure failed: {}", e);
                    }
                }
            }
        });
    }

    // Audit retention purge (daily, when configured)
    if config.audit_retention_days > 0 {
        let db = db.clone();
        let days = config.audit_retention_days;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(120)).await;
            let audit = AuditService::new(db);
            let mut ticker = interval(Duration::from_secs(24 * 3600));

            loop {
                ticker.tick().await;
                match audit.purge(days).await {
                    Ok(0) => {}
                    Ok(removed) => {
                        tracing::info!(removed, retention_days = days, "Purged audit entries");
                        audit
                            .record_best_effort(NewAuditLog::system(
                                AuditAction::Purge,
                                AuditCategory::Audit,
                                Some(format!("{removed} entries past retention")),
                            ))
                            .await;
                    }
                    Err(e) => {
                        tracing::warn!("Audit retention purge failed: {}", e);
                    }
                }
            }
        });
    }

    tracing::info!(
        stale_sessions = config.stale_session_hours > 0,
        audit_retention = config.audit_retention_days > 0,
        "Background schedulers started"
    );
}
