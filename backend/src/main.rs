use std::sync::Arc;

use clap::Parser;
use sqlx::mysql::MySqlPoolOptions;

use radius_console_backend::api::{self, AppState};
use radius_console_backend::config::Config;
use radius_console_backend::services::scheduler_service;
use radius_console_backend::services::token_service::{TokenService, TokenStore};
use radius_console_backend::services::user_service::UserService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::parse();
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "radius_console_backend=info,tower_http=info".into()),
        )
        .init();

    let db = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    tracing::info!("Connected to database");

    UserService::new(db.clone())
        .ensure_bootstrap_admin(
            &config.bootstrap_admin_username,
            config.bootstrap_admin_password.as_deref(),
            config.bcrypt_cost,
        )
        .await?;

    let store = TokenStore::new();
    let tokens = TokenService::new(&config, store.clone());
    scheduler_service::spawn_all(db.clone(), config.clone(), store);

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        tokens,
    });
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "radius-console listening");
    axum::serve(listener, app).await?;

    Ok(())
}
