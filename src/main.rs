mod app;
mod auth;
mod config;
mod error;
mod geocode;
mod identity;
mod mailer;
mod schema;
mod state;
mod stores;
mod users;

use crate::auth::password::hash_password;
use crate::users::repo::User;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "storemap=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = state::AppState::init().await?;

    // Bootstrap the administrator account once per process start.
    let admin_hash = hash_password(&state.config.admin_password)?;
    if User::ensure_admin(&state.db, &admin_hash).await? {
        tracing::info!("admin account created");
    } else {
        tracing::debug!("admin account already present");
    }
    if state.config.admin_password == "123456" {
        tracing::warn!("ADMIN_PASSWORD is not set; admin uses the default development password");
    }

    let app = app::build_app(state);
    app::serve(app).await
}
