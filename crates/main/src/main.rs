//! 主应用程序入口
//!
//! 加载配置、连接数据库、预置房间与管理员后启动 Axum Web API 服务。

use std::{sync::Arc, time::Duration};

use application::{services::AdminSeed, Clock, RandomUniqueIds, SessionGate, SystemClock};
use config::AppConfig;
use infrastructure::{Infrastructure, InfrastructureConfig};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, WebSettings};

/// 过期会话清理间隔
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(bind = %config.bind_address(), upload_dir = %config.uploads.dir.display(), "configuration loaded");

    let infra = Infrastructure::connect(InfrastructureConfig {
        database_url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        bcrypt_cost: config.server.bcrypt_cost,
        upload_dir: config.uploads.dir.clone(),
    })
    .await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(
        &infra,
        clock,
        Arc::new(RandomUniqueIds),
        &WebSettings::from_config(&config),
    );

    let seeded = state.rooms.seed_defaults().await?;
    let seeds: Vec<AdminSeed> = config
        .bootstrap
        .admins
        .iter()
        .map(|admin| AdminSeed {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password: admin.password.clone(),
        })
        .collect();
    let provisioned = state.identity.bootstrap_admins(&seeds).await?;
    tracing::info!(rooms = seeded, admins = provisioned, "bootstrap finished");

    tokio::spawn(purge_sessions(state.gate.clone()));

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;

    tracing::info!("聊天室服务器启动在 http://{}", config.bind_address());
    axum::serve(listener, app).await?;

    Ok(())
}

async fn purge_sessions(gate: Arc<SessionGate>) {
    let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
    loop {
        ticker.tick().await;
        if let Err(err) = gate.purge_expired().await {
            tracing::warn!(error = %err, "failed to purge expired sessions");
        }
    }
}
