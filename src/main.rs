use std::sync::Arc;

use todos_api::{
    application::todo_service::TodoServiceImpl,
    domain::repository::TodoRepository,
    http::{routes::todos, routing},
    infrastructure::{settings::Settings, sqlite_repo::{is_memory_url, SqliteTodoRepository}},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Arc::new(Settings::from_env()?);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| settings.default_log_filter().into()))
        .init();
    tracing::info!(environment = %settings.environment, debug = settings.debug, "settings loaded");

    // Ensure SQLite file can be created/opened when using a file-backed URL
    prepare_sqlite_file(&settings.database_url)?;
    let repo = SqliteTodoRepository::connect(&settings.database_url).await?;
    repo.init().await?;
    tracing::info!(database_url = %settings.database_url, "database ready");

    let service = TodoServiceImpl::new(repo);
    let todos_router = todos::router(todos::AppState::new(service, Arc::clone(&settings)));
    let router = routing::app(&settings, todos_router);

    let addr = settings.bind_addr;
    tracing::info!(%addr, "listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::ctrl_c;
    let _ = ctrl_c().await;
    tracing::info!("shutdown");
}

fn prepare_sqlite_file(database_url: &str) -> anyhow::Result<()> {
    if is_memory_url(database_url) { return Ok(()); }
    if let Some(path) = database_url.strip_prefix("sqlite://") {
        // Drop query options such as `?mode=rwc`
        let path = path.split('?').next().unwrap_or(path);
        // On Windows, absolute paths may look like /C:/path; strip the leading slash
        let path = if cfg!(windows) && path.len() >= 3 && path.as_bytes()[0] == b'/' && path.as_bytes()[2] == b':' {
            &path[1..]
        } else {
            path
        };
        use std::{fs, path::Path, fs::OpenOptions};
        let p = Path::new(path);
        if let Some(parent) = p.parent() { if !parent.as_os_str().is_empty() { fs::create_dir_all(parent)?; } }
        if !p.exists() {
            let _ = OpenOptions::new().create(true).append(true).open(p)?;
        }
    }
    Ok(())
}
