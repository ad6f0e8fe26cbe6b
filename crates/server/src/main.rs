use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let workspace = std::env::var("STAGEGATE_WORKSPACE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./workspace"));
    let port: u16 = std::env::var("STAGEGATE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let state = server::state::AppState::new(&workspace);
    let app = server::create_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(
        "Server listening on {} (workspace: {})",
        listener.local_addr()?,
        workspace.display()
    );
    axum::serve(listener, app).await?;

    Ok(())
}
