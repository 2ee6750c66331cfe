//! TodoMVC API server.
//!
//! Run from repo root: `cargo run -p todo-server`
//! Settings come from the environment (and `.env`); see `todo_api::Settings`.

use todo_api::{app, AppState, Entity, Settings, Todo};
use tokio::net::TcpListener;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "unable to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("todo_api=info,tower_http=info")
                }),
        )
        .init();

    let settings = Settings::from_env()?;
    let addr = settings.bind_addr();
    tracing::info!(mode = ?settings.mode, database_url = %settings.database_url, "starting");

    let state = AppState::open(settings, vec![Todo::schema()]).await?;
    let router = app(state.clone());

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    state.close().await;
    Ok(())
}
