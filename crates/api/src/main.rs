use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mvbot_engine::supervisor::{self, TimeoutPolicy};
use mvbot_engine::{JobEngine, LogNotifier, Notifier};
use mvbot_github::{CommentNotifier, GitHubClient};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mvbot_api::config::ServerConfig;
use mvbot_api::router::build_app_router;
use mvbot_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mvbot_api=debug,mvbot_engine=debug,mvbot_github=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Notifier ---
    let github = config
        .github_token
        .as_ref()
        .map(|token| Arc::new(GitHubClient::new(config.github_api_url.clone(), token.clone())));
    let notifier: Arc<dyn Notifier> = match &github {
        Some(client) => {
            tracing::info!(api_url = %config.github_api_url, "GitHub comment notifications enabled");
            Arc::new(CommentNotifier::new(Arc::clone(client)))
        }
        None => {
            tracing::info!("GITHUB_TOKEN not set, job notifications go to the log only");
            Arc::new(LogNotifier)
        }
    };

    // --- Job engine ---
    let registry = mvbot_worker::default_registry(config.simulation_step())
        .expect("Failed to build work function registry");
    let engine = JobEngine::new(registry, notifier);

    // --- Timeout supervisor ---
    let supervisor_cancel = CancellationToken::new();
    let supervisor_handle = config.job_timeout().map(|max_running| {
        let policy = TimeoutPolicy {
            max_running,
            check_interval: config.supervisor_interval(),
        };
        tokio::spawn(supervisor::run(
            engine.clone(),
            policy,
            supervisor_cancel.clone(),
        ))
    });

    // --- App state ---
    let state = AppState {
        engine: engine.clone(),
        config: Arc::new(config.clone()),
        github,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    supervisor_cancel.cancel();
    if let Some(handle) = supervisor_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Timeout supervisor stopped");
    }

    engine.shutdown(config.shutdown_timeout()).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM (on Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
