use std::{net::Ipv4Addr, process::ExitCode, sync::Arc};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use todo_service::config::Config;
use todo_service::db::Database;
use todo_service::service::TodoService;
use todo_service::{create_app, server, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let db = match Database::connect(&config.database_uri, config.connect_timeout).await {
        Ok(db) => db,
        Err(err) => {
            error!(uri = %config.database_uri, "Failed to connect to the datastore: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!(uri = %config.database_uri, "Datastore connected");

    let state = AppState {
        todos: TodoService::new(&db),
        base_path: Arc::new(config.base_path.clone()),
        static_dir: Arc::new(config.static_dir.clone()),
        request_timeout: config.request_timeout,
    };
    let app = create_app(state);
    let addr = (Ipv4Addr::UNSPECIFIED, config.port);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(port = config.port, "Failed to bind: {err}");
            return ExitCode::FAILURE;
        }
    };

    info!("running on {addr:?}");

    let served = server::serve(
        listener,
        app,
        server::shutdown_signal(),
        config.shutdown_timeout,
    )
    .await;

    if let Err(err) = db.close().await {
        error!("Failed to close the datastore: {err}");
    }

    match served {
        Ok(()) => {
            info!("Server shutdown successfully");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Server failed: {err}");
            ExitCode::FAILURE
        }
    }
}
