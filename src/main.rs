use mathtutor_backend::config::Config;
use mathtutor_backend::db::Database;
use mathtutor_backend::logging;
use mathtutor_backend::seed;
use mathtutor_backend::services::llm_provider::LLMProvider;
use mathtutor_backend::state::AppState;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    let _log_guard = logging::init_tracing(&config);

    let db = match Database::connect(&config.database_url, config.database_max_connections).await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!(error = %err, url = %config.database_url, "database initialization failed");
            std::process::exit(1);
        }
    };

    if let Some(path) = config.curriculum_seed_path.as_deref() {
        match seed::load_seed_file(path).await {
            Ok(curriculum) => {
                if let Err(err) = seed::seed_curriculum(&db, &curriculum).await {
                    tracing::error!(error = %err, "curriculum seeding failed");
                }
            }
            Err(err) => tracing::error!(error = %err, "curriculum seed file unusable"),
        }
    }

    let llm = LLMProvider::from_env();
    if !llm.is_available() {
        tracing::warn!("LLM_API_KEY not set; solving will fail and matching will use fallback goals");
    }
    if config.jwt_secret.is_none() {
        tracing::warn!("JWT_SECRET not set; login and protected routes are disabled");
    }

    let addr = config.bind_addr();
    let state = AppState::new(db.clone(), llm, config);
    let app = mathtutor_backend::create_app(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "bind listener failed");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "mathtutor-backend listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped, closing database");
    db.close().await;
    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
