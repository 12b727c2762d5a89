use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use pilot_client::app::{AppDeps, PilotApp};
use pilot_client::backend::{Backend, HttpBackend};
use pilot_client::cli;
use pilot_client::config::ClientConfig;
use pilot_client::identity::{FileIdentityStore, StaticHost};

/// Logs go to stderr (stdout is the UI), plus a daily-rolling file when
/// `PILOT_LOG_DIR` is set. The guard must live until exit to flush the file.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "pilot-client.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing(std::env::var_os("PILOT_LOG_DIR").map(PathBuf::from));

    let config = ClientConfig::from_env().context("Invalid configuration")?;

    eprintln!("Pilot client v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.api_base_url);
    eprintln!("   Identity store: {}", config.identity_path.display());

    let backend: Arc<dyn Backend> =
        Arc::new(HttpBackend::new(&config).context("Failed to build HTTP client")?);
    let deps = AppDeps {
        backend,
        identity_store: Arc::new(FileIdentityStore::new(config.identity_path.clone())),
        host: Arc::new(StaticHost(config.host_user_id.clone())),
    };
    let app = Arc::new(PilotApp::start(config, deps).await);
    eprintln!("   User: {} ({})", app.user(), app.identity_source());

    // The session stays usable offline; commands report their own failures.
    if let Err(e) = app.bootstrap().await {
        eprintln!("   Warning: {}", e.user_message());
    }
    eprintln!("   Type /help for commands, /quit to exit.\n");

    cli::run(app).await?;
    Ok(())
}
