use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;

use natours_auth::Mailer;
use natours_infra::{DocumentStore, HttpMailer, HttpMailerConfig, InMemoryDocumentStore, LogMailer, TourRepository};
use natours_observability::LogFormat;

use natours_api::{AppConfig, AppServices, Environment};

const MAIL_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(feature = "postgres")]
const DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env()?;
    natours_observability::init(match environment {
        Environment::Production => LogFormat::Json,
        Environment::Development => LogFormat::Pretty,
    });

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(?config, "configuration loaded");

    let store = open_store(&config).await?;
    let mailer = build_mailer(&config)?;

    if let Some(path) = &config.seed_tours_file {
        let drafts = natours_infra::load_tour_drafts(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?;
        let seeded = natours_infra::seed_tours(&TourRepository::new(store.clone()), drafts).await?;
        tracing::info!(seeded, path = %path.display(), "tours seeded");
    }

    let addr = config.listen_addr();
    let services = Arc::new(AppServices::new(store, mailer, config));
    let app = natours_api::build_app(services);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

#[cfg(feature = "postgres")]
async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match &config.database_url {
        Some(url) => {
            let store = natours_infra::PostgresDocumentStore::connect(url, DB_ACQUIRE_TIMEOUT)
                .await
                .context("failed to connect to the database")?;
            tracing::info!("connected to postgres");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryDocumentStore::new())),
    }
}

#[cfg(not(feature = "postgres"))]
async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if config.database_url.is_some() {
        anyhow::bail!("DATABASE is set but this binary was built without the `postgres` feature");
    }
    Ok(Arc::new(InMemoryDocumentStore::new()))
}

fn build_mailer(config: &AppConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    let Some(endpoint) = &config.mail.relay_url else {
        tracing::warn!("MAIL_RELAY_URL not set; outgoing mail will only be logged");
        return Ok(Arc::new(LogMailer));
    };

    let mailer = HttpMailer::new(HttpMailerConfig {
        endpoint: endpoint.clone(),
        token: config.mail.relay_token.clone(),
        from: config.mail.from.clone(),
        timeout: MAIL_TIMEOUT,
    })
    .context("failed to build the mail client")?;
    Ok(Arc::new(mailer))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received ctrl-c, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install the terminate handler");
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
