use anyhow::{Context, Result};
use coach_platform::api::{create_routes, AppContext};
use coach_platform::config::{run_migrations, AppConfig, DatabaseConfig, DatabaseSeeder};
use coach_platform::services::{BackgroundJobService, BlobStorageService, EmailService};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let db_config = DatabaseConfig::from_env()?;
    let pool = db_config.create_pool().await?;
    info!(max_connections = db_config.max_connections, "Database pool ready");

    if config.run_migrations {
        run_migrations(&pool).await?;
        info!("Database migrations applied");
    }

    if config.seed_demo_data {
        if config.is_development() {
            DatabaseSeeder::new(pool.clone()).seed_all().await?;
        } else {
            warn!(environment = %config.environment, "SEED_DEMO_DATA ignored outside development");
        }
    }

    let email = match &config.smtp {
        Some(smtp) => Some(EmailService::new(smtp, &config.app_url)?),
        None => {
            info!("SMTP_HOST not set, outgoing email disabled");
            None
        }
    };

    let storage = match &config.s3_bucket {
        Some(bucket) => Some(BlobStorageService::from_env(bucket.clone()).await),
        None => {
            info!("S3_BUCKET not set, blob deletion disabled");
            None
        }
    };

    let ctx = AppContext::new(pool, &config, email, storage)?;

    let mut jobs = BackgroundJobService::new(ctx.swaps.clone(), ctx.events.clone()).await?;
    jobs.start().await?;

    let app = create_routes(ctx);

    let address = config.server_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Coach platform server starting on http://{}", address);
    info!("Health check available at http://{}/health", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    jobs.stop().await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
