//! Crowdfund - Core of a crowdfunding backend

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crowdfund::{
    config::Config,
    db::{
        self,
        repositories::{SqlxCampaignRepository, SqlxUserRepository},
    },
    services::{CampaignGallery, CredentialHasher, IdentityService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crowdfund=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting crowdfund core...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    // Build services
    let hasher = CredentialHasher::new(&config.hashing)?;
    let identity = IdentityService::new(SqlxUserRepository::boxed(pool.clone()), hasher);
    let gallery = CampaignGallery::new(SqlxCampaignRepository::boxed(pool.clone()));

    let campaigns = gallery.list_all().await?;
    tracing::info!("Gallery ready with {} campaigns", campaigns.len());
    tracing::info!(
        "Identity service ready (admin@localhost available: {})",
        identity.is_email_available("admin@localhost").await?
    );

    pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
