//! Leadflow Server
//!
//! HTTP surface of the lead engine. Loads the TOML configuration, seeds the
//! catalog (pipelines, members, distribution rules, forms) into the SQLite
//! store, wires the intake coordinator to its collaborators and serves the
//! axum router. The temperature sweep runs alongside as a background task.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;

use config::{ConfigError, ServerConfig};
use handlers::{create_router, AppState};
use leadflow_distribution::RoundRobinAllocator;
use leadflow_intake::{CollaboratorError, HttpGeoLookup, IntakeCoordinator, WebhookNotifier};
use leadflow_store::{SqliteStore, StoreError};
use leadflow_sweeper::SweepWorker;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Store could not be opened or seeded
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An HTTP collaborator could not be built
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Counts of seeded catalog entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Pipelines written
    pub pipelines: usize,
    /// Members written
    pub members: usize,
    /// Distribution rules written
    pub rules: usize,
    /// Forms written
    pub forms: usize,
}

/// Write the configured catalog into the store
///
/// Entries are upserted, so re-seeding an existing database updates it in
/// place. Rotation cursors already persisted are kept.
pub fn seed_catalog(store: &SqliteStore, config: &ServerConfig) -> Result<SeedSummary, ServerError> {
    let mut summary = SeedSummary::default();

    for pipeline_config in &config.pipelines {
        store.upsert_pipeline(&pipeline_config.to_pipeline()?)?;
        summary.pipelines += 1;

        for member in pipeline_config.to_members()? {
            store.upsert_member(&pipeline_config.id, &member)?;
            summary.members += 1;
        }

        if let Some(rule) = pipeline_config.to_rule()? {
            store.upsert_distribution_rule(&rule)?;
            summary.rules += 1;
        }
    }

    for form in &config.forms {
        store.upsert_form(&form.to_definition()?)?;
        summary.forms += 1;
    }

    info!(
        pipelines = summary.pipelines,
        members = summary.members,
        rules = summary.rules,
        forms = summary.forms,
        "Seeded catalog"
    );
    Ok(summary)
}

/// Open the store, seed it and build the request state
pub fn build_state(config: &ServerConfig) -> Result<AppState, ServerError> {
    config.validate()?;

    let store = Arc::new(SqliteStore::new(&config.server.database_path)?);
    seed_catalog(&store, config)?;

    let thresholds = config
        .temperature
        .thresholds()
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let allocator = Arc::new(RoundRobinAllocator::new(Arc::clone(&store), config.distribution.clone()));
    let timeout = config.intake.side_effect_timeout();

    let mut coordinator = IntakeCoordinator::new(Arc::clone(&store), allocator, config.intake.clone(), thresholds);
    if let Some(url) = &config.intake.notification_webhook {
        info!("Notification webhook: {}", url);
        coordinator = coordinator.with_notifier(Arc::new(WebhookNotifier::new(url.clone(), timeout)?));
    }
    if let Some(url) = &config.intake.geo_lookup_url {
        info!("Geo lookup: {}", url);
        coordinator = coordinator.with_geo_lookup(Arc::new(HttpGeoLookup::new(url.clone(), timeout)?));
    }

    Ok(AppState {
        coordinator: Arc::new(coordinator),
        store,
    })
}

/// Start the HTTP server
///
/// Builds the state, starts the sweep worker and serves until Ctrl+C. Side
/// effects still in flight are awaited before returning.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    info!("Starting Leadflow server");
    info!("Bind address: {}", config.bind_addr());
    info!("Database: {}", config.server.database_path);

    let state = build_state(&config)?;
    let coordinator = Arc::clone(&state.coordinator);

    let mut worker = SweepWorker::new(config.sweeper.clone(), coordinator.thresholds().clone());
    let sweep_store = Arc::clone(&state.store);
    let sweeper = tokio::spawn(async move {
        if let Err(e) = worker.run(sweep_store).await {
            tracing::error!(error = %e, "Sweep worker stopped");
        }
    });

    let app = create_router(state);
    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Server listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    info!("Waiting for pending side effects");
    coordinator.drain_side_effects().await;
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Sweep worker task failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_domain::traits::{DistributionRuleStore, FormRegistry, PipelineRegistry};

    #[test]
    fn test_seed_catalog() {
        let config = ServerConfig::default_test_config();
        let store = SqliteStore::new(":memory:").unwrap();

        let summary = seed_catalog(&store, &config).unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                pipelines: 1,
                members: 2,
                rules: 1,
                forms: 1
            }
        );

        assert!(store.pipeline("sales").unwrap().is_some());
        assert_eq!(store.members("sales").unwrap().len(), 2);
        assert!(store.distribution_rule("sales").unwrap().is_some());
        assert_eq!(store.form("contact").unwrap().unwrap().required_fields, vec!["email"]);
    }

    #[test]
    fn test_reseed_keeps_cursor() {
        let config = ServerConfig::default_test_config();
        let store = SqliteStore::new(":memory:").unwrap();
        seed_catalog(&store, &config).unwrap();
        assert!(store.compare_and_swap_cursor("sales", 0, 1).unwrap());

        seed_catalog(&store, &config).unwrap();
        assert_eq!(store.distribution_rule("sales").unwrap().unwrap().rotation_cursor, 1);
    }

    #[test]
    fn test_build_state_rejects_invalid_config() {
        let mut config = ServerConfig::default_test_config();
        config.intake.persistence_attempts = 0;
        assert!(matches!(build_state(&config), Err(ServerError::Config(_))));
    }
}
