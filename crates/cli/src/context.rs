//! Composition root: everything a command handler needs.

use std::sync::Arc;

use anyhow::Result;
use horde_client::api::ANONYMOUS_API_KEY;
use horde_client::{ErrorReporter, HordeApi, RatingsApi, TracingReporter};
use horde_db::DbPool;
use horde_pipeline::dashboard::Dashboard;
use horde_pipeline::events::EventBus;
use horde_pipeline::generation::GenerationLifecycle;
use horde_pipeline::interrogation::InterrogationLifecycle;
use horde_pipeline::outputs::OutputStore;
use horde_pipeline::rating::RatingLifecycle;
use horde_pipeline::session::PollConfig;
use horde_pipeline::settings::AppSettings;
use horde_pipeline::storage::open_storage;
use horde_pipeline::workers::WorkerMonitor;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;

pub struct AppContext {
    pub config: ClientConfig,
    pub pool: DbPool,
    pub settings: AppSettings,
    pub store: Arc<OutputStore>,
    pub events: Arc<EventBus>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub api: HordeApi,
    pub ratings: RatingsApi,
}

impl AppContext {
    /// Open storage, load settings and outputs, and build the API clients.
    pub async fn bootstrap(config: ClientConfig) -> Result<Self> {
        let reporter: Arc<dyn ErrorReporter> = Arc::new(TracingReporter);

        let storage = open_storage(&config.database_path, reporter.as_ref()).await?;
        if storage.imported > 0 {
            tracing::info!(count = storage.imported, "Moved legacy outputs into the outputs table");
        }

        let settings = AppSettings::load(&storage.pool).await?;
        let store = Arc::new(OutputStore::load(storage.pool.clone()).await?);

        let api_key = config
            .api_key
            .clone()
            .or_else(|| settings.api_key.clone())
            .unwrap_or_else(|| ANONYMOUS_API_KEY.to_string());
        let api = HordeApi::new(&config.api_url, &api_key, &config.client_agent);
        let ratings = RatingsApi::new(&config.ratings_url, &api_key, &config.client_agent);
        tracing::debug!(api_url = %config.api_url, anonymous = api.is_anonymous(), "Clients ready");

        Ok(Self {
            config,
            pool: storage.pool,
            settings,
            store,
            events: Arc::new(EventBus::default()),
            reporter,
            api,
            ratings,
        })
    }

    pub fn generation(&self) -> GenerationLifecycle {
        GenerationLifecycle::new(
            self.api.clone(),
            self.store.clone(),
            self.reporter.clone(),
            self.events.clone(),
        )
        .with_config(PollConfig {
            interval: self.config.generation_poll,
            max_wait: self.config.max_wait,
        })
    }

    pub fn interrogation(&self) -> InterrogationLifecycle {
        InterrogationLifecycle::new(self.api.clone(), self.reporter.clone(), self.events.clone())
            .with_config(PollConfig {
                interval: self.config.interrogation_poll,
                max_wait: self.config.max_wait,
            })
    }

    pub fn rating(&self) -> RatingLifecycle {
        RatingLifecycle::new(
            self.api.clone(),
            self.ratings.clone(),
            self.store.clone(),
            self.reporter.clone(),
            self.events.clone(),
        )
    }

    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(self.api.clone(), self.reporter.clone(), self.events.clone())
    }

    pub fn workers(&self) -> WorkerMonitor {
        WorkerMonitor::new(self.api.clone(), self.reporter.clone(), self.events.clone())
    }
}

/// A token that is cancelled on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let guard = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            guard.cancel();
        }
    });
    token
}
