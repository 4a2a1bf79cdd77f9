use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

use devkart_agent::extractor::IntentExtractor;
use devkart_agent::llm::{LlmError, OpenAiClient};
use devkart_core::config::{AppConfig, ConfigError, LoadOptions};
use devkart_core::domain::catalog::Catalog;
use devkart_session::adapter::SessionAdapter;
use devkart_session::backends::NoopBackend;
use devkart_session::monitoring::{HttpMonitoringSink, MonitoringSink, NoopMonitoringSink};
use devkart_session::shared_cart::SharedCart;

/// Fully wired application state: one shared cart and two session adapters
/// over it, each holding the monitoring sink they flush to on stop.
///
/// The adapters here ride the noop transport; the real media plumbing lives
/// outside this process and hands messages in over the same contract.
pub struct Application {
    pub config: AppConfig,
    pub catalog: Catalog,
    pub cart: SharedCart,
    pub voice: SessionAdapter<NoopBackend>,
    pub video: SessionAdapter<NoopBackend>,
    pub llm_ready: bool,
    pub monitoring_ready: bool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("llm client construction failed: {0}")]
    Llm(#[source] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let catalog = config.catalog();
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        items = catalog.items().len(),
        source = if config.catalog_items.is_some() { "config" } else { "builtin" },
        "catalog loaded"
    );

    let (checkout_tx, _) = broadcast::channel(16);
    let cart = SharedCart::new(checkout_tx);

    let monitoring: Arc<dyn MonitoringSink> = if config.monitoring.enabled {
        match HttpMonitoringSink::from_config(&config.monitoring) {
            Some(sink) => Arc::new(sink),
            None => Arc::new(NoopMonitoringSink),
        }
    } else {
        Arc::new(NoopMonitoringSink)
    };
    let monitoring_ready = config.monitoring.enabled && config.monitoring.api_key.is_some();

    // The voice adapter only gets an extractor when an LLM is configured;
    // without one it still records transcripts but never infers intents.
    // The video adapter relies on native tool calls and needs no model.
    let llm_ready = config.llm.api_key.is_some();
    let extractor = if llm_ready {
        let client = OpenAiClient::from_config(&config.llm).map_err(BootstrapError::Llm)?;
        Some(
            IntentExtractor::new(Arc::new(client), &catalog)
                .into_debounced(std::time::Duration::from_millis(config.llm.debounce_ms)),
        )
    } else {
        info!(
            event_name = "system.bootstrap.llm_disabled",
            "no llm api key configured; voice adapter runs without intent extraction"
        );
        None
    };
    let voice = SessionAdapter::voice(
        NoopBackend,
        extractor,
        catalog.clone(),
        cart.clone(),
        Arc::clone(&monitoring),
    );

    let video =
        SessionAdapter::video(NoopBackend, catalog.clone(), cart.clone(), Arc::clone(&monitoring));

    info!(
        event_name = "system.bootstrap.ready",
        llm_ready,
        monitoring_ready,
        "application bootstrap complete"
    );

    Ok(Application { config, catalog, cart, voice, video, llm_ready, monitoring_ready })
}
