mod bootstrap;
mod health;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;

use devkart_core::config::{AppConfig, LoadOptions};
use devkart_core::domain::cart::Cart;
use devkart_session::shared_cart::SharedCart;

fn init_logging(config: &AppConfig) {
    use devkart_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let mut app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState {
            llm_ready: app.llm_ready,
            monitoring_ready: app.monitoring_ready,
            cart: app.cart.clone(),
        },
    )
    .await?;

    spawn_checkout_listener(app.cart.clone());

    tracing::info!(
        event_name = "system.server.extraction_mode",
        mode = if app.llm_ready { "ai-inferred and tool-calls" } else { "tool-calls only" },
        "intent extraction mode initialized"
    );

    // The bundled adapters ride the noop transport: they start, drain an
    // empty stream, and return to idle. External integrations feed the same
    // adapters real messages in their own processes.
    app.voice.run().await?;
    app.video.run().await?;

    tracing::info!(
        event_name = "system.server.started",
        catalog_items = app.catalog.items().len(),
        "devkart-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        deadline_secs = app.config.server.graceful_shutdown_secs,
        "devkart-server stopping"
    );

    Ok(())
}

/// Order receipts: log the checkout and clear the shared cart once the
/// notice is acknowledged.
fn spawn_checkout_listener(cart: SharedCart) {
    let mut notices = cart.subscribe();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => {
                    tracing::info!(
                        event_name = "server.order_placed",
                        order_id = %notice.order.id.0,
                        total = %notice.order.total,
                        lines = notice.order.lines.len(),
                        "order receipt acknowledged; clearing cart"
                    );
                    cart.replace(Cart::empty()).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        event_name = "server.order_notices_lagged",
                        skipped,
                        "checkout listener fell behind; notices dropped"
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
