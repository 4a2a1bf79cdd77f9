use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use devkart_core::config::{AppConfig, LoadOptions};
use devkart_core::domain::cart::Cart;
use devkart_core::domain::order::Order;
use devkart_session::adapter::SessionAdapter;
use devkart_session::backends::ScriptedBackend;
use devkart_session::monitoring::NoopMonitoringSink;
use devkart_session::shared_cart::SharedCart;

use super::CommandResult;

/// Replay a recorded backend message script through the full cart pipeline
/// without touching the network: scripted transport, tool-call extraction
/// only, noop monitoring.
pub fn run(script: &Path) -> CommandResult {
    let raw = match fs::read_to_string(script) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("replay: could not read `{}`: {error}", script.display()),
            };
        }
    };

    let messages: Vec<Value> = match serde_json::from_str(&raw) {
        Ok(messages) => messages,
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!(
                    "replay: `{}` is not a JSON array of backend messages: {error}",
                    script.display()
                ),
            };
        }
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("replay: config validation failed: {error}"),
            };
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult {
                exit_code: 1,
                output: format!("replay: failed to initialize async runtime: {error}"),
            };
        }
    };

    let message_count = messages.len();
    let result = runtime.block_on(async move {
        let (checkout_tx, _) = broadcast::channel(16);
        let cart = SharedCart::new(checkout_tx);
        let mut notices = cart.subscribe();

        let mut adapter = SessionAdapter::video(
            ScriptedBackend::new(messages),
            config.catalog(),
            cart.clone(),
            Arc::new(NoopMonitoringSink),
        );

        adapter.run().await.map_err(|error| error.to_string())?;

        let mut orders = Vec::new();
        while let Ok(notice) = notices.try_recv() {
            orders.push(notice.order);
        }

        Ok::<(Cart, Vec<Order>), String>((cart.snapshot().await, orders))
    });

    match result {
        Ok((cart, orders)) => {
            CommandResult { exit_code: 0, output: render(message_count, &cart, &orders) }
        }
        Err(error) => CommandResult { exit_code: 1, output: format!("replay: {error}") },
    }
}

fn render(message_count: usize, cart: &Cart, orders: &[Order]) -> String {
    let mut lines = vec![format!("replay: processed {message_count} messages")];

    if cart.is_empty() {
        lines.push("cart: empty".to_string());
    } else {
        lines.push("cart:".to_string());
        for line in cart.lines() {
            lines.push(format!(
                "  - {} x{} @ ${} = ${}",
                line.name,
                line.quantity,
                line.unit_price,
                line.line_total()
            ));
        }
        lines.push(format!("cart total: ${}", cart.total()));
    }

    if orders.is_empty() {
        lines.push("orders: none".to_string());
    } else {
        lines.push("orders:".to_string());
        for order in orders {
            lines.push(format!(
                "  - {} total ${} ({} lines, placed {})",
                order.id.0,
                order.total,
                order.lines.len(),
                order.placed_at.to_rfc3339()
            ));
        }
    }

    lines.join("\n")
}
