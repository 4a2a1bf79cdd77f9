use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use devkart_session::shared_cart::SharedCart;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    pub llm_ready: bool,
    pub monitoring_ready: bool,
    pub cart: SharedCart,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub llm: HealthCheck,
    pub monitoring: HealthCheck,
    pub cart_lines: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Liveness plus a readiness report for the optional subsystems. A missing
/// LLM key or disabled monitoring never degrades the service as a whole: the
/// structured tool-call path works without either.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let llm = if state.llm_ready {
        HealthCheck { status: "ready", detail: "llm client configured".to_string() }
    } else {
        HealthCheck {
            status: "disabled",
            detail: "no llm api key; intent extraction unavailable".to_string(),
        }
    };

    let monitoring = if state.monitoring_ready {
        HealthCheck { status: "ready", detail: "transcript sink configured".to_string() }
    } else {
        HealthCheck { status: "disabled", detail: "monitoring disabled".to_string() }
    };

    let cart_lines = state.cart.snapshot().await.lines().len();

    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "devkart-server runtime initialized".to_string(),
        },
        llm,
        monitoring,
        cart_lines,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use tokio::sync::broadcast;

    use devkart_session::shared_cart::SharedCart;

    use crate::health::{health, HealthState};

    fn state(llm_ready: bool, monitoring_ready: bool) -> HealthState {
        let (checkout_tx, _) = broadcast::channel(4);
        HealthState { llm_ready, monitoring_ready, cart: SharedCart::new(checkout_tx) }
    }

    #[tokio::test]
    async fn health_reports_ready_subsystems() {
        let (status, Json(payload)) = health(State(state(true, true))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.llm.status, "ready");
        assert_eq!(payload.monitoring.status, "ready");
        assert_eq!(payload.cart_lines, 0);
    }

    #[tokio::test]
    async fn disabled_subsystems_do_not_degrade_the_service() {
        let (status, Json(payload)) = health(State(state(false, false))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.llm.status, "disabled");
        assert_eq!(payload.monitoring.status, "disabled");
        assert_eq!(payload.service.status, "ready");
    }
}
