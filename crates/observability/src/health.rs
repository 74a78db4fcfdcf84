//! Health-Check-Endpunkt
//!
//! `GET /health` – Status, Version, Uptime und DB-Verbindungsflag.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub db_connected: bool,
}

/// Geteilter Zustand fuer den Health-Handler
#[derive(Clone)]
pub struct HealthState {
    start: Arc<Instant>,
    db_verbunden: Arc<AtomicBool>,
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start: Arc::new(Instant::now()),
            db_verbunden: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn uptime_sekunden(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    pub fn db_verbunden(&self) -> bool {
        self.db_verbunden.load(Ordering::Relaxed)
    }

    pub fn db_status_setzen(&self, verbunden: bool) {
        self.db_verbunden.store(verbunden, Ordering::Relaxed);
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – Probe soll bei degraded DB nicht failen
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let db_connected = state.db_verbunden();

    let response = HealthResponse {
        status: if db_connected { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_sekunden(),
        db_connected,
    };

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_standard_verbunden() {
        let state = HealthState::neu();
        assert!(state.db_verbunden());
    }

    #[test]
    fn db_status_umschalten() {
        let state = HealthState::neu();
        state.db_status_setzen(false);
        assert!(!state.db_verbunden());
        state.db_status_setzen(true);
        assert!(state.db_verbunden());
    }

    #[test]
    fn health_response_serialisierung() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.3.0",
            uptime_seconds: 42,
            db_connected: true,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["uptime_seconds"], 42);
    }
}
