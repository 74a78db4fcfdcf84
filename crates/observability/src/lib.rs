//! funkraum-observability – Logging, Metriken, Health
//!
//! Buendelt die Betriebs-Sichtbarkeit: tracing-Initialisierung,
//! Prometheus-Metriken fuer Fanout und HTTP sowie den
//! Health-Check-Endpunkt.

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use logging::logging_initialisieren;
pub use metrics::FunkraumMetriken;
