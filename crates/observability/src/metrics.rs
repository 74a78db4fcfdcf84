//! Prometheus-Metriken fuer Funkraum
//!
//! Registrierte Metriken:
//! - `funkraum_verbundene_clients` – Gauge: verbundene Sockets
//! - `funkraum_aktive_hubs` – Gauge: laufende Raum-Hubs
//! - `funkraum_ereignisse_gesendet_total` – Counter: eingereihte Frames
//! - `funkraum_ereignisse_verworfen_total` – Counter: verworfene Frames
//! - `funkraum_uploads_total` – Counter: angenommene Sprachnachrichten
//! - `funkraum_upload_bytes` – Histogram: Groesse der Audiodaten
//! - `funkraum_http_requests_total` – Counter: HTTP-Anfragen

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{
    Counter, Encoder, Gauge, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Funkraum-Prometheus-Metriken
#[derive(Clone)]
pub struct FunkraumMetriken {
    pub registry: Arc<Registry>,

    // Fanout
    pub verbundene_clients: Gauge,
    pub aktive_hubs: Gauge,
    pub ereignisse_gesendet: Counter,
    pub ereignisse_verworfen: Counter,

    // Upload-Pipeline
    pub uploads_total: Counter,
    pub upload_bytes: Histogram,

    // HTTP
    pub http_requests_total: IntCounterVec,
}

impl FunkraumMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let verbundene_clients = Gauge::with_opts(Opts::new(
            "funkraum_verbundene_clients",
            "Anzahl aktuell verbundener Sockets",
        ))?;
        registry.register(Box::new(verbundene_clients.clone()))?;

        let aktive_hubs = Gauge::with_opts(Opts::new(
            "funkraum_aktive_hubs",
            "Anzahl laufender Raum-Hubs",
        ))?;
        registry.register(Box::new(aktive_hubs.clone()))?;

        let ereignisse_gesendet = Counter::with_opts(Opts::new(
            "funkraum_ereignisse_gesendet_total",
            "Erfolgreich eingereihte Ereignis-Frames",
        ))?;
        registry.register(Box::new(ereignisse_gesendet.clone()))?;

        let ereignisse_verworfen = Counter::with_opts(Opts::new(
            "funkraum_ereignisse_verworfen_total",
            "Wegen voller Queues verworfene Ereignis-Frames",
        ))?;
        registry.register(Box::new(ereignisse_verworfen.clone()))?;

        let uploads_total = Counter::with_opts(Opts::new(
            "funkraum_uploads_total",
            "Angenommene Sprachnachricht-Uploads",
        ))?;
        registry.register(Box::new(uploads_total.clone()))?;

        let upload_bytes = Histogram::with_opts(
            HistogramOpts::new("funkraum_upload_bytes", "Groesse der Audiodaten in Bytes")
                .buckets(vec![
                    4096.0, 16384.0, 65536.0, 262144.0, 1048576.0, 5242880.0,
                ]),
        )?;
        registry.register(Box::new(upload_bytes.clone()))?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("funkraum_http_requests_total", "HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            verbundene_clients,
            aktive_hubs,
            ereignisse_gesendet,
            ereignisse_verworfen,
            uploads_total,
            upload_bytes,
            http_requests_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Axum-Router fuer den `/metrics`-Endpunkt
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(self.clone())
    }
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<FunkraumMetriken>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = FunkraumMetriken::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn gauges_und_counter() {
        let metriken = FunkraumMetriken::neu().unwrap();
        metriken.verbundene_clients.set(7.0);
        metriken.ereignisse_gesendet.inc_by(3.0);
        metriken.ereignisse_verworfen.inc();

        assert_eq!(metriken.verbundene_clients.get(), 7.0);
        assert_eq!(metriken.ereignisse_gesendet.get(), 3.0);
        assert_eq!(metriken.ereignisse_verworfen.get(), 1.0);
    }

    #[test]
    fn export_prometheus_format() {
        let metriken = FunkraumMetriken::neu().unwrap();
        metriken.uploads_total.inc();
        metriken.upload_bytes.observe(4096.0);
        metriken
            .http_requests_total
            .with_label_values(&["POST", "/api/messages", "201"])
            .inc();

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("funkraum_uploads_total"));
        assert!(output.contains("funkraum_http_requests_total"));
        assert!(output.contains("# HELP"));
    }
}
