//! HTTP-Oberflaeche des Servers
//!
//! Ein Router, ein geteilter `AppState`, ein Fehleradapter. Die
//! Handler sind duenn: Eingaben parsen, Service rufen, Antwort formen.

pub mod auth_handler;
pub mod extractor;
pub mod nachrichten_handler;
pub mod raum_handler;
pub mod ws_handler;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, MatchedPath, Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use funkraum_auth::TokenService;
use funkraum_db::{DbResult, PostgresDb};
use funkraum_observability::{health_router, FunkraumMetriken, HealthState};
use funkraum_realtime::VerbindungsManager;
use funkraum_storage::S3BlobStore;
use funkraum_voice::service::MAX_UPLOAD_BYTES;
use funkraum_voice::SprachnachrichtService;

use crate::error::{ApiFehler, ApiResult};

/// Konkreter Service-Typ der Produktionsverdrahtung
pub type VoiceService =
    SprachnachrichtService<PostgresDb, PostgresDb, S3BlobStore, VerbindungsManager>;

/// Spielraum fuer Multipart-Rahmen ueber der eigentlichen Dateigrenze
const MULTIPART_SPIELRAUM: usize = 64 * 1024;

/// Geteilter Zustand aller Handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<PostgresDb>,
    pub tokens: Arc<TokenService>,
    pub manager: Arc<VerbindungsManager>,
    pub voice: Arc<VoiceService>,
    pub metriken: FunkraumMetriken,
    /// Deadline fuer einzelne Datenbank-Operationen
    pub db_deadline: Duration,
}

/// Fuehrt eine Repository-Operation unter der Request-Deadline aus
pub async fn mit_deadline<F, T>(deadline: Duration, operation: F) -> ApiResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| {
            ApiFehler(funkraum_core::FunkraumError::infrastruktur(
                "Database deadline exceeded",
            ))
        })?
        .map_err(ApiFehler::from)
}

/// Baut den kompletten Router inklusive Health und Metriken
pub fn router(state: AppState, health: HealthState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let metriken = state.metriken.clone();

    let api = Router::new()
        // Auth (externe Kollaborateure, duenn gehalten)
        .route("/api/auth/signup", post(auth_handler::signup))
        .route("/api/auth/signin", post(auth_handler::signin))
        .route("/api/auth/refresh", post(auth_handler::refresh))
        // Raeume
        .route(
            "/api/rooms",
            get(raum_handler::auflisten).post(raum_handler::anlegen),
        )
        .route(
            "/api/rooms/{room_id}",
            get(raum_handler::laden).delete(raum_handler::loeschen),
        )
        .route("/api/rooms/{room_id}/join", post(raum_handler::beitreten))
        .route("/api/rooms/{room_id}/leave", post(raum_handler::verlassen))
        // Sprachnachrichten
        .route("/api/messages", post(nachrichten_handler::hochladen))
        .route(
            "/api/messages/room/{room_id}",
            get(nachrichten_handler::raum_historie),
        )
        .route(
            "/api/messages/{message_id}",
            get(nachrichten_handler::laden).delete(nachrichten_handler::loeschen),
        )
        // Socket-Upgrade
        .route("/api/ws", get(ws_handler::upgrade))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_SPIELRAUM))
        .with_state(state);

    Router::new()
        .merge(api)
        .merge(health_router(health))
        .merge(metriken.router())
        .layer(axum::middleware::from_fn_with_state(
            metriken,
            metriken_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Zaehlt jede Anfrage nach Methode, Routen-Muster und Status
async fn metriken_middleware(
    State(metriken): State<FunkraumMetriken>,
    anfrage: Request,
    next: Next,
) -> Response {
    let methode = anfrage.method().to_string();
    // Routen-Muster statt roher Pfad, sonst explodiert die Kardinalitaet
    let pfad = anfrage
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let antwort = next.run(anfrage).await;

    metriken
        .http_requests_total
        .with_label_values(&[&methode, &pfad, antwort.status().as_str()])
        .inc();

    antwort
}
