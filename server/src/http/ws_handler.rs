//! Socket-Upgrade-Handler
//!
//! `GET /api/ws?room_id=...` – authentifiziert den Upgrade-Request,
//! prueft die Mitgliedschaft und reicht den Socket an den
//! Verbindungs-Manager weiter.
//!
//! Der Token kommt aus dem `Authorization`-Header ODER dem
//! `token`-Query-Parameter: Browser koennen beim WebSocket-Handshake
//! keine eigenen Header setzen.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use funkraum_core::FunkraumError;
use funkraum_realtime::client::MAX_FRAME_BYTES;

use crate::error::{ApiFehler, ApiResult};
use crate::http::raum_handler::{mitglied_pruefen, raum_id_parsen};
use crate::http::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub room_id: Option<String>,
    pub token: Option<String>,
}

/// `GET /api/ws` – Upgrade auf WebSocket
pub async fn upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    // 400: Raum-ID fehlt oder ist kein UUID
    let room_id_roh = params.room_id.as_deref().ok_or_else(|| {
        ApiFehler(FunkraumError::validierung(
            "room_id query parameter is required",
        ))
    })?;
    let raum_id = raum_id_parsen(room_id_roh)?;

    // 401: Token fehlt oder ist ungueltig
    let token = token_ermitteln(&headers, params.token.as_deref()).ok_or_else(|| {
        ApiFehler(FunkraumError::authentifizierung(
            "Missing authorization token",
        ))
    })?;
    let claims = state.tokens.access_token_validieren(&token)?;

    // 403 / 500: Mitgliedschafts-Probe; bei 500 findet kein Upgrade statt
    mitglied_pruefen(&state, raum_id, claims.user_id).await?;

    tracing::info!(
        user_id = %claims.user_id,
        raum_id = %raum_id,
        username = %claims.username,
        "WebSocket-Verbindung wird aufgebaut"
    );

    let manager = state.manager.clone();
    Ok(ws
        .max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| async move {
            manager
                .verbindung_starten(
                    socket,
                    claims.user_id.into(),
                    claims.username,
                    raum_id.into(),
                )
                .await;
        }))
}

/// Zieht den Token aus Header oder Query-Parameter
///
/// Prioritaet: `Authorization: Bearer <token>` vor `?token=<token>`.
fn token_ermitteln(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(wert) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        let token = wert.strip_prefix("Bearer ").unwrap_or(wert);
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    query_token
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_aus_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));

        assert_eq!(token_ermitteln(&headers, None), Some("abc123".into()));
    }

    #[test]
    fn header_gewinnt_vor_query() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer kopf"));

        assert_eq!(
            token_ermitteln(&headers, Some("query")),
            Some("kopf".into())
        );
    }

    #[test]
    fn query_als_fallback() {
        // Browser koennen beim Upgrade keine Header setzen
        let headers = HeaderMap::new();
        assert_eq!(
            token_ermitteln(&headers, Some("aus-query")),
            Some("aus-query".into())
        );
    }

    #[test]
    fn header_ohne_bearer_praefix_wird_akzeptiert() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("nackt"));

        assert_eq!(token_ermitteln(&headers, None), Some("nackt".into()));
    }

    #[test]
    fn ohne_token_kommt_nichts() {
        let headers = HeaderMap::new();
        assert_eq!(token_ermitteln(&headers, None), None);
        assert_eq!(token_ermitteln(&headers, Some("")), None);
    }
}
