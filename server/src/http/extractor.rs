//! Bearer-Token-Extractor
//!
//! Zieht den Access-Token aus dem `Authorization`-Header und validiert
//! ihn. Handler nehmen einfach `benutzer: AngemeldeterBenutzer`
//! entgegen; ohne gueltigen Token kommt der Request nie bei ihnen an.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use funkraum_auth::Claims;
use funkraum_core::FunkraumError;

use crate::error::ApiFehler;
use crate::http::AppState;

/// Der authentifizierte Benutzer des aktuellen Requests
#[derive(Debug, Clone)]
pub struct AngemeldeterBenutzer(pub Claims);

impl FromRequestParts<AppState> for AngemeldeterBenutzer {
    type Rejection = ApiFehler;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|wert| wert.to_str().ok())
            .ok_or_else(|| {
                ApiFehler(FunkraumError::authentifizierung(
                    "Missing authorization token",
                ))
            })?;

        let token = header.strip_prefix("Bearer ").unwrap_or(header);
        if token.is_empty() {
            return Err(ApiFehler(FunkraumError::authentifizierung(
                "Missing authorization token",
            )));
        }

        let claims = state.tokens.access_token_validieren(token)?;
        Ok(Self(claims))
    }
}
