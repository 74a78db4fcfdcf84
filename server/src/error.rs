//! HTTP-Fehleradapter
//!
//! Genau eine Stelle bildet die Fehlertaxonomie auf Statuscodes und
//! JSON-Koerper ab: `{"error": ..., "details"?: ..., "request_id": ...}`.
//! Ab Status 500 wird auf error geloggt, darunter auf warn; der
//! Broadcast-Pfad laeuft nie durch diesen Adapter.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use funkraum_auth::AuthError;
use funkraum_core::FunkraumError;
use funkraum_db::DbError;

/// Fehler an der HTTP-Grenze
#[derive(Debug)]
pub struct ApiFehler(pub FunkraumError);

impl From<FunkraumError> for ApiFehler {
    fn from(e: FunkraumError) -> Self {
        Self(e)
    }
}

impl From<AuthError> for ApiFehler {
    fn from(e: AuthError) -> Self {
        let kern = match e {
            AuthError::TokenUngueltig | AuthError::FalscherTokenTyp => {
                FunkraumError::authentifizierung("Invalid or expired token")
            }
            AuthError::PasswortHashing(grund) | AuthError::Signierung(grund) => {
                FunkraumError::intern(grund)
            }
        };
        Self(kern)
    }
}

impl From<DbError> for ApiFehler {
    fn from(e: DbError) -> Self {
        let kern = match &e {
            DbError::NichtGefunden(was) => FunkraumError::nicht_gefunden(was.clone()),
            _ if e.ist_eindeutigkeit() => FunkraumError::konflikt("Email is already taken"),
            _ => FunkraumError::infrastruktur(e.to_string()),
        };
        Self(kern)
    }
}

impl IntoResponse for ApiFehler {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4();

        let (status, details) = match &self.0 {
            FunkraumError::Validierung { details, .. } => {
                (StatusCode::BAD_REQUEST, details.clone())
            }
            FunkraumError::Authentifizierung(_) => (StatusCode::UNAUTHORIZED, None),
            FunkraumError::ZugriffVerweigert(_) => (StatusCode::FORBIDDEN, None),
            FunkraumError::NichtGefunden(_) => (StatusCode::NOT_FOUND, None),
            FunkraumError::Konflikt(_) => (StatusCode::CONFLICT, None),
            FunkraumError::Infrastruktur(_) | FunkraumError::Intern(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        if self.0.ist_serverfehler() {
            tracing::error!(
                request_id = %request_id,
                status = status.as_u16(),
                fehler = %self.0,
                "Anfrage fehlgeschlagen"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                status = status.as_u16(),
                fehler = %self.0,
                "Anfrage abgelehnt"
            );
        }

        let mut body = serde_json::json!({
            "error": self.0.to_string(),
            "request_id": request_id,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

/// Result-Alias fuer alle HTTP-Handler
pub type ApiResult<T> = Result<T, ApiFehler>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_von(fehler: FunkraumError) -> StatusCode {
        ApiFehler(fehler).into_response().status()
    }

    #[test]
    fn taxonomie_auf_statuscodes() {
        assert_eq!(
            status_von(FunkraumError::validierung("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_von(FunkraumError::authentifizierung("x")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_von(FunkraumError::zugriff_verweigert("x")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_von(FunkraumError::nicht_gefunden("x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_von(FunkraumError::konflikt("x")), StatusCode::CONFLICT);
        assert_eq!(
            status_von(FunkraumError::infrastruktur("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_von(FunkraumError::intern("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn auth_fehler_wird_401() {
        let fehler: ApiFehler = AuthError::TokenUngueltig.into();
        assert_eq!(fehler.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn eindeutigkeit_wird_409() {
        let fehler: ApiFehler = DbError::Eindeutigkeit("email".into()).into();
        assert_eq!(fehler.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn nicht_gefunden_wird_404() {
        let fehler: ApiFehler = DbError::nicht_gefunden("zeile").into();
        assert_eq!(fehler.into_response().status(), StatusCode::NOT_FOUND);
    }
}
