//! JWT-Token-Service (HS256)
//!
//! Zwei Token-Arten:
//! - **Access-Token**: kurzlebig, traegt `user_id`, `email`, `username`.
//! - **Refresh-Token**: langlebig, traegt nur das Subject (User-UUID).
//!
//! Ein Refresh-Token das als Access-Token praesentiert wird, wird an den
//! fehlenden Claims erkannt und abgelehnt.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Validierte Access-Token-Claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
}

/// Wire-Form der Access-Claims (Felder optional, damit ein fremdes oder
/// falsches Token sauber erkannt statt als Parse-Fehler gemeldet wird)
#[derive(Debug, Serialize, Deserialize)]
struct AccessClaimsWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    exp: i64,
    iat: i64,
}

/// Wire-Form der Refresh-Claims
#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaimsWire {
    sub: String,
    exp: i64,
    iat: i64,
}

/// Service fuer Token-Ausgabe und -Validierung
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Erstellt einen neuen TokenService mit symmetrischem Secret
    pub fn neu(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Stellt ein kurzlebiges Access-Token aus
    pub fn access_token_erstellen(
        &self,
        user_id: Uuid,
        email: &str,
        username: &str,
    ) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessClaimsWire {
            user_id: Some(user_id),
            email: Some(email.to_string()),
            username: Some(username.to_string()),
            exp: (now + self.access_ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signierung(e.to_string()))
    }

    /// Stellt ein langlebiges Refresh-Token aus
    pub fn refresh_token_erstellen(&self, user_id: Uuid) -> AuthResult<String> {
        let now = Utc::now();
        let claims = RefreshClaimsWire {
            sub: user_id.to_string(),
            exp: (now + self.refresh_ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signierung(e.to_string()))
    }

    /// Validiert ein Access-Token und gibt die Claims zurueck
    pub fn access_token_validieren(&self, token: &str) -> AuthResult<Claims> {
        let daten = decode::<AccessClaimsWire>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| AuthError::TokenUngueltig)?;

        let wire = daten.claims;
        match (wire.user_id, wire.email, wire.username) {
            (Some(user_id), Some(email), Some(username)) => Ok(Claims {
                user_id,
                email,
                username,
            }),
            // Signatur gueltig, aber Identitaets-Claims fehlen: das ist ein
            // Refresh-Token am falschen Endpunkt
            _ => Err(AuthError::FalscherTokenTyp),
        }
    }

    /// Validiert ein Refresh-Token und gibt die User-ID zurueck
    pub fn refresh_token_validieren(&self, token: &str) -> AuthResult<Uuid> {
        let daten = decode::<RefreshClaimsWire>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| AuthError::TokenUngueltig)?;

        Uuid::parse_str(&daten.claims.sub).map_err(|_| AuthError::TokenUngueltig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> TokenService {
        TokenService::neu("test-secret", Duration::minutes(15), Duration::days(7))
    }

    #[test]
    fn access_token_rundreise() {
        let service = test_service();
        let uid = Uuid::new_v4();

        let token = service
            .access_token_erstellen(uid, "alice@example.com", "alice")
            .unwrap();
        let claims = service.access_token_validieren(&token).unwrap();

        assert_eq!(claims.user_id, uid);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn refresh_token_rundreise() {
        let service = test_service();
        let uid = Uuid::new_v4();

        let token = service.refresh_token_erstellen(uid).unwrap();
        let geparst = service.refresh_token_validieren(&token).unwrap();

        assert_eq!(geparst, uid);
    }

    #[test]
    fn refresh_token_als_access_token_abgelehnt() {
        let service = test_service();
        let token = service.refresh_token_erstellen(Uuid::new_v4()).unwrap();

        let ergebnis = service.access_token_validieren(&token);
        assert!(matches!(ergebnis, Err(AuthError::FalscherTokenTyp)));
    }

    #[test]
    fn abgelaufenes_token_abgelehnt() {
        let service = TokenService::neu(
            "test-secret",
            Duration::minutes(-5),
            Duration::days(7),
        );
        let token = service
            .access_token_erstellen(Uuid::new_v4(), "a@b.c", "a")
            .unwrap();

        assert!(matches!(
            service.access_token_validieren(&token),
            Err(AuthError::TokenUngueltig)
        ));
    }

    #[test]
    fn fremdes_secret_abgelehnt() {
        let service = test_service();
        let fremd = TokenService::neu("anderes-secret", Duration::minutes(15), Duration::days(7));

        let token = fremd
            .access_token_erstellen(Uuid::new_v4(), "a@b.c", "a")
            .unwrap();

        assert!(matches!(
            service.access_token_validieren(&token),
            Err(AuthError::TokenUngueltig)
        ));
    }

    #[test]
    fn kaputtes_token_abgelehnt() {
        let service = test_service();
        assert!(service.access_token_validieren("kein.jwt.token").is_err());
    }
}
