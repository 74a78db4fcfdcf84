//! Fehlertypen fuer das Auth-Crate

use thiserror::Error;

/// Result-Alias fuer Auth-Operationen
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentifizierungs-Fehler
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token ungueltig oder abgelaufen")]
    TokenUngueltig,

    #[error("Access-Token erwartet, Refresh-Token erhalten")]
    FalscherTokenTyp,

    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    PasswortHashing(String),

    #[error("Token-Signierung fehlgeschlagen: {0}")]
    Signierung(String),
}
