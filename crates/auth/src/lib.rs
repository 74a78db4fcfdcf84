//! funkraum-auth – Token-Ausgabe und Passwort-Hashing
//!
//! Stellt den JWT-basierten Token-Service (Access- und Refresh-Tokens,
//! HS256) sowie Argon2id-Passwort-Hashing bereit. Der Echtzeit-Kern
//! konsumiert nur `TokenService::access_token_validieren`.

pub mod error;
pub mod password;
pub mod token;

pub use error::{AuthError, AuthResult};
pub use password::{passwort_hashen, passwort_verifizieren};
pub use token::{Claims, TokenService};
