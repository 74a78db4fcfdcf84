//! Passwort-Hashing mit Argon2id
//!
//! Hash-Ausgabe im PHC-Format, Verifikation gegen den gespeicherten
//! String. Parameter folgen den OWASP-Empfehlungen.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AuthError;

/// Hasht ein Passwort mit Argon2id und einem zufaelligen Salt
pub fn passwort_hashen(passwort: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(passwort.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswortHashing(e.to_string()))
}

/// Verifiziert ein Passwort gegen einen gespeicherten PHC-Hash
pub fn passwort_verifizieren(passwort: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::PasswortHashing(format!("Hash nicht lesbar: {e}")))?;

    match Argon2::default().verify_password(passwort.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswortHashing(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashen_und_verifizieren() {
        let hash = passwort_hashen("geheim123!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(passwort_verifizieren("geheim123!", &hash).unwrap());
    }

    #[test]
    fn falsches_passwort_abgelehnt() {
        let hash = passwort_hashen("richtig").unwrap();
        assert!(!passwort_verifizieren("falsch", &hash).unwrap());
    }

    #[test]
    fn gleiche_passwoerter_verschiedene_hashes() {
        let h1 = passwort_hashen("gleich").unwrap();
        let h2 = passwort_hashen("gleich").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn kaputter_hash_gibt_fehler() {
        assert!(passwort_verifizieren("egal", "kein-phc-string").is_err());
    }
}
