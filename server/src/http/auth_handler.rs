//! Auth-Endpunkte: Signup, Signin, Refresh
//!
//! Duenne Kollaborateure um den Token-Service und das
//! Benutzer-Repository; der Echtzeit-Kern konsumiert nur die
//! ausgestellten Access-Tokens.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use funkraum_auth::{passwort_hashen, passwort_verifizieren};
use funkraum_core::FunkraumError;
use funkraum_db::models::{BenutzerRecord, NeuerBenutzer};
use funkraum_db::BenutzerRepository;

use crate::error::{ApiFehler, ApiResult};
use crate::http::{mit_deadline, AppState};

/// Mindestlaenge fuer Passwoerter
const MIN_PASSWORT_LAENGE: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SignupAnfrage {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninAnfrage {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshAnfrage {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct BenutzerDaten {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<BenutzerRecord> for BenutzerDaten {
    fn from(record: BenutzerRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            username: record.username,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenAntwort {
    pub user: BenutzerDaten,
    pub access_token: String,
    pub refresh_token: String,
}

/// `POST /api/auth/signup`
pub async fn signup(
    State(state): State<AppState>,
    Json(anfrage): Json<SignupAnfrage>,
) -> ApiResult<(StatusCode, Json<TokenAntwort>)> {
    let email = anfrage.email.trim().to_ascii_lowercase();
    let username = anfrage.username.trim().to_string();

    if !email.contains('@') || email.len() < 3 {
        return Err(ApiFehler(FunkraumError::validierung_mit_details(
            "A valid email address is required",
            serde_json::json!({ "email": anfrage.email }),
        )));
    }
    if username.is_empty() {
        return Err(ApiFehler(FunkraumError::validierung(
            "Username must not be empty",
        )));
    }
    if anfrage.password.len() < MIN_PASSWORT_LAENGE {
        return Err(ApiFehler(FunkraumError::validierung_mit_details(
            "Password is too short",
            serde_json::json!({ "min_length": MIN_PASSWORT_LAENGE }),
        )));
    }

    let password_hash = passwort_hashen(&anfrage.password)?;

    let benutzer = mit_deadline(
        state.db_deadline,
        state.db.erstellen(NeuerBenutzer {
            email: &email,
            username: &username,
            password_hash: &password_hash,
        }),
    )
    .await?;

    tracing::info!(user_id = %benutzer.id, "Neuer Benutzer registriert");

    let antwort = token_antwort(&state, benutzer)?;
    Ok((StatusCode::CREATED, Json(antwort)))
}

/// `POST /api/auth/signin`
pub async fn signin(
    State(state): State<AppState>,
    Json(anfrage): Json<SigninAnfrage>,
) -> ApiResult<Json<TokenAntwort>> {
    let email = anfrage.email.trim().to_ascii_lowercase();

    let benutzer = mit_deadline(state.db_deadline, state.db.laden_nach_email(&email))
        .await?
        .ok_or_else(anmeldung_fehlgeschlagen)?;

    let korrekt = passwort_verifizieren(&anfrage.password, &benutzer.password_hash)?;
    if !korrekt {
        tracing::warn!(email = %email, "Fehlgeschlagener Anmeldeversuch");
        return Err(anmeldung_fehlgeschlagen());
    }

    tracing::info!(user_id = %benutzer.id, "Benutzer angemeldet");

    let antwort = token_antwort(&state, benutzer)?;
    Ok(Json(antwort))
}

/// `POST /api/auth/refresh`
pub async fn refresh(
    State(state): State<AppState>,
    Json(anfrage): Json<RefreshAnfrage>,
) -> ApiResult<Json<TokenAntwort>> {
    let user_id = state.tokens.refresh_token_validieren(&anfrage.refresh_token)?;

    let benutzer = mit_deadline(state.db_deadline, state.db.laden(user_id))
        .await?
        .ok_or_else(|| {
            ApiFehler(FunkraumError::authentifizierung("Invalid or expired token"))
        })?;

    let antwort = token_antwort(&state, benutzer)?;
    Ok(Json(antwort))
}

/// Stellt Access- und Refresh-Token fuer einen Benutzer aus
fn token_antwort(state: &AppState, benutzer: BenutzerRecord) -> ApiResult<TokenAntwort> {
    let access_token =
        state
            .tokens
            .access_token_erstellen(benutzer.id, &benutzer.email, &benutzer.username)?;
    let refresh_token = state.tokens.refresh_token_erstellen(benutzer.id)?;

    Ok(TokenAntwort {
        user: benutzer.into(),
        access_token,
        refresh_token,
    })
}

fn anmeldung_fehlgeschlagen() -> ApiFehler {
    ApiFehler(FunkraumError::authentifizierung("Invalid email or password"))
}
