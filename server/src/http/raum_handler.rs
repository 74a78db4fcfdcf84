//! Raum-Endpunkte: CRUD, Beitreten, Verlassen
//!
//! Duenne Handler ueber dem `RaumRepository`; die Mitgliedschaft die
//! hier entsteht ist genau das Praedikat das Upgrade-Handler und
//! Upload-Pipeline spaeter abfragen.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use funkraum_core::FunkraumError;
use funkraum_db::models::RaumRecord;
use funkraum_db::RaumRepository;

use crate::error::{ApiFehler, ApiResult};
use crate::http::extractor::AngemeldeterBenutzer;
use crate::http::{mit_deadline, AppState};

#[derive(Debug, Deserialize)]
pub struct RaumAnlegenAnfrage {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RaumAntwort {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RaumRecord> for RaumAntwort {
    fn from(record: RaumRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RaumListeAntwort {
    pub rooms: Vec<RaumAntwort>,
    pub count: usize,
}

/// `POST /api/rooms` – der Ersteller wird automatisch Mitglied
pub async fn anlegen(
    State(state): State<AppState>,
    AngemeldeterBenutzer(claims): AngemeldeterBenutzer,
    Json(anfrage): Json<RaumAnlegenAnfrage>,
) -> ApiResult<(StatusCode, Json<RaumAntwort>)> {
    let name = anfrage.name.trim();
    if name.is_empty() {
        return Err(ApiFehler(FunkraumError::validierung(
            "Room name must not be empty",
        )));
    }

    let raum = mit_deadline(state.db_deadline, state.db.erstellen(name, claims.user_id)).await?;

    tracing::info!(raum_id = %raum.id, ersteller = %claims.user_id, "Raum angelegt");
    Ok((StatusCode::CREATED, Json(raum.into())))
}

/// `GET /api/rooms` – alle Raeume des angemeldeten Benutzers
pub async fn auflisten(
    State(state): State<AppState>,
    AngemeldeterBenutzer(claims): AngemeldeterBenutzer,
) -> ApiResult<Json<RaumListeAntwort>> {
    let raeume = mit_deadline(state.db_deadline, state.db.fuer_benutzer(claims.user_id)).await?;

    let rooms: Vec<RaumAntwort> = raeume.into_iter().map(Into::into).collect();
    let count = rooms.len();
    Ok(Json(RaumListeAntwort { rooms, count }))
}

/// `GET /api/rooms/{room_id}` – nur fuer Mitglieder
pub async fn laden(
    State(state): State<AppState>,
    AngemeldeterBenutzer(claims): AngemeldeterBenutzer,
    Path(room_id): Path<String>,
) -> ApiResult<Json<RaumAntwort>> {
    let raum_id = raum_id_parsen(&room_id)?;
    mitglied_pruefen(&state, raum_id, claims.user_id).await?;

    let raum = mit_deadline(state.db_deadline, state.db.laden(raum_id))
        .await?
        .ok_or_else(|| ApiFehler(FunkraumError::nicht_gefunden("Room not found")))?;

    Ok(Json(raum.into()))
}

/// `DELETE /api/rooms/{room_id}` – nur fuer Mitglieder
pub async fn loeschen(
    State(state): State<AppState>,
    AngemeldeterBenutzer(claims): AngemeldeterBenutzer,
    Path(room_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let raum_id = raum_id_parsen(&room_id)?;
    mitglied_pruefen(&state, raum_id, claims.user_id).await?;

    let geloescht = mit_deadline(state.db_deadline, state.db.loeschen(raum_id)).await?;
    if !geloescht {
        return Err(ApiFehler(FunkraumError::nicht_gefunden("Room not found")));
    }

    tracing::info!(raum_id = %raum_id, von = %claims.user_id, "Raum geloescht");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// `POST /api/rooms/{room_id}/join`
pub async fn beitreten(
    State(state): State<AppState>,
    AngemeldeterBenutzer(claims): AngemeldeterBenutzer,
    Path(room_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let raum_id = raum_id_parsen(&room_id)?;

    // Beitritt nur in existierende Raeume
    mit_deadline(state.db_deadline, state.db.laden(raum_id))
        .await?
        .ok_or_else(|| ApiFehler(FunkraumError::nicht_gefunden("Room not found")))?;

    mit_deadline(
        state.db_deadline,
        state.db.mitglied_hinzufuegen(raum_id, claims.user_id),
    )
    .await?;

    tracing::info!(raum_id = %raum_id, user_id = %claims.user_id, "Raum beigetreten");
    Ok(Json(serde_json::json!({ "joined": true })))
}

/// `POST /api/rooms/{room_id}/leave`
pub async fn verlassen(
    State(state): State<AppState>,
    AngemeldeterBenutzer(claims): AngemeldeterBenutzer,
    Path(room_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let raum_id = raum_id_parsen(&room_id)?;

    let entfernt = mit_deadline(
        state.db_deadline,
        state.db.mitglied_entfernen(raum_id, claims.user_id),
    )
    .await?;

    if !entfernt {
        return Err(ApiFehler(FunkraumError::nicht_gefunden(
            "You are not a member of this room",
        )));
    }

    tracing::info!(raum_id = %raum_id, user_id = %claims.user_id, "Raum verlassen");
    Ok(Json(serde_json::json!({ "left": true })))
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

pub(crate) fn raum_id_parsen(roh: &str) -> Result<Uuid, ApiFehler> {
    Uuid::parse_str(roh).map_err(|_| {
        ApiFehler(FunkraumError::validierung_mit_details(
            "Invalid room_id format",
            serde_json::json!({ "room_id": roh }),
        ))
    })
}

pub(crate) async fn mitglied_pruefen(
    state: &AppState,
    raum_id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiFehler> {
    let mitglied = tokio::time::timeout(
        state.db_deadline,
        state.db.ist_mitglied(raum_id, user_id),
    )
    .await
    .map_err(|_| {
        ApiFehler(FunkraumError::infrastruktur("Membership check timed out"))
    })?
    .map_err(|e| {
        tracing::error!(raum_id = %raum_id, user_id = %user_id, fehler = %e, "Mitgliedschafts-Probe fehlgeschlagen");
        ApiFehler(FunkraumError::infrastruktur("Membership check failed"))
    })?;

    if !mitglied {
        return Err(ApiFehler(FunkraumError::zugriff_verweigert(
            "You are not a member of this room",
        )));
    }
    Ok(())
}
