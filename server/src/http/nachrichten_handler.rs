//! Sprachnachricht-Endpunkte: Upload, Historie, Einzelabruf, Loeschen
//!
//! Der Upload nimmt ein Multipart-Formular (`room_id`,
//! `duration_seconds`, `audio`) entgegen und reicht es an die
//! Pipeline durch; die Groessengrenze haengt als Body-Limit am Router.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use funkraum_core::FunkraumError;
use funkraum_db::models::SprachnachrichtRecord;
use funkraum_voice::{NeuerUpload, SprachnachrichtMitUrl};

use crate::error::{ApiFehler, ApiResult};
use crate::http::extractor::AngemeldeterBenutzer;
use crate::http::raum_handler::raum_id_parsen;
use crate::http::AppState;

#[derive(Debug, Serialize)]
pub struct NachrichtDaten {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub blob_key: String,
    pub duration_seconds: i32,
    pub created_at: DateTime<Utc>,
}

impl From<SprachnachrichtRecord> for NachrichtDaten {
    fn from(record: SprachnachrichtRecord) -> Self {
        Self {
            id: record.id,
            room_id: record.room_id,
            sender_id: record.sender_id,
            blob_key: record.blob_key,
            duration_seconds: record.duration_seconds,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NachrichtMitUrlAntwort {
    pub message: NachrichtDaten,
    pub url: String,
}

impl From<SprachnachrichtMitUrl> for NachrichtMitUrlAntwort {
    fn from(wert: SprachnachrichtMitUrl) -> Self {
        Self {
            message: wert.nachricht.into(),
            url: wert.url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistorieAntwort {
    pub messages: Vec<NachrichtMitUrlAntwort>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct SeitenParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `POST /api/messages` – Multipart-Upload einer Sprachnachricht
pub async fn hochladen(
    State(state): State<AppState>,
    AngemeldeterBenutzer(claims): AngemeldeterBenutzer,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<NachrichtMitUrlAntwort>)> {
    let mut room_id_roh: Option<String> = None;
    let mut dauer_roh: Option<String> = None;
    let mut audio: Option<(Option<String>, Option<String>, Vec<u8>)> = None;

    while let Some(feld) = multipart
        .next_field()
        .await
        .map_err(|e| formular_fehler(e.to_string()))?
    {
        match feld.name() {
            Some("room_id") => {
                room_id_roh = Some(
                    feld.text()
                        .await
                        .map_err(|e| formular_fehler(e.to_string()))?,
                );
            }
            Some("duration_seconds") => {
                dauer_roh = Some(
                    feld.text()
                        .await
                        .map_err(|e| formular_fehler(e.to_string()))?,
                );
            }
            Some("audio") => {
                let dateiname = feld.file_name().map(str::to_string);
                let content_type = feld.content_type().map(str::to_string);
                let daten = feld
                    .bytes()
                    .await
                    .map_err(|e| formular_fehler(e.to_string()))?
                    .to_vec();
                audio = Some((dateiname, content_type, daten));
            }
            _ => {}
        }
    }

    let (room_id_roh, dauer_roh) = match (room_id_roh, dauer_roh) {
        (Some(r), Some(d)) => (r, d),
        _ => {
            return Err(ApiFehler(FunkraumError::validierung(
                "room_id and duration_seconds required",
            )));
        }
    };

    let raum_id = raum_id_parsen(&room_id_roh)?;

    let dauer: i32 = dauer_roh.trim().parse().map_err(|_| {
        ApiFehler(FunkraumError::validierung_mit_details(
            "duration_seconds must be between 1 and 15",
            serde_json::json!({ "duration_seconds": dauer_roh }),
        ))
    })?;

    let (dateiname, content_type, daten) = audio.ok_or_else(|| {
        ApiFehler(FunkraumError::validierung("Audio file is required"))
    })?;

    state.metriken.upload_bytes.observe(daten.len() as f64);

    let ergebnis = state
        .voice
        .hochladen(NeuerUpload {
            raum_id,
            sender_id: claims.user_id,
            dauer_sekunden: dauer,
            dateiname,
            content_type,
            daten,
        })
        .await?;

    state.metriken.uploads_total.inc();

    Ok((StatusCode::CREATED, Json(ergebnis.into())))
}

/// `GET /api/messages/room/{room_id}` – paginierte Raum-Historie
pub async fn raum_historie(
    State(state): State<AppState>,
    AngemeldeterBenutzer(claims): AngemeldeterBenutzer,
    Path(room_id): Path<String>,
    Query(seiten): Query<SeitenParams>,
) -> ApiResult<Json<HistorieAntwort>> {
    let raum_id = raum_id_parsen(&room_id)?;

    let nachrichten = state
        .voice
        .raum_nachrichten(raum_id, claims.user_id, seiten.limit, seiten.offset)
        .await?;

    let messages: Vec<NachrichtMitUrlAntwort> = nachrichten.into_iter().map(Into::into).collect();
    let count = messages.len();
    Ok(Json(HistorieAntwort { messages, count }))
}

/// `GET /api/messages/{message_id}` – Einzelabruf mit frischer URL
pub async fn laden(
    State(state): State<AppState>,
    AngemeldeterBenutzer(claims): AngemeldeterBenutzer,
    Path(message_id): Path<String>,
) -> ApiResult<Json<NachrichtMitUrlAntwort>> {
    let nachricht_id = nachricht_id_parsen(&message_id)?;

    let nachricht = state
        .voice
        .nachricht_laden(nachricht_id, claims.user_id)
        .await?;

    Ok(Json(nachricht.into()))
}

/// `DELETE /api/messages/{message_id}` – nur der Absender
pub async fn loeschen(
    State(state): State<AppState>,
    AngemeldeterBenutzer(claims): AngemeldeterBenutzer,
    Path(message_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let nachricht_id = nachricht_id_parsen(&message_id)?;

    state
        .voice
        .nachricht_loeschen(nachricht_id, claims.user_id)
        .await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

fn nachricht_id_parsen(roh: &str) -> Result<Uuid, ApiFehler> {
    Uuid::parse_str(roh).map_err(|_| {
        ApiFehler(FunkraumError::validierung_mit_details(
            "Invalid message ID",
            serde_json::json!({ "message_id": roh }),
        ))
    })
}

fn formular_fehler(grund: String) -> ApiFehler {
    ApiFehler(FunkraumError::validierung_mit_details(
        "File too large or form data is invalid",
        serde_json::json!({ "reason": grund }),
    ))
}
