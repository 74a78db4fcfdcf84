//! Sprachnachricht-Service – Upload-Pipeline und Leseoperationen
//!
//! Die Upload-Pipeline beruehrt zwei Speichersysteme in fester
//! Reihenfolge: erst der Blob, dann die Metadaten-Zeile. Schlaegt der
//! Metadaten-Insert fehl, wird der Blob best-effort unter einer
//! eigenen Deadline wieder geloescht – ein Blob ohne Zeile ist
//! tolerierter Muell, eine Zeile ohne Blob waere ein Invariantenbruch.
//!
//! Der Fanout am Ende ist nicht-blockierend und still: kein Hub heisst
//! niemand verbunden, und Zustellprobleme degradieren zu Zaehlern.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use funkraum_core::{FunkraumError, RaumId, Result};
use funkraum_db::models::{NeueSprachnachricht, SprachnachrichtRecord};
use funkraum_db::{RaumRepository, SprachnachrichtRepository};
use funkraum_realtime::{Ereignis, VerbindungsManager};
use funkraum_storage::{blob_schluessel, AudioFormat, BlobMetadaten, BlobStore};

use crate::types::{NeuerUpload, SprachnachrichtMitUrl};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Maximale Upload-Groesse (Formular inklusive Audiodaten)
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Zulaessige Aufnahmedauer in Sekunden
pub const MIN_DAUER_SEKUNDEN: i32 = 1;
pub const MAX_DAUER_SEKUNDEN: i32 = 15;

/// Gueltigkeit vorsignierter Abspiel-URLs
pub const URL_GUELTIGKEIT: Duration = Duration::from_secs(3600);

/// Eigene Deadline fuer das kompensierende Blob-Loeschen
const AUFRAEUM_DEADLINE: Duration = Duration::from_secs(3);

/// Pagination-Grenzen fuer die Raum-Historie
pub const STANDARD_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// Fanout-Schnittstelle
// ---------------------------------------------------------------------------

/// Nicht-blockierender Ereignis-Fanout in einen Raum
///
/// Entkoppelt die Pipeline vom Echtzeit-Subsystem; produktiv steckt der
/// [`VerbindungsManager`] dahinter.
pub trait EreignisVerteiler: Send + Sync {
    /// Reiht ein Ereignis ein; false wenn niemand erreichbar war
    fn senden(&self, raum_id: RaumId, ereignis: Ereignis) -> bool;
}

impl EreignisVerteiler for VerbindungsManager {
    fn senden(&self, raum_id: RaumId, ereignis: Ereignis) -> bool {
        VerbindungsManager::senden(self, raum_id, ereignis)
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Service fuer Upload, Abruf und Loeschen von Sprachnachrichten
pub struct SprachnachrichtService<N, R, B, V>
where
    N: SprachnachrichtRepository,
    R: RaumRepository,
    B: BlobStore,
    V: EreignisVerteiler,
{
    nachrichten: Arc<N>,
    raeume: Arc<R>,
    blobs: Arc<B>,
    verteiler: Arc<V>,
    db_deadline: Duration,
}

impl<N, R, B, V> SprachnachrichtService<N, R, B, V>
where
    N: SprachnachrichtRepository,
    R: RaumRepository,
    B: BlobStore,
    V: EreignisVerteiler,
{
    /// Erstellt einen neuen Service
    pub fn neu(
        nachrichten: Arc<N>,
        raeume: Arc<R>,
        blobs: Arc<B>,
        verteiler: Arc<V>,
        db_deadline: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            nachrichten,
            raeume,
            blobs,
            verteiler,
            db_deadline,
        })
    }

    /// Nimmt eine Sprachnachricht an: validieren, Blob ablegen,
    /// Metadaten schreiben, Fanout anstossen
    pub async fn hochladen(&self, upload: NeuerUpload) -> Result<SprachnachrichtMitUrl> {
        // --- Validierung ---
        if upload.daten.len() > MAX_UPLOAD_BYTES {
            return Err(FunkraumError::validierung_mit_details(
                "audio file exceeds the 5 MiB limit",
                serde_json::json!({ "max_bytes": MAX_UPLOAD_BYTES, "got_bytes": upload.daten.len() }),
            ));
        }
        if upload.dauer_sekunden < MIN_DAUER_SEKUNDEN || upload.dauer_sekunden > MAX_DAUER_SEKUNDEN
        {
            return Err(FunkraumError::validierung_mit_details(
                "duration_seconds must be between 1 and 15",
                serde_json::json!({ "duration_seconds": upload.dauer_sekunden }),
            ));
        }
        if upload.daten.is_empty() {
            return Err(FunkraumError::validierung("Audio file is required"));
        }

        // --- Autorisierung ---
        self.mitgliedschaft_pruefen(upload.raum_id, upload.sender_id)
            .await?;

        // --- Format & Identitaet ---
        let format =
            AudioFormat::erkennen(upload.dateiname.as_deref(), upload.content_type.as_deref());
        let id = Uuid::new_v4();
        let jetzt = Utc::now();
        let schluessel = blob_schluessel(jetzt, id, format);

        tracing::debug!(
            nachricht_id = %id,
            raum_id = %upload.raum_id,
            sender_id = %upload.sender_id,
            dauer = upload.dauer_sekunden,
            bytes = upload.daten.len(),
            format = format.endung(),
            "Sprachnachricht wird hochgeladen"
        );

        // --- Blob zuerst ---
        self.blobs
            .put(
                &schluessel,
                upload.daten,
                format.mime_typ(),
                BlobMetadaten {
                    message_id: id,
                    hochgeladen_am: jetzt,
                },
            )
            .await
            .map_err(|e| {
                tracing::error!(nachricht_id = %id, fehler = %e, "Blob-Upload fehlgeschlagen");
                FunkraumError::infrastruktur("Failed to store audio file")
            })?;

        // --- Metadaten danach, mit Kompensation ---
        let einfuegen = self.nachrichten.erstellen(NeueSprachnachricht {
            id,
            room_id: upload.raum_id,
            sender_id: upload.sender_id,
            blob_key: &schluessel,
            duration_seconds: upload.dauer_sekunden,
            created_at: jetzt,
        });

        let record = match tokio::time::timeout(self.db_deadline, einfuegen).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                tracing::error!(nachricht_id = %id, fehler = %e, "Metadaten-Insert fehlgeschlagen");
                self.blob_aufraeumen(&schluessel).await;
                return Err(FunkraumError::infrastruktur("Failed to save message metadata"));
            }
            Err(_) => {
                tracing::error!(nachricht_id = %id, "Metadaten-Insert in Deadline gelaufen");
                self.blob_aufraeumen(&schluessel).await;
                return Err(FunkraumError::infrastruktur("Failed to save message metadata"));
            }
        };

        // --- Presign (nicht fatal) ---
        let url = self.url_ausstellen(&schluessel, id).await;

        // --- Fanout, nicht-blockierend und still ---
        self.verteiler.senden(
            RaumId::from(upload.raum_id),
            Ereignis::neue_sprachnachricht(
                record.id.into(),
                record.sender_id.into(),
                record.duration_seconds,
                url.clone(),
            ),
        );

        tracing::info!(
            nachricht_id = %record.id,
            raum_id = %record.room_id,
            blob_key = %record.blob_key,
            "Sprachnachricht gespeichert"
        );

        Ok(SprachnachrichtMitUrl {
            nachricht: record,
            url,
        })
    }

    /// Raum-Historie, neueste zuerst, mit frischen Abspiel-URLs
    pub async fn raum_nachrichten(
        &self,
        raum_id: Uuid,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<SprachnachrichtMitUrl>> {
        self.mitgliedschaft_pruefen(raum_id, user_id).await?;

        let limit = limit.unwrap_or(STANDARD_LIMIT).clamp(1, MAX_LIMIT);
        let offset = offset.unwrap_or(0).max(0);

        let records = tokio::time::timeout(
            self.db_deadline,
            self.nachrichten.fuer_raum(raum_id, limit, offset),
        )
        .await
        .map_err(|_| FunkraumError::infrastruktur("Database deadline exceeded"))?
        .map_err(db_fehler)?;

        let mut ergebnis = Vec::with_capacity(records.len());
        for record in records {
            let url = self.url_ausstellen(&record.blob_key, record.id).await;
            ergebnis.push(SprachnachrichtMitUrl {
                nachricht: record,
                url,
            });
        }

        Ok(ergebnis)
    }

    /// Einzelne Sprachnachricht samt Abspiel-URL
    pub async fn nachricht_laden(
        &self,
        nachricht_id: Uuid,
        user_id: Uuid,
    ) -> Result<SprachnachrichtMitUrl> {
        let record = self.record_laden(nachricht_id).await?;

        self.mitgliedschaft_pruefen(record.room_id, user_id).await?;

        let url = self.url_ausstellen(&record.blob_key, record.id).await;
        Ok(SprachnachrichtMitUrl {
            nachricht: record,
            url,
        })
    }

    /// Loescht eine Sprachnachricht; nur der Absender darf das
    ///
    /// Der Blob wird zuerst geloescht (Fehler werden nur geloggt – ein
    /// verwaister Blob ist tolerierbar), danach die Metadaten-Zeile.
    pub async fn nachricht_loeschen(&self, nachricht_id: Uuid, user_id: Uuid) -> Result<()> {
        let record = self.record_laden(nachricht_id).await?;

        if record.sender_id != user_id {
            return Err(FunkraumError::zugriff_verweigert(
                "You can only delete your messages",
            ));
        }

        if let Err(e) = self.blobs.delete(&record.blob_key).await {
            tracing::error!(
                nachricht_id = %nachricht_id,
                blob_key = %record.blob_key,
                fehler = %e,
                "Blob-Loeschen fehlgeschlagen, Metadaten werden trotzdem entfernt"
            );
        }

        let geloescht = tokio::time::timeout(
            self.db_deadline,
            self.nachrichten.loeschen(nachricht_id),
        )
        .await
        .map_err(|_| FunkraumError::infrastruktur("Database deadline exceeded"))?
        .map_err(db_fehler)?;

        if !geloescht {
            return Err(FunkraumError::nicht_gefunden("Message not found"));
        }

        tracing::info!(nachricht_id = %nachricht_id, von = %user_id, "Sprachnachricht geloescht");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    /// Mitgliedschafts-Probe: false -> 403, Probe-Fehler -> 500
    async fn mitgliedschaft_pruefen(&self, raum_id: Uuid, user_id: Uuid) -> Result<()> {
        let mitglied = tokio::time::timeout(
            self.db_deadline,
            self.raeume.ist_mitglied(raum_id, user_id),
        )
        .await
        .map_err(|_| FunkraumError::infrastruktur("Membership check timed out"))?
        .map_err(|e| {
            tracing::error!(raum_id = %raum_id, user_id = %user_id, fehler = %e, "Mitgliedschafts-Probe fehlgeschlagen");
            FunkraumError::infrastruktur("Membership check failed")
        })?;

        if !mitglied {
            return Err(FunkraumError::zugriff_verweigert(
                "You are not a member of this room",
            ));
        }
        Ok(())
    }

    async fn record_laden(&self, nachricht_id: Uuid) -> Result<SprachnachrichtRecord> {
        tokio::time::timeout(self.db_deadline, self.nachrichten.laden(nachricht_id))
            .await
            .map_err(|_| FunkraumError::infrastruktur("Database deadline exceeded"))?
            .map_err(db_fehler)?
            .ok_or_else(|| FunkraumError::nicht_gefunden("Message not found"))
    }

    /// Kompensation: Blob unter eigener Deadline wieder loeschen
    ///
    /// Laeuft bewusst nicht unter der Request-Deadline, damit das
    /// Aufraeumen auch bei abgebrochenem Request noch stattfindet.
    async fn blob_aufraeumen(&self, schluessel: &str) {
        match tokio::time::timeout(AUFRAEUM_DEADLINE, self.blobs.delete(schluessel)).await {
            Ok(Ok(())) => {
                tracing::debug!(blob_key = %schluessel, "Verwaister Blob aufgeraeumt");
            }
            Ok(Err(e)) => {
                tracing::error!(blob_key = %schluessel, fehler = %e, "Kompensierendes Loeschen fehlgeschlagen");
            }
            Err(_) => {
                tracing::error!(blob_key = %schluessel, "Kompensierendes Loeschen in Deadline gelaufen");
            }
        }
    }

    /// Presign mit Fehlertoleranz: leerer String statt Fehler
    async fn url_ausstellen(&self, schluessel: &str, nachricht_id: Uuid) -> String {
        match self.blobs.presign_get(schluessel, URL_GUELTIGKEIT).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(
                    nachricht_id = %nachricht_id,
                    fehler = %e,
                    "Presign fehlgeschlagen, Antwort ohne URL"
                );
                String::new()
            }
        }
    }
}

fn db_fehler(e: funkraum_db::DbError) -> FunkraumError {
    FunkraumError::infrastruktur(e.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
