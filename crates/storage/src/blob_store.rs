//! Blob-Store fuer Sprachaufnahmen
//!
//! Das `BlobStore`-Trait abstrahiert den konkreten Objektspeicher.
//! `S3BlobStore` spricht AWS S3 oder MinIO-kompatible Endpunkte an,
//! `InMemoryBlobStore` traegt Tests und lokale Entwicklung ohne
//! laufenden Objektspeicher.

use std::time::Duration;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Objekt-Metadaten die jeder Upload traegt
#[derive(Debug, Clone, Copy)]
pub struct BlobMetadaten {
    /// ID der zugehoerigen Sprachnachricht
    pub message_id: Uuid,
    /// Upload-Zeitpunkt (wird als RFC3339 abgelegt)
    pub hochgeladen_am: DateTime<Utc>,
}

/// Abstrakter Objektspeicher fuer Sprachaufnahmen
#[allow(async_fn_in_trait)]
pub trait BlobStore: Send + Sync {
    /// Objekt unter dem Schluessel ablegen
    async fn put(
        &self,
        schluessel: &str,
        daten: Vec<u8>,
        content_type: &str,
        metadaten: BlobMetadaten,
    ) -> StorageResult<()>;

    /// Objekt laden
    async fn get(&self, schluessel: &str) -> StorageResult<Vec<u8>>;

    /// Objekt loeschen
    async fn delete(&self, schluessel: &str) -> StorageResult<()>;

    /// Kurzlebige vorsignierte GET-URL ausstellen
    async fn presign_get(&self, schluessel: &str, ttl: Duration) -> StorageResult<String>;
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

/// Verbindungsdaten fuer den S3-kompatiblen Objektspeicher
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Endpunkt-URL; leer = AWS-Standardendpunkte
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub use_ssl: bool,
    pub bucket_name: String,
}

/// S3-Anbindung (AWS S3 oder MinIO)
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Erstellt den Client aus expliziter Konfiguration
    ///
    /// Ohne `access_key_id` wird die ambiente AWS-Konfiguration
    /// (Umgebung, Instance-Profil) verwendet; mit Schluessel und
    /// Endpoint laeuft der Client im Path-Style-Modus gegen MinIO.
    pub async fn verbinden(config: &S3Config) -> StorageResult<Self> {
        if config.bucket_name.is_empty() {
            return Err(StorageError::Konfiguration("bucket_name fehlt".into()));
        }

        let client = if config.access_key_id.is_empty() {
            let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
            Client::new(&aws_config)
        } else {
            let credentials = Credentials::new(
                config.access_key_id.clone(),
                config.secret_access_key.clone(),
                None,
                None,
                "funkraum-config",
            );

            let schema = if config.use_ssl { "https" } else { "http" };
            let endpoint = if config.endpoint.contains("://") {
                config.endpoint.clone()
            } else {
                format!("{schema}://{}", config.endpoint)
            };

            let s3_config = aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new("us-east-1"))
                .credentials_provider(credentials)
                .endpoint_url(endpoint)
                .force_path_style(true)
                .build();

            Client::from_conf(s3_config)
        };

        tracing::info!(bucket = %config.bucket_name, "S3-Blob-Store verbunden");

        Ok(Self {
            client,
            bucket: config.bucket_name.clone(),
        })
    }
}

impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        schluessel: &str,
        daten: Vec<u8>,
        content_type: &str,
        metadaten: BlobMetadaten,
    ) -> StorageResult<()> {
        let groesse = daten.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(schluessel)
            .body(ByteStream::from(daten))
            .content_type(content_type)
            .metadata("message-id", metadaten.message_id.to_string())
            .metadata(
                "uploaded",
                metadaten
                    .hochgeladen_am
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        tracing::debug!(schluessel = %schluessel, bytes = groesse, "Blob abgelegt");
        Ok(())
    }

    async fn get(&self, schluessel: &str) -> StorageResult<Vec<u8>> {
        let objekt = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(schluessel)
            .send()
            .await
            .map_err(|e| StorageError::Download(e.to_string()))?;

        let body = objekt
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Download(e.to_string()))?;

        Ok(body.to_vec())
    }

    async fn delete(&self, schluessel: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(schluessel)
            .send()
            .await
            .map_err(|e| StorageError::Loeschen(e.to_string()))?;

        tracing::debug!(schluessel = %schluessel, "Blob geloescht");
        Ok(())
    }

    async fn presign_get(&self, schluessel: &str, ttl: Duration) -> StorageResult<String> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let anfrage = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(schluessel)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(anfrage.uri().to_string())
    }
}

// ---------------------------------------------------------------------------
// In-Memory (Tests und lokale Entwicklung)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct GespeicherterBlob {
    daten: Vec<u8>,
    content_type: String,
}

/// In-Memory-Blob-Store ohne externe Abhaengigkeit
///
/// Clone teilt den inneren Zustand (DashMap hinter Arc).
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: std::sync::Arc<DashMap<String, GespeicherterBlob>>,
}

impl InMemoryBlobStore {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Anzahl gespeicherter Objekte
    pub fn anzahl(&self) -> usize {
        self.blobs.len()
    }

    /// Prueft ob ein Schluessel vorhanden ist
    pub fn enthaelt(&self, schluessel: &str) -> bool {
        self.blobs.contains_key(schluessel)
    }

    /// Gibt den Content-Type eines gespeicherten Objekts zurueck
    pub fn content_type(&self, schluessel: &str) -> Option<String> {
        self.blobs.get(schluessel).map(|b| b.content_type.clone())
    }
}

impl BlobStore for InMemoryBlobStore {
    async fn put(
        &self,
        schluessel: &str,
        daten: Vec<u8>,
        content_type: &str,
        _metadaten: BlobMetadaten,
    ) -> StorageResult<()> {
        self.blobs.insert(
            schluessel.to_string(),
            GespeicherterBlob {
                daten,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, schluessel: &str) -> StorageResult<Vec<u8>> {
        self.blobs
            .get(schluessel)
            .map(|b| b.daten.clone())
            .ok_or_else(|| StorageError::NichtGefunden(schluessel.to_string()))
    }

    async fn delete(&self, schluessel: &str) -> StorageResult<()> {
        self.blobs.remove(schluessel);
        Ok(())
    }

    async fn presign_get(&self, schluessel: &str, ttl: Duration) -> StorageResult<String> {
        if !self.blobs.contains_key(schluessel) {
            return Err(StorageError::NichtGefunden(schluessel.to_string()));
        }
        Ok(format!("memory://{schluessel}?expires={}", ttl.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadaten() -> BlobMetadaten {
        BlobMetadaten {
            message_id: Uuid::new_v4(),
            hochgeladen_am: Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_und_get() {
        let store = InMemoryBlobStore::neu();
        store
            .put("messages/2025/01/01/x.webm", b"audio".to_vec(), "audio/webm", metadaten())
            .await
            .unwrap();

        let daten = store.get("messages/2025/01/01/x.webm").await.unwrap();
        assert_eq!(daten, b"audio");
        assert_eq!(store.anzahl(), 1);
        assert_eq!(
            store.content_type("messages/2025/01/01/x.webm").as_deref(),
            Some("audio/webm")
        );
    }

    #[tokio::test]
    async fn get_unbekannt_gibt_nicht_gefunden() {
        let store = InMemoryBlobStore::neu();
        let ergebnis = store.get("fehlt").await;
        assert!(matches!(ergebnis, Err(StorageError::NichtGefunden(_))));
    }

    #[tokio::test]
    async fn delete_ist_idempotent() {
        let store = InMemoryBlobStore::neu();
        store
            .put("k", b"x".to_vec(), "audio/webm", metadaten())
            .await
            .unwrap();

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.enthaelt("k"));
    }

    #[tokio::test]
    async fn presign_nur_fuer_vorhandene_blobs() {
        let store = InMemoryBlobStore::neu();
        store
            .put("k", b"x".to_vec(), "audio/webm", metadaten())
            .await
            .unwrap();

        let url = store.presign_get("k", Duration::from_secs(3600)).await.unwrap();
        assert!(url.contains("expires=3600"));

        assert!(store.presign_get("fehlt", Duration::from_secs(60)).await.is_err());
    }

    #[tokio::test]
    async fn clone_teilt_zustand() {
        let a = InMemoryBlobStore::neu();
        let b = a.clone();
        a.put("k", b"x".to_vec(), "audio/webm", metadaten()).await.unwrap();
        assert!(b.enthaelt("k"));
    }
}
