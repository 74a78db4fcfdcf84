//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte, aber `validieren()` erzwingt die Pflichtfelder
//! (Secret, Datenbank- und S3-Zugangsdaten) bevor der Server startet.

use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Einstellungen (Umgebung, Secrets, Token-Laufzeiten)
    pub allgemein: AllgemeineEinstellungen,
    /// HTTP-Einstellungen
    pub http: HttpEinstellungen,
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// S3/MinIO-Einstellungen
    pub s3: S3Einstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllgemeineEinstellungen {
    /// Umgebung: "dev", "prod" oder "test"
    pub env: String,
    /// Symmetrisches Secret fuer die Token-Signierung
    pub secret_key: String,
    /// Laufzeit der Access-Tokens in Minuten
    pub access_token_ttl_minuten: i64,
    /// Laufzeit der Refresh-Tokens in Tagen
    pub refresh_token_ttl_tage: i64,
}

impl Default for AllgemeineEinstellungen {
    fn default() -> Self {
        Self {
            env: "dev".into(),
            secret_key: String::new(),
            access_token_ttl_minuten: 15,
            refresh_token_ttl_tage: 7,
        }
    }
}

/// HTTP-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpEinstellungen {
    /// Bind-Adresse
    pub adresse: String,
    /// Port
    pub port: u16,
}

impl Default for HttpEinstellungen {
    fn default() -> Self {
        Self {
            adresse: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    pub host: String,
    pub port: u16,
    pub benutzer: String,
    pub passwort: String,
    pub name: String,
    /// Deadline fuer einzelne Datenbank-Operationen in Sekunden
    pub timeout_sek: u64,
    /// Maximale Poolgroesse
    pub max_verbindungen: u32,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            benutzer: String::new(),
            passwort: String::new(),
            name: "funkraum".into(),
            timeout_sek: 5,
            max_verbindungen: 5,
        }
    }
}

/// S3/MinIO-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Einstellungen {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub use_ssl: bool,
    pub bucket_name: String,
}

impl Default for S3Einstellungen {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            use_ssl: false,
            bucket_name: "funkraum".into(),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "text" oder "json"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft die Pflichtfelder vor dem Start
    pub fn validieren(&self) -> anyhow::Result<()> {
        if self.allgemein.secret_key.is_empty() {
            anyhow::bail!("allgemein.secret_key ist erforderlich");
        }
        if !matches!(self.allgemein.env.as_str(), "dev" | "prod" | "test") {
            anyhow::bail!(
                "allgemein.env ist ungueltig: '{}' (erlaubt: dev/prod/test)",
                self.allgemein.env
            );
        }
        if self.http.adresse.is_empty() {
            anyhow::bail!("http.adresse ist erforderlich");
        }
        if self.http.port == 0 {
            anyhow::bail!("http.port ist erforderlich");
        }
        if self.datenbank.host.is_empty() {
            anyhow::bail!("datenbank.host ist erforderlich");
        }
        if self.datenbank.benutzer.is_empty() {
            anyhow::bail!("datenbank.benutzer ist erforderlich");
        }
        if self.datenbank.passwort.is_empty() {
            anyhow::bail!("datenbank.passwort ist erforderlich");
        }
        if self.s3.endpoint.is_empty() && self.s3.access_key_id.is_empty() {
            anyhow::bail!("s3.endpoint oder ambiente AWS-Zugangsdaten sind erforderlich");
        }
        if self.s3.bucket_name.is_empty() {
            anyhow::bail!("s3.bucket_name ist erforderlich");
        }
        Ok(())
    }

    /// Verbindungs-URL fuer Postgres
    pub fn datenbank_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?connect_timeout={}",
            self.datenbank.benutzer,
            self.datenbank.passwort,
            self.datenbank.host,
            self.datenbank.port,
            self.datenbank.name,
            self.datenbank.timeout_sek,
        )
    }

    /// Vollstaendige HTTP-Bind-Adresse
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.http.adresse, self.http.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_gueltig() -> ServerConfig {
        let mut cfg = ServerConfig::default();
        cfg.allgemein.secret_key = "geheim".into();
        cfg.datenbank.benutzer = "funkraum".into();
        cfg.datenbank.passwort = "pg".into();
        cfg.s3.endpoint = "localhost:9000".into();
        cfg.s3.access_key_id = "minio".into();
        cfg.s3.secret_access_key = "minio123".into();
        cfg
    }

    #[test]
    fn standardwerte() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.allgemein.env, "dev");
        assert_eq!(cfg.allgemein.access_token_ttl_minuten, 15);
        assert_eq!(cfg.allgemein.refresh_token_ttl_tage, 7);
        assert_eq!(cfg.http.port, 8080);
        assert_eq!(cfg.datenbank.port, 5432);
        assert_eq!(cfg.datenbank.timeout_sek, 5);
    }

    #[test]
    fn standard_config_faellt_durch_validierung() {
        // Ohne Secret und Zugangsdaten darf der Server nicht starten
        assert!(ServerConfig::default().validieren().is_err());
    }

    #[test]
    fn minimal_config_ist_gueltig() {
        assert!(minimal_gueltig().validieren().is_ok());
    }

    #[test]
    fn ungueltige_umgebung_abgelehnt() {
        let mut cfg = minimal_gueltig();
        cfg.allgemein.env = "staging".into();
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn datenbank_url_form() {
        let cfg = minimal_gueltig();
        assert_eq!(
            cfg.datenbank_url(),
            "postgres://funkraum:pg@localhost:5432/funkraum?connect_timeout=5"
        );
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_bind_adresse(), "0.0.0.0:8080");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [allgemein]
            env = "prod"
            secret_key = "s"

            [http]
            port = 9000

            [datenbank]
            benutzer = "app"
            passwort = "pw"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.allgemein.env, "prod");
        assert_eq!(cfg.http.port, 9000);
        assert_eq!(cfg.datenbank.benutzer, "app");
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.datenbank.port, 5432);
        assert_eq!(cfg.logging.level, "info");
    }
}
