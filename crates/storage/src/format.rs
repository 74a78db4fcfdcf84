//! Audioformat-Erkennung fuer hochgeladene Sprachaufnahmen
//!
//! Erkennungsreihenfolge: Dateiendung vor Content-Type, Fallback `webm`
//! (der Standard-Container der Browser-MediaRecorder-API).

use std::str::FromStr;

/// Unterstuetzte Audio-Container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Webm,
    M4a,
    Mp3,
    Ogg,
    Wav,
}

impl AudioFormat {
    /// Erkennt das Format aus Dateiname und Content-Type
    ///
    /// Prioritaet: (1) Dateiendung, (2) Content-Type, (3) `webm`.
    pub fn erkennen(dateiname: Option<&str>, content_type: Option<&str>) -> Self {
        if let Some(name) = dateiname {
            if let Some(endung) = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()) {
                if let Ok(format) = endung.parse() {
                    return format;
                }
            }
        }

        if let Some(ct) = content_type {
            let ct = ct.to_ascii_lowercase();
            if ct.contains("webm") {
                return Self::Webm;
            }
            if ct.contains("mp4") || ct.contains("aac") {
                return Self::M4a;
            }
            if ct.contains("mpeg") || ct.contains("mp3") {
                return Self::Mp3;
            }
            if ct.contains("ogg") || ct.contains("opus") {
                return Self::Ogg;
            }
            if ct.contains("wav") {
                return Self::Wav;
            }
        }

        Self::Webm
    }

    /// Dateiendung fuer den Blob-Schluessel
    pub fn endung(&self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::M4a => "m4a",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Wav => "wav",
        }
    }

    /// MIME-Typ fuer den Blob-Store
    pub fn mime_typ(&self) -> &'static str {
        match self {
            Self::Webm => "audio/webm",
            Self::M4a => "audio/mp4",
            Self::Mp3 => "audio/mpeg",
            Self::Ogg => "audio/ogg",
            Self::Wav => "audio/wav",
        }
    }
}

impl FromStr for AudioFormat {
    type Err = ();

    /// Parst eine Dateiendung (ohne Punkt, lowercase)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webm" => Ok(Self::Webm),
            "m4a" | "mp4" => Ok(Self::M4a),
            "mp3" => Ok(Self::Mp3),
            "ogg" | "opus" => Ok(Self::Ogg),
            "wav" => Ok(Self::Wav),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endung_hat_vorrang_vor_content_type() {
        let format = AudioFormat::erkennen(Some("aufnahme.mp3"), Some("audio/webm"));
        assert_eq!(format, AudioFormat::Mp3);
    }

    #[test]
    fn endungs_mapping() {
        assert_eq!(AudioFormat::erkennen(Some("a.webm"), None), AudioFormat::Webm);
        assert_eq!(AudioFormat::erkennen(Some("a.m4a"), None), AudioFormat::M4a);
        assert_eq!(AudioFormat::erkennen(Some("a.mp4"), None), AudioFormat::M4a);
        assert_eq!(AudioFormat::erkennen(Some("a.OGG"), None), AudioFormat::Ogg);
        assert_eq!(AudioFormat::erkennen(Some("a.opus"), None), AudioFormat::Ogg);
        assert_eq!(AudioFormat::erkennen(Some("a.wav"), None), AudioFormat::Wav);
    }

    #[test]
    fn content_type_fallback() {
        assert_eq!(
            AudioFormat::erkennen(Some("ohne_endung"), Some("audio/mpeg")),
            AudioFormat::Mp3
        );
        assert_eq!(
            AudioFormat::erkennen(None, Some("audio/mp4")),
            AudioFormat::M4a
        );
    }

    #[test]
    fn unbekanntes_format_wird_webm() {
        assert_eq!(AudioFormat::erkennen(None, None), AudioFormat::Webm);
        assert_eq!(
            AudioFormat::erkennen(Some("a.xyz"), Some("text/plain")),
            AudioFormat::Webm
        );
    }

    #[test]
    fn mime_typen() {
        assert_eq!(AudioFormat::Webm.mime_typ(), "audio/webm");
        assert_eq!(AudioFormat::M4a.mime_typ(), "audio/mp4");
        assert_eq!(AudioFormat::Mp3.mime_typ(), "audio/mpeg");
        assert_eq!(AudioFormat::Ogg.mime_typ(), "audio/ogg");
        assert_eq!(AudioFormat::Wav.mime_typ(), "audio/wav");
    }
}
