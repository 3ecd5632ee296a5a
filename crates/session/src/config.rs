//! Sitzungs-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass die Sitzungsschicht ohne
//! Konfigurationsdatei lauffaehig ist.

use serde::{Deserialize, Serialize};

use intervox_audio::{CaptureKonfig, WiedergabeKonfig};
use intervox_core::{LoggingEinstellungen, TransportArt};
use intervox_transport::TransportEndpunkte;

/// Vollstaendige Intervox-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IntervoxKonfig {
    /// Endpunkte der drei Transportwege
    pub endpunkte: EndpunktEinstellungen,
    /// Mikrofon-Aufnahme
    pub aufnahme: AufnahmeEinstellungen,
    /// Audio-Wiedergabe
    pub wiedergabe: WiedergabeEinstellungen,
    /// Sitzungs-Ablauf
    pub sitzung: SitzungsEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Endpunkte der Transportwege
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpunktEinstellungen {
    /// Basis des nativen Konversationsdienstes
    pub nativ_basis: String,
    /// Vollstaendige URL des selbst gehosteten Relays
    pub proxy_url: String,
    /// Versionierte REST-Basis des HTTP-Backends
    pub http_basis: String,
}

impl Default for EndpunktEinstellungen {
    fn default() -> Self {
        let endpunkte = TransportEndpunkte::default();
        Self {
            nativ_basis: endpunkte.nativ_basis,
            proxy_url: endpunkte.proxy_url,
            http_basis: endpunkte.http_basis,
        }
    }
}

impl EndpunktEinstellungen {
    pub fn als_endpunkte(&self) -> TransportEndpunkte {
        TransportEndpunkte {
            nativ_basis: self.nativ_basis.clone(),
            proxy_url: self.proxy_url.clone(),
            http_basis: self.http_basis.clone(),
        }
    }
}

/// Mikrofon-Aufnahme
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AufnahmeEinstellungen {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Chunk-Dauer in Millisekunden (100-250 sinnvoll)
    pub chunk_ms: u32,
    /// Gewuenschtes Eingabegeraet (Teilstring des Namens)
    pub geraet_id: Option<String>,
}

impl Default for AufnahmeEinstellungen {
    fn default() -> Self {
        let konfig = CaptureKonfig::default();
        Self {
            sample_rate: konfig.sample_rate,
            chunk_ms: konfig.chunk_ms,
            geraet_id: None,
        }
    }
}

impl AufnahmeEinstellungen {
    pub fn als_capture_konfig(&self) -> CaptureKonfig {
        CaptureKonfig {
            sample_rate: self.sample_rate,
            chunk_ms: self.chunk_ms,
            ..CaptureKonfig::default()
        }
    }
}

/// Audio-Wiedergabe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WiedergabeEinstellungen {
    /// Abtastrate der Ausgabe in Hz
    pub sample_rate: u32,
    /// Angenommene Abtastrate eingehender Chunks
    pub quell_rate: u32,
    /// Gewuenschtes Ausgabegeraet (Teilstring des Namens)
    pub geraet_id: Option<String>,
}

impl Default for WiedergabeEinstellungen {
    fn default() -> Self {
        let konfig = WiedergabeKonfig::default();
        Self {
            sample_rate: konfig.sample_rate,
            quell_rate: konfig.quell_rate,
            geraet_id: None,
        }
    }
}

impl WiedergabeEinstellungen {
    pub fn als_wiedergabe_konfig(&self) -> WiedergabeKonfig {
        WiedergabeKonfig {
            sample_rate: self.sample_rate,
            quell_rate: self.quell_rate,
            ..WiedergabeKonfig::default()
        }
    }
}

/// Sitzungs-Ablauf
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungsEinstellungen {
    /// Zeitlimit fuer den Verbindungsaufbau in Sekunden
    pub verbindungs_timeout_sekunden: u64,
    /// Versuche beim Abruf des Sitzungs-Audios nach dem Ende
    pub audio_abruf_versuche: u32,
    /// Abstand zwischen den Abruf-Versuchen in Sekunden
    pub audio_abruf_abstand_sekunden: u64,
    /// Erzwingt eine Transportvariante; `None` ueberlaesst die Wahl
    /// der Verbindungs-Probe
    pub erzwungener_transport: Option<TransportArt>,
}

impl Default for SitzungsEinstellungen {
    fn default() -> Self {
        Self {
            verbindungs_timeout_sekunden: 10,
            audio_abruf_versuche: 10,
            audio_abruf_abstand_sekunden: 3,
            erzwungener_transport: None,
        }
    }
}

impl IntervoxKonfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    ///
    /// Eine fehlende Datei ist kein Fehler: dann gelten die
    /// Standardwerte.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let konfig: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(konfig)
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardwerte() {
        let konfig = IntervoxKonfig::default();
        assert_eq!(konfig.aufnahme.sample_rate, 16000);
        assert_eq!(konfig.aufnahme.chunk_ms, 200);
        assert_eq!(konfig.sitzung.verbindungs_timeout_sekunden, 10);
        assert_eq!(konfig.sitzung.audio_abruf_versuche, 10);
    }

    #[test]
    fn teilweise_toml_behaelt_standardwerte() {
        let toml = r#"
            [endpunkte]
            proxy_url = "wss://relay.firma.example/ws"

            [aufnahme]
            chunk_ms = 100

            [sitzung]
            erzwungener_transport = "http"
        "#;
        let konfig: IntervoxKonfig = toml::from_str(toml).unwrap();
        assert_eq!(konfig.endpunkte.proxy_url, "wss://relay.firma.example/ws");
        assert_eq!(konfig.aufnahme.chunk_ms, 100);
        assert_eq!(
            konfig.sitzung.erzwungener_transport,
            Some(TransportArt::Http)
        );
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(konfig.aufnahme.sample_rate, 16000);
        assert_eq!(
            konfig.endpunkte.nativ_basis,
            TransportEndpunkte::default().nativ_basis
        );
    }

    #[test]
    fn umwandlung_in_laufzeit_konfigurationen() {
        let konfig = IntervoxKonfig::default();
        let capture = konfig.aufnahme.als_capture_konfig();
        assert_eq!(capture.sample_rate, 16000);
        let wiedergabe = konfig.wiedergabe.als_wiedergabe_konfig();
        assert_eq!(wiedergabe.sample_rate, 48000);
    }
}
