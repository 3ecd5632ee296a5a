//! Gemeinsame Typen fuer Intervox-Sitzungen
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zur Compilezeit
//! auszuschliessen. Der Sitzungsstatus ist eine explizite Zustandsmaschine:
//! Uebergaenge laufen ausschliesslich ueber `uebergang_erlaubt`.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Sitzungs-ID
///
/// Opak: entweder vom Backend vergeben (HTTP-Transport) oder lokal
/// generiert (WebSocket-Transporte).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SitzungsId(pub String);

impl SitzungsId {
    /// Erstellt eine neue lokal generierte SitzungsId
    pub fn neu() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Uebernimmt eine vom Backend vergebene ID
    pub fn vom_backend(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn als_str(&self) -> &str {
        &self.0
    }
}

impl Default for SitzungsId {
    fn default() -> Self {
        Self::neu()
    }
}

impl std::fmt::Display for SitzungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sitzung:{}", self.0)
    }
}

/// Kennung des entfernten Konversations-Agenten
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn als_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Welcher Transport die Sitzung traegt
///
/// Wird einmal beim Sitzungsstart gewaehlt und kann danach nicht mehr
/// wechseln.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportArt {
    /// Direkte WebSocket-Verbindung zum Konversationsdienst
    Nativ,
    /// Selbst gehosteter WebSocket-Relay (Firewall-Umgehung)
    Proxy,
    /// HTTP Runde-fuer-Runde (keine persistente Verbindung)
    Http,
}

impl std::fmt::Display for TransportArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nativ => write!(f, "nativ"),
            Self::Proxy => write!(f, "proxy"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Zustand einer Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SitzungsStatus {
    /// Noch kein Start angefordert
    Leerlauf,
    /// Verbindungsaufbau laeuft
    Verbindet,
    /// Duplex-Sitzung aktiv
    Verbunden,
    /// Sauberes Beenden laeuft
    Beendend,
    /// Sitzung beendet
    Getrennt,
    /// Terminaler Fehler
    Fehler,
}

impl SitzungsStatus {
    /// Prueft ob ein Statuswechsel zulaessig ist
    ///
    /// `Fehler` ist aus jedem nicht-terminalen Zustand erreichbar.
    /// `Getrennt`/`Fehler` fuehren nur noch nach `Leerlauf` (neue Sitzung
    /// auf demselben Orchestrator).
    pub fn uebergang_erlaubt(self, nach: SitzungsStatus) -> bool {
        use SitzungsStatus::*;
        match (self, nach) {
            (Leerlauf, Verbindet) => true,
            (Verbindet, Verbunden | Beendend | Getrennt | Fehler) => true,
            (Verbunden, Beendend | Getrennt | Fehler) => true,
            (Beendend, Getrennt | Fehler) => true,
            (Getrennt | Fehler, Leerlauf) => true,
            _ => false,
        }
    }

    /// Gibt true zurueck wenn keine Sitzung mehr laeuft
    pub fn ist_terminal(self) -> bool {
        matches!(self, Self::Getrennt | Self::Fehler)
    }
}

/// Sprecherrolle einer Aeusserung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sprecher {
    #[serde(rename = "agent")]
    Agent,
    #[serde(rename = "user")]
    Benutzer,
}

impl Sprecher {
    /// Bildet einen Rollen-String aus der Gegenstelle ab ("ai" und
    /// "agent" sind gleichbedeutend)
    pub fn aus_rolle(rolle: &str) -> Self {
        match rolle {
            "agent" | "ai" | "interviewer" => Self::Agent,
            _ => Self::Benutzer,
        }
    }
}

impl std::fmt::Display for Sprecher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::Benutzer => write!(f, "user"),
        }
    }
}

/// Eine Aeusserung im Transkript
///
/// Nach dem Anfuegen unveraenderlich. `start_sekunden` ist ein
/// heuristisch abgeleiteter Startzeitpunkt, nicht die Ankunftszeit
/// (siehe TranskriptZeitleiste in intervox-session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranskriptEintrag {
    pub sprecher: Sprecher,
    pub text: String,
    /// Abgeleiteter Beginn der Aeusserung, Sekunden seit Sitzungsstart
    pub start_sekunden: f64,
    /// Wanduhrzeit des Nachrichteneingangs
    pub empfangen_am: DateTime<Utc>,
}

impl TranskriptEintrag {
    /// Formatiert den Startzeitpunkt als `mm:ss`
    pub fn zeit_label(&self) -> String {
        let gesamt = self.start_sekunden.max(0.0) as u64;
        format!("{:02}:{:02}", gesamt / 60, gesamt % 60)
    }
}

/// Kodierung eines Audio-Chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioKodierung {
    /// Laengenpraefixierte Opus-Frames (bevorzugt)
    Opus,
    /// Rohes PCM, 16 Bit Little-Endian, 16 kHz Mono (Fallback)
    Pcm16,
    /// Containerformat vom HTTP-Transport (Audio-URL-Abruf)
    Mp3,
}

impl AudioKodierung {
    /// MIME-artige Kennung der Kodierung
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Opus => "audio/opus",
            Self::Pcm16 => "audio/pcm;rate=16000",
            Self::Mp3 => "audio/mpeg",
        }
    }
}

/// Ein Stueck kodiertes Audio
///
/// Ausgehende Chunks sind fluechtig (erzeugt, gesendet, verworfen).
/// Eingehende Chunks warten in der Wiedergabe-Warteschlange und werden
/// nach dem Abspielen verworfen. Die Reihenfolge ist die
/// Zustellreihenfolge des Transports; explizite Sequenznummern gibt es
/// im Protokoll nicht.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub daten: Bytes,
    pub kodierung: AudioKodierung,
}

impl AudioChunk {
    pub fn neu(daten: impl Into<Bytes>, kodierung: AudioKodierung) -> Self {
        Self {
            daten: daten.into(),
            kodierung,
        }
    }

    pub fn ist_leer(&self) -> bool {
        self.daten.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sitzungs_id_eindeutig() {
        let a = SitzungsId::neu();
        let b = SitzungsId::neu();
        assert_ne!(a, b, "Zwei neue SitzungsIds muessen verschieden sein");
    }

    #[test]
    fn sitzungs_id_vom_backend() {
        let id = SitzungsId::vom_backend("srv-4711");
        assert_eq!(id.als_str(), "srv-4711");
        assert!(id.to_string().starts_with("sitzung:"));
    }

    #[test]
    fn status_uebergaenge_regulaer() {
        use SitzungsStatus::*;
        assert!(Leerlauf.uebergang_erlaubt(Verbindet));
        assert!(Verbindet.uebergang_erlaubt(Verbunden));
        assert!(Verbunden.uebergang_erlaubt(Beendend));
        assert!(Beendend.uebergang_erlaubt(Getrennt));
    }

    #[test]
    fn status_fehler_aus_nicht_terminalen() {
        use SitzungsStatus::*;
        assert!(Verbindet.uebergang_erlaubt(Fehler));
        assert!(Verbunden.uebergang_erlaubt(Fehler));
        assert!(Beendend.uebergang_erlaubt(Fehler));
        assert!(!Getrennt.uebergang_erlaubt(Fehler));
    }

    #[test]
    fn status_unzulaessige_uebergaenge() {
        use SitzungsStatus::*;
        assert!(!Leerlauf.uebergang_erlaubt(Verbunden));
        assert!(!Getrennt.uebergang_erlaubt(Verbunden));
        // Transport-Wechsel nach Verbindungsbeginn ist ausgeschlossen:
        // es gibt keinen Weg zurueck nach Verbindet
        assert!(!Verbunden.uebergang_erlaubt(Verbindet));
    }

    #[test]
    fn sprecher_rollen_abbildung() {
        assert_eq!(Sprecher::aus_rolle("ai"), Sprecher::Agent);
        assert_eq!(Sprecher::aus_rolle("agent"), Sprecher::Agent);
        assert_eq!(Sprecher::aus_rolle("user"), Sprecher::Benutzer);
        assert_eq!(Sprecher::aus_rolle("irgendwas"), Sprecher::Benutzer);
    }

    #[test]
    fn zeit_label_formatierung() {
        let eintrag = TranskriptEintrag {
            sprecher: Sprecher::Agent,
            text: "Willkommen".into(),
            start_sekunden: 125.7,
            empfangen_am: Utc::now(),
        };
        assert_eq!(eintrag.zeit_label(), "02:05");
    }

    #[test]
    fn zeit_label_negativ_geklemmt() {
        let eintrag = TranskriptEintrag {
            sprecher: Sprecher::Benutzer,
            text: "x".into(),
            start_sekunden: -3.0,
            empfangen_am: Utc::now(),
        };
        assert_eq!(eintrag.zeit_label(), "00:00");
    }

    #[test]
    fn audio_chunk_kodierung_mime() {
        assert_eq!(AudioKodierung::Opus.mime(), "audio/opus");
        assert_eq!(AudioKodierung::Pcm16.mime(), "audio/pcm;rate=16000");
        assert_eq!(AudioKodierung::Mp3.mime(), "audio/mpeg");
    }

    #[test]
    fn status_ist_serde_kompatibel() {
        let json = serde_json::to_string(&SitzungsStatus::Verbindet).unwrap();
        assert_eq!(json, "\"verbindet\"");
        let s: SitzungsStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(s, SitzungsStatus::Verbindet);
    }
}
