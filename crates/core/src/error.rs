//! Fehlertypen fuer Intervox
//!
//! Zentraler Fehler-Enum der alle Fehlerzustaende einer Sitzung abdeckt.
//! Untermodule (Audio, Transport) definieren eigene Fehler und werden
//! beim Uebergang in die Sitzungsschicht hierauf abgebildet.

use thiserror::Error;

/// Globaler Result-Alias fuer Intervox
pub type Result<T> = std::result::Result<T, IntervoxError>;

/// Alle moeglichen Fehler im Intervox-System
#[derive(Debug, Error)]
pub enum IntervoxError {
    // --- Aufnahme & Geraete ---
    #[error("Mikrofon-Zugriff verweigert")]
    MikrofonVerweigert,

    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    // --- Verbindung & Transport ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    VerbindungFehlgeschlagen(String),

    #[error("Authentifizierung fehlgeschlagen: {0}")]
    AuthFehlgeschlagen(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    // --- Audio-Daten ---
    #[error("Dekodierfehler: {0}")]
    DekodierFehler(String),

    // --- Gegenstelle ---
    #[error("Server-Fehler: {0}")]
    ServerFehler(String),

    // --- Sitzungsabschluss ---
    #[error("Sitzung ohne ausgetauschte Aeusserungen beendet")]
    LeeresTranskript,

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl IntervoxError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler die Sitzung beendet
    ///
    /// Terminale Fehler werden der UI-Schicht sofort gemeldet
    /// (Status -> Fehler). Lokale Fehler (einzelner kaputter Audio-Frame,
    /// ein verlorener Ping) werden geloggt und uebersprungen.
    pub fn ist_terminal(&self) -> bool {
        matches!(
            self,
            Self::MikrofonVerweigert
                | Self::GeraetNichtGefunden(_)
                | Self::VerbindungFehlgeschlagen(_)
                | Self::AuthFehlgeschlagen(_)
                | Self::Zeitlimit(_)
                | Self::ServerFehler(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = IntervoxError::AuthFehlgeschlagen("Ungueltige Agent-ID".into());
        assert_eq!(
            e.to_string(),
            "Authentifizierung fehlgeschlagen: Ungueltige Agent-ID"
        );
    }

    #[test]
    fn terminal_erkennung() {
        assert!(IntervoxError::MikrofonVerweigert.ist_terminal());
        assert!(IntervoxError::Zeitlimit("Handshake".into()).ist_terminal());
        assert!(!IntervoxError::DekodierFehler("test".into()).ist_terminal());
        assert!(!IntervoxError::LeeresTranskript.ist_terminal());
    }

    #[test]
    fn leeres_transkript_ist_validierung() {
        // Kein Absturz, sondern ein an die UI gemeldeter Validierungsfehler
        let e = IntervoxError::LeeresTranskript;
        assert!(!e.ist_terminal());
        assert!(e.to_string().contains("Aeusserungen"));
    }
}
