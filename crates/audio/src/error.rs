//! Fehlertypen fuer die Audio-Engine

use intervox_core::IntervoxError;
use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Engine
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Mikrofon-Zugriff verweigert")]
    MikrofonVerweigert,

    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Dekodierfehler: {0}")]
    DekodierFehler(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

pub type AudioResult<T> = Result<T, AudioError>;

impl From<AudioError> for IntervoxError {
    fn from(e: AudioError) -> Self {
        match e {
            AudioError::MikrofonVerweigert => IntervoxError::MikrofonVerweigert,
            AudioError::GeraetNichtGefunden(name) => IntervoxError::GeraetNichtGefunden(name),
            AudioError::KeinStandardEingabegeraet | AudioError::KeinStandardAusgabegeraet => {
                IntervoxError::GeraetNichtGefunden("Standard-Geraet".into())
            }
            AudioError::DekodierFehler(msg) => IntervoxError::DekodierFehler(msg),
            AudioError::Konfiguration(msg) => IntervoxError::Konfiguration(msg),
            AudioError::StreamFehler(msg) | AudioError::CodecFehler(msg) => {
                IntervoxError::Intern(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbildung_auf_sitzungsfehler() {
        let e: IntervoxError = AudioError::MikrofonVerweigert.into();
        assert!(matches!(e, IntervoxError::MikrofonVerweigert));

        let e: IntervoxError = AudioError::GeraetNichtGefunden("USB-Mikro".into()).into();
        assert!(matches!(e, IntervoxError::GeraetNichtGefunden(n) if n == "USB-Mikro"));
    }

    #[test]
    fn geraete_fehler_sind_terminal() {
        let e: IntervoxError = AudioError::KeinStandardEingabegeraet.into();
        assert!(e.ist_terminal());
    }
}
