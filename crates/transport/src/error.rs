//! Fehlertypen der Transportschicht

use intervox_core::IntervoxError;
use thiserror::Error;

/// Alle moeglichen Fehler der Transportschicht
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Verbindung fehlgeschlagen: {0}")]
    VerbindungFehlgeschlagen(String),

    #[error("Authentifizierung abgelehnt: {0}")]
    AuthFehlgeschlagen(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    #[error("Server meldet Fehler: {0}")]
    ServerFehler(String),

    #[error("Protokollverletzung: {0}")]
    Protokoll(String),

    #[error("Transport nicht verbunden")]
    NichtVerbunden,
}

pub type TransportResult<T> = Result<T, TransportError>;

impl From<TransportError> for IntervoxError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::VerbindungFehlgeschlagen(msg) => {
                IntervoxError::VerbindungFehlgeschlagen(msg)
            }
            TransportError::AuthFehlgeschlagen(msg) => IntervoxError::AuthFehlgeschlagen(msg),
            TransportError::Zeitlimit(msg) => IntervoxError::Zeitlimit(msg),
            TransportError::ServerFehler(msg) => IntervoxError::ServerFehler(msg),
            TransportError::Protokoll(msg) => IntervoxError::Intern(msg),
            TransportError::NichtVerbunden => {
                IntervoxError::VerbindungFehlgeschlagen("Transport nicht verbunden".into())
            }
        }
    }
}
