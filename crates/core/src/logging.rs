//! Structured Logging Setup via tracing-subscriber
//!
//! Konfiguration kommt aus der `LoggingEinstellungen`-Sektion der
//! Orchestrator-Konfiguration; Umgebungsvariablen haben Vorrang:
//! - `IVX_LOG_LEVEL`: Log-Level (trace/debug/info/warn/error)
//! - `IVX_LOG_FORMAT`: Format (text/json)

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

/// Logging-Einstellungen (TOML-Sektion `[logging]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: trace/debug/info/warn/error
    pub level: String,
    /// Ausgabeformat: "text" oder "json"
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

impl LoggingEinstellungen {
    /// Prueft ob Level und Format gueltige Werte tragen
    pub fn ist_gueltig(&self) -> bool {
        matches!(
            self.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) && matches!(self.format.as_str(), "text" | "json")
    }
}

/// Initialisiert das Logging-System.
///
/// `IVX_LOG_LEVEL` und `IVX_LOG_FORMAT` ueberschreiben die Einstellungen
/// aus der Konfiguration. Ungueltige Werte fallen auf `info` / `text`
/// zurueck. Mehrfachaufruf ist wirkungslos (der zweite `init` schlaegt
/// still fehl).
pub fn logging_initialisieren(einstellungen: &LoggingEinstellungen) {
    let filter = EnvFilter::try_from_env("IVX_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(&einstellungen.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var("IVX_LOG_FORMAT").unwrap_or_else(|_| einstellungen.format.clone());

    let ergebnis = match format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging war bereits initialisiert");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn einstellungen_default() {
        let e = LoggingEinstellungen::default();
        assert_eq!(e.level, "info");
        assert_eq!(e.format, "text");
        assert!(e.ist_gueltig());
    }

    #[test]
    fn einstellungen_ungueltig() {
        let e = LoggingEinstellungen {
            level: "verbose".into(),
            format: "text".into(),
        };
        assert!(!e.ist_gueltig());

        let e = LoggingEinstellungen {
            level: "info".into(),
            format: "xml".into(),
        };
        assert!(!e.ist_gueltig());
    }

    #[test]
    fn initialisieren_ist_idempotent() {
        let e = LoggingEinstellungen::default();
        logging_initialisieren(&e);
        // Zweiter Aufruf darf nicht panicken
        logging_initialisieren(&e);
    }
}
