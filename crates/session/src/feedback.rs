//! Abschluss-Kollaborateure
//!
//! Feedback-Erzeugung und Archivierung sind fuer die Sitzungsschicht
//! opake Dienste hinter Traits: der Orchestrator reicht die fertige
//! Aufzeichnung durch und haengt das Ergebnis an. Wie das Feedback
//! entsteht oder wo archiviert wird, entscheidet die Einbettung.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use intervox_core::{AgentId, Result, SitzungsId, TranskriptEintrag, TransportArt};

/// Vom Feedback-Dienst erzeugte Rueckmeldung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    /// Rueckmeldungstext (Aufbau ist Sache des Dienstes)
    pub inhalt: String,
    pub erstellt_am: DateTime<Utc>,
}

/// Vollstaendige Aufzeichnung einer beendeten Sitzung
#[derive(Debug, Clone)]
pub struct SitzungsAufzeichnung {
    pub sitzungs_id: SitzungsId,
    pub agent_id: AgentId,
    pub transport: TransportArt,
    pub begonnen_am: DateTime<Utc>,
    pub dauer_sekunden: f64,
    /// Transkript in Ankunftsreihenfolge, nie leer
    pub transkript: Vec<TranskriptEintrag>,
    /// Sitzungs-Audio, falls abrufbar
    pub audio: Option<Bytes>,
    /// Feedback, falls ein Dienst eingebunden ist
    pub feedback: Option<Feedback>,
}

/// Erzeugt Feedback aus einer abgeschlossenen Sitzung
#[async_trait]
pub trait FeedbackDienst: Send + Sync {
    async fn feedback_anfordern(&self, aufzeichnung: &SitzungsAufzeichnung) -> Result<Feedback>;
}

/// Persistiert eine abgeschlossene Sitzung
#[async_trait]
pub trait SitzungsArchiv: Send + Sync {
    async fn speichern(&self, aufzeichnung: &SitzungsAufzeichnung) -> Result<()>;
}
