//! Transport-Ereignisse
//!
//! Definiert die Ereignisse die von einer Transportstrategie zum
//! Sitzungs-Orchestrator fliessen. Die konkrete Zustellung erfolgt ueber
//! tokio-mpsc-Kanaele; dieses Modul kennt nur die Nutzdaten.

use crate::types::{AudioChunk, Sprecher};

/// Rohe Transkriptzeile ohne Zeitinformation
///
/// Wird vom HTTP-Transport beim Sitzungsende als `full_transcript`
/// uebergeben; die Zeitleiste rekonstruiert daraus Eintraege.
#[derive(Debug, Clone, PartialEq)]
pub struct RohEintrag {
    pub sprecher: Sprecher,
    pub text: String,
}

/// Alle Ereignisse die ein Transport an den Orchestrator meldet
#[derive(Debug, Clone)]
pub enum TransportEreignis {
    /// Audio-Chunk der Gegenstelle, bereit fuer die Wiedergabe
    AudioEmpfangen(AudioChunk),
    /// Finalisierter Transkript-Text einer Aeusserung
    Transkript { sprecher: Sprecher, text: String },
    /// Barge-in: der Benutzer hat den Agenten unterbrochen,
    /// die Wiedergabe-Warteschlange muss geleert werden
    Unterbrechung,
    /// Fehlermeldung der Gegenstelle (terminal fuer die Sitzung)
    Fehler(String),
    /// Die Gegenstelle hat die Sitzung beendet
    Beendet {
        /// Vollstaendiges Transkript, falls die Gegenstelle eines
        /// mitliefert (nur HTTP-Transport)
        voll_transkript: Option<Vec<RohEintrag>>,
    },
}

impl TransportEreignis {
    /// Kurzname fuer Log-Ausgaben
    pub fn name(&self) -> &'static str {
        match self {
            Self::AudioEmpfangen(_) => "audio_empfangen",
            Self::Transkript { .. } => "transkript",
            Self::Unterbrechung => "unterbrechung",
            Self::Fehler(_) => "fehler",
            Self::Beendet { .. } => "beendet",
        }
    }
}
