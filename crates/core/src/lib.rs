//! intervox-core – Gemeinsame Basistypen
//!
//! Fundament fuer alle Intervox-Crates:
//! - Fehlertaxonomie (`IntervoxError`) mit Terminal/Lokal-Klassifikation
//! - Sitzungs- und Transkripttypen inkl. Status-Zustandsmaschine
//! - Transport-Ereignisse die von den Transportstrategien zum
//!   Orchestrator fliessen
//! - Logging-Initialisierung via tracing-subscriber

pub mod error;
pub mod event;
pub mod logging;
pub mod types;

// Bequeme Re-Exporte der wichtigsten Typen
pub use error::{IntervoxError, Result};
pub use event::{RohEintrag, TransportEreignis};
pub use logging::{logging_initialisieren, LoggingEinstellungen};
pub use types::{
    AgentId, AudioChunk, AudioKodierung, SitzungsId, SitzungsStatus, Sprecher, TranskriptEintrag,
    TransportArt,
};
