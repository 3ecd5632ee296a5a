//! intervox-audio – Audio-Engine
//!
//! Audio-Pipeline fuer Intervox-Sitzungen:
//! - Mikrofon-Capture via cpal mit Chunk-Kodierung im festen Takt
//! - Opus-Kodierung (Fallback: rohes PCM16) via audiopus
//! - Pegelmessung fuer die Visualisierung
//! - Strikt sequentielle Wiedergabe-Warteschlange mit Barge-in-Flush
//!
//! Der Mikrofon-Handle gehoert exklusiv der CaptureEngine solange eine
//! Sitzung laeuft und wird beim Stoppen deterministisch freigegeben.

pub mod capture;
pub mod chunker;
pub mod codec;
pub mod device;
pub mod error;
pub mod pegel;
pub mod playback;

// Bequeme Re-Exporte der wichtigsten Typen
pub use capture::{CaptureEngine, CaptureKonfig, CaptureOptionen, CaptureStroeme};
pub use chunker::ChunkSchneider;
pub use codec::{bevorzugte_kodierung, OpusDekodierer, OpusKodierer};
pub use device::{eingabegeraete_auflisten, AudioGeraet};
pub use error::{AudioError, AudioResult};
pub use pegel::PegelMesser;
pub use playback::{
    ausgabe_oeffnen, AusgabeGriff, AusgabeSenke, SampleSenke, WiedergabeKonfig,
    WiedergabeWarteschlange,
};
