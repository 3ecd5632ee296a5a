//! Geraete-Anbindung des Orchestrators
//!
//! Mikrofon und Lautsprecher haengen hinter schmalen Traits, damit die
//! Sitzungslogik ohne Audio-Hardware testbar bleibt. Produktiv stecken
//! dahinter die CaptureEngine und der cpal-Ausgabe-Stream aus
//! intervox-audio.

use intervox_audio::{
    ausgabe_oeffnen, AusgabeGriff, CaptureEngine, CaptureKonfig, CaptureOptionen, CaptureStroeme,
    SampleSenke, WiedergabeKonfig,
};
use intervox_core::Result;

/// Haelt eine laufende Aufnahme und gibt sie beim Stoppen frei
pub trait AufnahmeGriff: Send {
    /// Beendet die Aufnahme; idempotent
    fn stoppen(&mut self);
}

impl AufnahmeGriff for CaptureEngine {
    fn stoppen(&mut self) {
        CaptureEngine::stoppen(self);
    }
}

/// Startet Aufnahmen fuer den Orchestrator
pub trait AufnahmeQuelle: Send + Sync {
    fn starten(
        &self,
        konfig: &CaptureKonfig,
        geraet_id: Option<&str>,
    ) -> Result<(Box<dyn AufnahmeGriff>, CaptureStroeme)>;
}

/// Echtes Mikrofon via CaptureEngine
pub struct MikrofonQuelle;

impl AufnahmeQuelle for MikrofonQuelle {
    fn starten(
        &self,
        konfig: &CaptureKonfig,
        geraet_id: Option<&str>,
    ) -> Result<(Box<dyn AufnahmeGriff>, CaptureStroeme)> {
        let optionen = CaptureOptionen {
            geraet_id: geraet_id.map(str::to_owned),
        };
        let (engine, stroeme) = CaptureEngine::starten(konfig.clone(), optionen)?;
        Ok((Box::new(engine), stroeme))
    }
}

/// Haelt den geoeffneten Ausgabe-Stream
pub trait AusgabeVerschluss: Send {
    /// Schliesst den Stream; idempotent
    fn schliessen(&mut self);
}

impl AusgabeVerschluss for AusgabeGriff {
    fn schliessen(&mut self) {
        AusgabeGriff::schliessen(self);
    }
}

/// Oeffnet die Audio-Ausgabe einer Sitzung
///
/// Pro Sitzung wird ein frischer Ausgabe-Stream geoeffnet und beim
/// Ende geschlossen, nie wiederverwendet.
pub trait AusgabeOeffner: Send + Sync {
    fn oeffnen(
        &self,
        konfig: &WiedergabeKonfig,
        geraet_id: Option<&str>,
    ) -> Result<(Box<dyn AusgabeVerschluss>, Box<dyn SampleSenke>)>;
}

/// Echter Lautsprecher via cpal
pub struct GeraeteAusgabe;

impl AusgabeOeffner for GeraeteAusgabe {
    fn oeffnen(
        &self,
        konfig: &WiedergabeKonfig,
        geraet_id: Option<&str>,
    ) -> Result<(Box<dyn AusgabeVerschluss>, Box<dyn SampleSenke>)> {
        let (griff, senke) = ausgabe_oeffnen(konfig, geraet_id)?;
        Ok((Box::new(griff), Box::new(senke)))
    }
}
