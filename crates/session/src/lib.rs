//! intervox-session – Sitzungsschicht
//!
//! Orchestriert eine Interview-Sitzung von der Mikrofon-Freigabe bis
//! zur fertigen Aufzeichnung: Transportwahl, Transkript-Zeitleiste,
//! Wiedergabe eingehender Antworten und die Abschlussdienste
//! (Sitzungs-Audio, Feedback, Archivierung).
//!
//! Einstiegspunkt ist der `SitzungsOrchestrator`; seine Bauteile sind
//! ueber `OrchestratorBauteile` austauschbar.

pub mod audio_abruf;
pub mod config;
pub mod feedback;
pub mod geraete;
pub mod orchestrator;
pub mod transcript;

pub use audio_abruf::{
    sitzungs_audio_abrufen, AbrufErgebnis, AbrufKonfig, AudioQuelle, HttpAudioQuelle,
};
pub use config::IntervoxKonfig;
pub use feedback::{Feedback, FeedbackDienst, SitzungsArchiv, SitzungsAufzeichnung};
pub use geraete::{
    AufnahmeGriff, AufnahmeQuelle, AusgabeOeffner, AusgabeVerschluss, GeraeteAusgabe,
    MikrofonQuelle,
};
pub use orchestrator::{
    OrchestratorBauteile, SitzungsOrchestrator, StandardFabrik, TransportFabrik,
};
pub use transcript::TranskriptZeitleiste;
