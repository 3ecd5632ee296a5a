//! Sitzungs-Orchestrator
//!
//! Verdrahtet Mikrofon, Transport, Wiedergabe und Zeitleiste zu einer
//! Duplex-Sitzung. Der Orchestrator ist eine Zustandsmaschine ueber
//! `SitzungsStatus`: `starten` fuehrt von Leerlauf nach Verbunden,
//! `anruf_beenden` baut alles wieder ab und liefert die fertige
//! Aufzeichnung. Ein Sonderfall ist das Ende waehrend des
//! Verbindungsaufbaus: `anruf_beenden` markiert die Sitzung als
//! Beendend und der noch laufende `starten`-Aufruf raeumt den frisch
//! verbundenen Transport selbst wieder ab.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use intervox_audio::WiedergabeWarteschlange;
use intervox_core::{
    AgentId, AudioChunk, IntervoxError, Result, SitzungsStatus, TranskriptEintrag, TransportArt,
    TransportEreignis,
};
use intervox_transport::{
    strategie_erstellen, SitzungsKonfig, TransportEndpunkte, TransportStrategie,
    VerbindungsProbe, Verbindungsmodus,
};

use crate::audio_abruf::{sitzungs_audio_abrufen, AbrufKonfig, AudioQuelle, HttpAudioQuelle};
use crate::config::IntervoxKonfig;
use crate::feedback::{FeedbackDienst, SitzungsArchiv, SitzungsAufzeichnung};
use crate::geraete::{
    AufnahmeGriff, AufnahmeQuelle, AusgabeOeffner, AusgabeVerschluss, GeraeteAusgabe,
    MikrofonQuelle,
};
use crate::transcript::TranskriptZeitleiste;

/// Erzeugt die Transportvariante einer neuen Sitzung
pub trait TransportFabrik: Send + Sync {
    fn erstellen(&self, art: TransportArt) -> Box<dyn TransportStrategie>;
}

/// Produktive Fabrik ueber die konfigurierten Endpunkte
pub struct StandardFabrik {
    endpunkte: TransportEndpunkte,
}

impl StandardFabrik {
    pub fn neu(endpunkte: TransportEndpunkte) -> Self {
        Self { endpunkte }
    }
}

impl TransportFabrik for StandardFabrik {
    fn erstellen(&self, art: TransportArt) -> Box<dyn TransportStrategie> {
        strategie_erstellen(art, &self.endpunkte)
    }
}

/// Austauschbare Bauteile des Orchestrators
///
/// Transport, Geraete und Abschlussdienste haengen hinter Traits;
/// `standard` liefert die produktive Belegung. Feedback und Archiv
/// sind optional: ohne sie schliesst die Sitzung ohne Rueckmeldung
/// bzw. ohne Persistenz ab.
pub struct OrchestratorBauteile {
    pub fabrik: Arc<dyn TransportFabrik>,
    pub aufnahme: Arc<dyn AufnahmeQuelle>,
    pub ausgabe: Arc<dyn AusgabeOeffner>,
    pub feedback: Option<Arc<dyn FeedbackDienst>>,
    pub archiv: Option<Arc<dyn SitzungsArchiv>>,
    pub audio_quelle: Option<Arc<dyn AudioQuelle>>,
}

impl OrchestratorBauteile {
    pub fn standard(konfig: &IntervoxKonfig) -> Self {
        Self {
            fabrik: Arc::new(StandardFabrik::neu(konfig.endpunkte.als_endpunkte())),
            aufnahme: Arc::new(MikrofonQuelle),
            ausgabe: Arc::new(GeraeteAusgabe),
            feedback: None,
            archiv: None,
            audio_quelle: Some(Arc::new(HttpAudioQuelle::neu(
                konfig.endpunkte.http_basis.clone(),
            ))),
        }
    }
}

/// Laufzeitdaten einer begonnenen Sitzung
struct LaufendeSitzung {
    agent_id: AgentId,
    transport_art: TransportArt,
    begonnen: Instant,
    begonnen_am: DateTime<Utc>,
}

/// Orchestriert eine Interview-Sitzung von Start bis Aufzeichnung
pub struct SitzungsOrchestrator {
    konfig: IntervoxKonfig,
    bauteile: OrchestratorBauteile,
    status: Arc<watch::Sender<SitzungsStatus>>,
    zeitleiste: Arc<Mutex<TranskriptZeitleiste>>,
    /// Pumpe und Ereignis-Schleife laufen solange dies true ist
    aktiv: Arc<AtomicBool>,
    stumm: Arc<AtomicBool>,
    transport: Arc<AsyncMutex<Option<Box<dyn TransportStrategie>>>>,
    wiedergabe: Mutex<Option<Arc<WiedergabeWarteschlange>>>,
    aufnahme_griff: Mutex<Option<Box<dyn AufnahmeGriff>>>,
    ausgabe_verschluss: Mutex<Option<Box<dyn AusgabeVerschluss>>>,
    pegel: Mutex<Option<watch::Receiver<f32>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    sitzung: Mutex<Option<LaufendeSitzung>>,
}

impl SitzungsOrchestrator {
    /// Orchestrator mit produktiven Bauteilen (echte Geraete, echte
    /// Transporte)
    pub fn neu(konfig: IntervoxKonfig) -> Self {
        let bauteile = OrchestratorBauteile::standard(&konfig);
        Self::mit_bauteilen(konfig, bauteile)
    }

    pub fn mit_bauteilen(konfig: IntervoxKonfig, bauteile: OrchestratorBauteile) -> Self {
        let (status, _) = watch::channel(SitzungsStatus::Leerlauf);
        Self {
            konfig,
            bauteile,
            status: Arc::new(status),
            zeitleiste: Arc::new(Mutex::new(TranskriptZeitleiste::neu())),
            aktiv: Arc::new(AtomicBool::new(false)),
            stumm: Arc::new(AtomicBool::new(false)),
            transport: Arc::new(AsyncMutex::new(None)),
            wiedergabe: Mutex::new(None),
            aufnahme_griff: Mutex::new(None),
            ausgabe_verschluss: Mutex::new(None),
            pegel: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            sitzung: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Statusmaschine
    // ------------------------------------------------------------------

    pub fn status(&self) -> SitzungsStatus {
        *self.status.borrow()
    }

    /// Beobachtet Statuswechsel (fuer UI-Anbindung)
    pub fn status_beobachten(&self) -> watch::Receiver<SitzungsStatus> {
        self.status.subscribe()
    }

    fn status_wechseln(&self, neu: SitzungsStatus) -> bool {
        status_setzen(&self.status, neu)
    }

    // ------------------------------------------------------------------
    // Transportwahl
    // ------------------------------------------------------------------

    /// Waehlt die Transportvariante der naechsten Sitzung
    ///
    /// Ein konfigurierter `erzwungener_transport` gewinnt; sonst
    /// entscheidet die Verbindungs-Probe zwischen WebSocket und der
    /// Runden-Variante fuer restriktive Netze.
    pub async fn transport_waehlen(
        &self,
        probe: &VerbindungsProbe,
        agent_id: &AgentId,
    ) -> TransportArt {
        if let Some(art) = self.konfig.sitzung.erzwungener_transport {
            debug!(transport = %art, "Transportvariante per Konfiguration erzwungen");
            return art;
        }
        match probe.bester_verbindungsmodus(agent_id).await {
            Verbindungsmodus::Websocket => TransportArt::Nativ,
            Verbindungsmodus::Corporate => TransportArt::Http,
        }
    }

    // ------------------------------------------------------------------
    // Sitzungsstart
    // ------------------------------------------------------------------

    /// Baut die Sitzung auf: Mikrofon zuerst, dann Transport, dann
    /// Wiedergabe
    ///
    /// Die Mikrofon-Freigabe kommt vor dem Verbindungsaufbau: wird sie
    /// verweigert, entsteht gar keine Verbindung. Schlaegt ein Schritt
    /// fehl, werden die schon aufgebauten Teile wieder freigegeben und
    /// der Status geht nach `Fehler`.
    pub async fn starten(
        &self,
        art: TransportArt,
        sitzungs_konfig: SitzungsKonfig,
    ) -> Result<()> {
        if !self.status_wechseln(SitzungsStatus::Verbindet) {
            return Err(IntervoxError::Konfiguration(
                "Sitzung laeuft bereits oder Orchestrator wurde nicht zurueckgesetzt".into(),
            ));
        }
        *self.zeitleiste.lock() = TranskriptZeitleiste::neu();
        self.stumm.store(false, Ordering::SeqCst);

        // Mikrofon zuerst: ohne Freigabe keine Verbindung
        let capture_konfig = self.konfig.aufnahme.als_capture_konfig();
        let geraet = self.konfig.aufnahme.geraet_id.as_deref();
        let (griff, stroeme) = match self.bauteile.aufnahme.starten(&capture_konfig, geraet) {
            Ok(aufnahme) => aufnahme,
            Err(e) => {
                self.status_wechseln(SitzungsStatus::Fehler);
                return Err(e);
            }
        };
        *self.pegel.lock() = Some(stroeme.pegel.clone());
        *self.aufnahme_griff.lock() = Some(griff);

        // Transport aufbauen
        let mut konfig = sitzungs_konfig;
        konfig.verbindungs_timeout =
            Duration::from_secs(self.konfig.sitzung.verbindungs_timeout_sekunden);
        let agent_id = konfig.agent_id.clone();
        let mut transport = self.bauteile.fabrik.erstellen(art);
        let ereignisse = match transport.starten(&konfig).await {
            Ok(ereignisse) => ereignisse,
            Err(e) => {
                self.aufnahme_stoppen();
                self.status_wechseln(SitzungsStatus::Fehler);
                return Err(e.into());
            }
        };

        // Wurde die Sitzung waehrend des Verbindens beendet, schlaegt
        // der Wechsel nach Verbunden fehl (Beendend laesst ihn nicht
        // zu) und die frische Verbindung wird sofort wieder abgebaut.
        if !self.status_wechseln(SitzungsStatus::Verbunden) {
            transport.beenden().await;
            self.aufnahme_stoppen();
            self.status_wechseln(SitzungsStatus::Getrennt);
            info!("Sitzung waehrend des Verbindungsaufbaus beendet");
            return Ok(());
        }

        // Wiedergabe oeffnen
        let wiedergabe_konfig = self.konfig.wiedergabe.als_wiedergabe_konfig();
        let ausgabe_geraet = self.konfig.wiedergabe.geraet_id.as_deref();
        let (verschluss, mut senke) =
            match self.bauteile.ausgabe.oeffnen(&wiedergabe_konfig, ausgabe_geraet) {
                Ok(ausgabe) => ausgabe,
                Err(e) => {
                    transport.beenden().await;
                    self.aufnahme_stoppen();
                    self.status_wechseln(SitzungsStatus::Fehler);
                    return Err(e);
                }
            };
        *self.ausgabe_verschluss.lock() = Some(verschluss);
        let warteschlange = Arc::new(WiedergabeWarteschlange::neu(wiedergabe_konfig));
        *self.wiedergabe.lock() = Some(warteschlange.clone());

        let begonnen = Instant::now();
        *self.sitzung.lock() = Some(LaufendeSitzung {
            agent_id,
            transport_art: art,
            begonnen,
            begonnen_am: Utc::now(),
        });
        self.aktiv.store(true, Ordering::SeqCst);
        *self.transport.lock().await = Some(transport);

        // Hintergrund-Tasks: Mikrofon-Pumpe, Ereignis-Schleife,
        // Wiedergabe-Schleife
        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(chunk_pumpe(
            stroeme.chunks,
            self.transport.clone(),
            self.aktiv.clone(),
            self.stumm.clone(),
        )));
        tasks.push(tokio::spawn(ereignis_schleife(
            ereignisse,
            self.zeitleiste.clone(),
            warteschlange.clone(),
            self.status.clone(),
            self.aktiv.clone(),
            begonnen,
        )));
        tasks.push(tokio::spawn(async move {
            warteschlange.abspielen(senke.as_mut()).await;
        }));

        info!(transport = %art, "Sitzung verbunden");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Laufende Sitzung
    // ------------------------------------------------------------------

    /// Stummschaltung: Chunks werden weiter aufgenommen, aber nicht
    /// gesendet
    pub fn stumm_schalten(&self, stumm: bool) {
        self.stumm.store(stumm, Ordering::SeqCst);
        debug!(stumm = stumm, "Stummschaltung umgeschaltet");
    }

    pub fn ist_stumm(&self) -> bool {
        self.stumm.load(Ordering::SeqCst)
    }

    /// Schliesst die laufende Benutzer-Runde ab (nur HTTP-Transport,
    /// sonst No-op)
    pub async fn runde_abschliessen(&self) -> Result<()> {
        let transport = self.transport.lock().await;
        match transport.as_ref() {
            Some(transport) => Ok(transport.runde_abschliessen().await?),
            None => Ok(()),
        }
    }

    /// Sekunden seit dem Verbindungsaufbau
    pub fn verstrichene_sekunden(&self) -> f64 {
        self.sitzung
            .lock()
            .as_ref()
            .map(|s| s.begonnen.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Momentaufnahme des Transkripts
    pub fn transkript(&self) -> Vec<TranskriptEintrag> {
        self.zeitleiste.lock().eintraege().to_vec()
    }

    /// Eingangspegel des Mikrofons, solange eine Aufnahme laeuft
    pub fn pegel(&self) -> Option<watch::Receiver<f32>> {
        self.pegel.lock().clone()
    }

    // ------------------------------------------------------------------
    // Sitzungsende
    // ------------------------------------------------------------------

    /// Beendet die Sitzung und liefert die Aufzeichnung
    ///
    /// Ablauf: Mikrofon stoppen, Transport beenden (der HTTP-Transport
    /// sendet dabei seine Ende-Runde), Wiedergabe leeren, Tasks
    /// auslaufen lassen, Geraete schliessen. Erst nach dem Abbau
    /// laufen die Abschlussdienste; ein leeres Transkript bricht vor
    /// dem Feedback mit `LeeresTranskript` ab.
    ///
    /// Ein Abbruch noch waehrend des Verbindungsaufbaus ist kein
    /// Fehler: dann gibt es schlicht keine Aufzeichnung (`Ok(None)`).
    pub async fn anruf_beenden(&self) -> Result<Option<SitzungsAufzeichnung>> {
        match self.status() {
            SitzungsStatus::Leerlauf => {
                return Err(IntervoxError::Konfiguration("Keine Sitzung aktiv".into()));
            }
            SitzungsStatus::Verbindet => {
                // Ende vor dem Verbindungsaufbau: Beendend markieren,
                // der laufende starten-Aufruf baut den Transport ab.
                self.status_wechseln(SitzungsStatus::Beendend);
                self.aktiv.store(false, Ordering::SeqCst);
                self.aufnahme_stoppen();
                return Ok(None);
            }
            SitzungsStatus::Getrennt | SitzungsStatus::Fehler
                if self.sitzung.lock().is_none() =>
            {
                return Err(IntervoxError::Konfiguration(
                    "Sitzung ist bereits abgeschlossen".into(),
                ));
            }
            // Verbunden, Beendend oder ferngesteuert beendet mit noch
            // offener Aufzeichnung
            _ => {}
        }

        if !self.status().ist_terminal() {
            self.status_wechseln(SitzungsStatus::Beendend);
        }
        self.aktiv.store(false, Ordering::SeqCst);
        self.aufnahme_stoppen();

        // Transport beenden; beim HTTP-Transport faellt hier das
        // Gesamttranskript als letztes Ereignis an
        let mut sitzungs_id = None;
        if let Some(mut transport) = self.transport.lock().await.take() {
            sitzungs_id = transport.sitzungs_id();
            transport.beenden().await;
        }

        if let Some(warteschlange) = self.wiedergabe.lock().take() {
            warteschlange.leeren();
            warteschlange.beenden();
        }

        // Tasks auslaufen lassen: die Ereignis-Schleife endet mit dem
        // geschlossenen Kanal, die Pumpe mit dem gestoppten Mikrofon
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if task.await.is_err() {
                error!("Sitzungs-Task ist abgestuerzt");
            }
        }

        if let Some(mut verschluss) = self.ausgabe_verschluss.lock().take() {
            verschluss.schliessen();
        }
        *self.pegel.lock() = None;

        if !self.status().ist_terminal() {
            self.status_wechseln(SitzungsStatus::Getrennt);
        }

        let Some(sitzung) = self.sitzung.lock().take() else {
            return Err(IntervoxError::Intern("Sitzungsdaten fehlen".into()));
        };
        let transkript = self.zeitleiste.lock().eintraege().to_vec();
        if transkript.is_empty() {
            warn!("Sitzung ohne Transkript beendet, Abschlussdienste entfallen");
            return Err(IntervoxError::LeeresTranskript);
        }

        let mut aufzeichnung = SitzungsAufzeichnung {
            sitzungs_id: sitzungs_id.unwrap_or_default(),
            agent_id: sitzung.agent_id,
            transport: sitzung.transport_art,
            begonnen_am: sitzung.begonnen_am,
            dauer_sekunden: sitzung.begonnen.elapsed().as_secs_f64(),
            transkript,
            audio: None,
            feedback: None,
        };

        // Nur das HTTP-Backend schneidet serverseitig mit
        if sitzung.transport_art == TransportArt::Http {
            if let Some(quelle) = &self.bauteile.audio_quelle {
                let abruf = AbrufKonfig {
                    versuche: self.konfig.sitzung.audio_abruf_versuche,
                    abstand: Duration::from_secs(
                        self.konfig.sitzung.audio_abruf_abstand_sekunden,
                    ),
                };
                aufzeichnung.audio =
                    sitzungs_audio_abrufen(quelle.as_ref(), &aufzeichnung.sitzungs_id, &abruf)
                        .await;
            }
        }

        // Abschlussdienste degradieren: ihr Scheitern kostet nie die
        // Aufzeichnung
        if let Some(dienst) = &self.bauteile.feedback {
            match dienst.feedback_anfordern(&aufzeichnung).await {
                Ok(feedback) => aufzeichnung.feedback = Some(feedback),
                Err(e) => warn!("Feedback-Dienst fehlgeschlagen: {}", e),
            }
        }
        if let Some(archiv) = &self.bauteile.archiv {
            if let Err(e) = archiv.speichern(&aufzeichnung).await {
                warn!("Archivierung fehlgeschlagen: {}", e);
            }
        }

        info!(
            eintraege = aufzeichnung.transkript.len(),
            dauer_sekunden = format!("{:.0}", aufzeichnung.dauer_sekunden).as_str(),
            "Sitzung beendet"
        );
        Ok(Some(aufzeichnung))
    }

    /// Macht den Orchestrator nach `Getrennt`/`Fehler` wieder
    /// startbereit
    pub fn zuruecksetzen(&self) -> bool {
        if !self.status_wechseln(SitzungsStatus::Leerlauf) {
            return false;
        }
        *self.zeitleiste.lock() = TranskriptZeitleiste::neu();
        *self.sitzung.lock() = None;
        self.stumm.store(false, Ordering::SeqCst);
        true
    }

    fn aufnahme_stoppen(&self) {
        if let Some(mut griff) = self.aufnahme_griff.lock().take() {
            griff.stoppen();
        }
    }
}

fn status_setzen(status: &watch::Sender<SitzungsStatus>, neu: SitzungsStatus) -> bool {
    status.send_if_modified(|aktuell| {
        if aktuell.uebergang_erlaubt(neu) {
            debug!("Statuswechsel {:?} -> {:?}", aktuell, neu);
            *aktuell = neu;
            true
        } else {
            warn!("Unzulaessiger Statuswechsel {:?} -> {:?} verworfen", aktuell, neu);
            false
        }
    })
}

/// Leitet Mikrofon-Chunks an den Transport weiter
///
/// Stummgeschaltete Chunks werden verworfen, nicht aufgestaut. Endet
/// wenn die Aufnahme stoppt (Kanal schliesst) oder die Sitzung nicht
/// mehr aktiv ist.
async fn chunk_pumpe(
    mut chunks: mpsc::Receiver<AudioChunk>,
    transport: Arc<AsyncMutex<Option<Box<dyn TransportStrategie>>>>,
    aktiv: Arc<AtomicBool>,
    stumm: Arc<AtomicBool>,
) {
    while let Some(chunk) = chunks.recv().await {
        if !aktiv.load(Ordering::SeqCst) {
            break;
        }
        if stumm.load(Ordering::SeqCst) {
            continue;
        }
        let transport = transport.lock().await;
        if let Some(transport) = transport.as_ref() {
            if let Err(e) = transport.audio_senden(chunk).await {
                warn!("Audio-Chunk nicht gesendet: {}", e);
            }
        }
    }
    debug!("Mikrofon-Pumpe beendet");
}

/// Verarbeitet Transport-Ereignisse bis der Kanal schliesst
async fn ereignis_schleife(
    mut ereignisse: mpsc::Receiver<TransportEreignis>,
    zeitleiste: Arc<Mutex<TranskriptZeitleiste>>,
    wiedergabe: Arc<WiedergabeWarteschlange>,
    status: Arc<watch::Sender<SitzungsStatus>>,
    aktiv: Arc<AtomicBool>,
    begonnen: Instant,
) {
    while let Some(ereignis) = ereignisse.recv().await {
        if !aktiv.load(Ordering::SeqCst) {
            // Nach dem Ende interessiert nur noch das
            // Gesamttranskript der Ende-Runde
            if let TransportEreignis::Beendet {
                voll_transkript: Some(roh),
            } = &ereignis
            {
                zeitleiste.lock().voll_transkript_uebernehmen(roh);
            }
            continue;
        }
        match ereignis {
            TransportEreignis::AudioEmpfangen(chunk) => {
                wiedergabe.einreihen(chunk);
            }
            TransportEreignis::Transkript { sprecher, text } => {
                let verstrichen = begonnen.elapsed().as_secs_f64();
                zeitleiste.lock().anfuegen(sprecher, text, verstrichen);
            }
            TransportEreignis::Unterbrechung => {
                debug!("Barge-in, Wiedergabe wird geleert");
                wiedergabe.leeren();
            }
            TransportEreignis::Fehler(nachricht) => {
                error!("Gegenstelle meldet Fehler: {}", nachricht);
                aktiv.store(false, Ordering::SeqCst);
                status_setzen(&status, SitzungsStatus::Fehler);
            }
            TransportEreignis::Beendet { voll_transkript } => {
                if let Some(roh) = &voll_transkript {
                    zeitleiste.lock().voll_transkript_uebernehmen(roh);
                }
                aktiv.store(false, Ordering::SeqCst);
                status_setzen(&status, SitzungsStatus::Getrennt);
            }
        }
    }
    debug!("Ereignis-Schleife beendet");
}
