//! Verbindungs-Probe
//!
//! Prueft vor dem Sitzungsstart ob der native WebSocket-Endpunkt aus
//! dem aktuellen Netz erreichbar ist (Firmennetze blockieren wss
//! haeufig). Ergebnisse werden pro Agent fuenf Minuten gecacht damit
//! wiederholte Starts keine Wegwerf-Verbindungen anhaeufen.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio_tungstenite::connect_async;
use tracing::{debug, info};

use crate::error::{TransportError, TransportResult};
use crate::nativ::sitzungs_url;
use intervox_core::AgentId;

/// Standard-Zeitlimit einer Probe
pub const PROBEN_TIMEOUT: Duration = Duration::from_secs(5);
/// Lebensdauer eines Cache-Eintrags
pub const CACHE_TTL: Duration = Duration::from_secs(300);

/// Ergebnis einer Verbindungs-Probe
#[derive(Debug, Clone)]
pub struct ProbenErgebnis {
    pub erfolgreich: bool,
    /// Handshake-Latenz bei Erfolg
    pub latenz_ms: Option<u64>,
    pub fehler: Option<String>,
    gemessen_am: Instant,
}

impl ProbenErgebnis {
    fn erfolg(latenz: Duration) -> Self {
        Self {
            erfolgreich: true,
            latenz_ms: Some(latenz.as_millis() as u64),
            fehler: None,
            gemessen_am: Instant::now(),
        }
    }

    fn fehlschlag(fehler: String) -> Self {
        Self {
            erfolgreich: false,
            latenz_ms: None,
            fehler: Some(fehler),
            gemessen_am: Instant::now(),
        }
    }

    fn ist_frisch(&self, ttl: Duration) -> bool {
        self.gemessen_am.elapsed() < ttl
    }
}

/// Empfohlener Verbindungsweg fuer die naechste Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbindungsmodus {
    /// WebSocket erreichbar (nativ oder Relay)
    Websocket,
    /// Firmennetz: nur HTTP Runde-fuer-Runde
    Corporate,
}

/// Oeffnet die Wegwerf-Verbindung einer Probe
///
/// Als Trait herausgezogen damit die Cache- und Fallback-Logik ohne
/// Netzwerk testbar ist.
#[async_trait]
pub trait ProbenVerbinder: Send + Sync {
    async fn verbinden(&self, url: &str) -> TransportResult<()>;
}

/// Echte Probe via tokio-tungstenite
pub struct WsVerbinder;

#[async_trait]
impl ProbenVerbinder for WsVerbinder {
    async fn verbinden(&self, url: &str) -> TransportResult<()> {
        let (mut strom, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::VerbindungFehlgeschlagen(e.to_string()))?;
        // Nur der Handshake zaehlt, sofort wieder schliessen
        let _ = strom.close(None).await;
        Ok(())
    }
}

/// Verbindungs-Probe mit TTL-Cache pro Agent
pub struct VerbindungsProbe {
    verbinder: Arc<dyn ProbenVerbinder>,
    basis_url: String,
    cache: DashMap<AgentId, ProbenErgebnis>,
    ttl: Duration,
}

impl VerbindungsProbe {
    /// `basis_url` des nativen Dienstes, z. B. `wss://api.elevenlabs.io`
    pub fn neu(basis_url: impl Into<String>) -> Self {
        Self::mit_verbinder(Arc::new(WsVerbinder), basis_url, CACHE_TTL)
    }

    pub fn mit_verbinder(
        verbinder: Arc<dyn ProbenVerbinder>,
        basis_url: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            verbinder,
            basis_url: basis_url.into(),
            cache: DashMap::new(),
            ttl,
        }
    }

    /// Testet die Erreichbarkeit des nativen Endpunkts
    ///
    /// Ein frisches Cache-Ergebnis wird ohne neue Verbindung
    /// zurueckgegeben.
    pub async fn testen(&self, agent_id: &AgentId, timeout: Duration) -> ProbenErgebnis {
        if let Some(eintrag) = self.cache.get(agent_id) {
            if eintrag.ist_frisch(self.ttl) {
                debug!("Probe aus Cache: agent={}", agent_id);
                return eintrag.clone();
            }
        }

        let url = sitzungs_url(&self.basis_url, agent_id);
        let start = Instant::now();
        let ergebnis = match tokio::time::timeout(timeout, self.verbinder.verbinden(&url)).await {
            Ok(Ok(())) => ProbenErgebnis::erfolg(start.elapsed()),
            Ok(Err(e)) => ProbenErgebnis::fehlschlag(e.to_string()),
            Err(_) => {
                ProbenErgebnis::fehlschlag(format!("Zeitlimit nach {:?}", timeout))
            }
        };

        info!(
            "Probe agent={}: erfolgreich={} latenz={:?}ms",
            agent_id, ergebnis.erfolgreich, ergebnis.latenz_ms
        );
        self.cache.insert(agent_id.clone(), ergebnis.clone());
        ergebnis
    }

    /// Empfiehlt den Verbindungsweg fuer den Agenten
    ///
    /// Schlaegt die Probe fehl, faellt die Wahl auf den
    /// Corporate-Modus (HTTP Runde-fuer-Runde).
    pub async fn bester_verbindungsmodus(&self, agent_id: &AgentId) -> Verbindungsmodus {
        if self.testen(agent_id, PROBEN_TIMEOUT).await.erfolgreich {
            Verbindungsmodus::Websocket
        } else {
            Verbindungsmodus::Corporate
        }
    }

    /// Verwirft das Cache-Ergebnis eines Agenten
    pub fn invalidieren(&self, agent_id: &AgentId) {
        self.cache.remove(agent_id);
    }
}
