//! Transportstrategie-Schnittstelle
//!
//! Gemeinsamer Vertrag der drei Transportvarianten (nativer WebSocket,
//! Relay-WebSocket, HTTP Runde-fuer-Runde). Der Orchestrator kennt nur
//! diesen Trait; die Variante wird einmal beim Sitzungsstart gewaehlt
//! und wechselt danach nicht mehr.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportResult;
use intervox_core::{AgentId, AudioChunk, SitzungsId, TransportArt, TransportEreignis};

/// Konfiguration einer Sitzung, fest ab Verbindungsaufbau
#[derive(Debug, Clone)]
pub struct SitzungsKonfig {
    /// Ziel-Agent der Konversation
    pub agent_id: AgentId,
    /// Vorgegebenes Szenario (Backend-seitig hinterlegt)
    pub szenario_id: Option<String>,
    /// Freitext-Szenario, falls keine ID verwendet wird
    pub szenario_inhalt: Option<String>,
    /// Eroeffnungssatz des Agenten
    pub initial_nachricht: Option<String>,
    /// Dynamische Variablen (Kandidatenname usw.)
    pub variablen: Value,
    /// Interviewer-Profil (Tonalitaet)
    pub interviewer_profil: Option<String>,
    /// Konversations-Override fuer die WebSocket-Initiierung
    pub konfig_override: Value,
    /// Zeitlimit fuer den Verbindungsaufbau
    pub verbindungs_timeout: Duration,
}

impl Default for SitzungsKonfig {
    fn default() -> Self {
        Self {
            agent_id: AgentId::neu(""),
            szenario_id: None,
            szenario_inhalt: None,
            initial_nachricht: None,
            variablen: Value::Null,
            interviewer_profil: None,
            konfig_override: Value::Null,
            verbindungs_timeout: Duration::from_secs(10),
        }
    }
}

impl SitzungsKonfig {
    pub fn fuer_agent(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            ..Self::default()
        }
    }
}

/// Eine Transportvariante einer laufenden Sitzung
///
/// Lebenszyklus: `starten` genau einmal, danach beliebig
/// `audio_senden` / `runde_abschliessen`, abschliessend `beenden`
/// (idempotent). Ereignisse fliessen ueber den beim Start
/// zurueckgegebenen Kanal; dessen Ende signalisiert dem Orchestrator
/// dass der Transport keine Ereignisse mehr liefert.
#[async_trait]
pub trait TransportStrategie: Send + Sync {
    /// Welche Variante dieser Transport ist
    fn art(&self) -> TransportArt;

    /// Baut die Verbindung auf und liefert den Ereignis-Kanal
    ///
    /// Schlaegt innerhalb von `verbindungs_timeout` fehl mit
    /// `VerbindungFehlgeschlagen`, `AuthFehlgeschlagen` oder `Zeitlimit`.
    async fn starten(
        &mut self,
        konfig: &SitzungsKonfig,
    ) -> TransportResult<mpsc::Receiver<TransportEreignis>>;

    /// Sendet einen Mikrofon-Chunk an die Gegenstelle
    ///
    /// Vor dem Verbindungsaufbau und nach dem Beenden ein No-op.
    async fn audio_senden(&self, chunk: AudioChunk) -> TransportResult<()>;

    /// Schliesst die laufende Benutzer-Runde ab
    ///
    /// Nur der HTTP-Transport hat Runden; fuer die
    /// WebSocket-Varianten ein No-op.
    async fn runde_abschliessen(&self) -> TransportResult<()> {
        Ok(())
    }

    /// Beendet die Sitzung transportseitig; idempotent
    async fn beenden(&mut self);

    /// Sitzungs-ID, sobald bekannt (HTTP: vom Backend, WS: lokal)
    fn sitzungs_id(&self) -> Option<SitzungsId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn konfig_default_timeout() {
        let konfig = SitzungsKonfig::fuer_agent(AgentId::neu("agent-7"));
        assert_eq!(konfig.verbindungs_timeout, Duration::from_secs(10));
        assert_eq!(konfig.agent_id.als_str(), "agent-7");
        assert!(konfig.szenario_id.is_none());
    }
}
