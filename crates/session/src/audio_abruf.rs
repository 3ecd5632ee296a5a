//! Abruf des Sitzungs-Audios nach dem Ende
//!
//! Das Backend schneidet die Sitzung serverseitig mit und stellt die
//! Aufnahme erst nach einer Verarbeitungszeit bereit. Der Abruf
//! versucht es deshalb mehrfach mit festem Abstand; eine 404 heisst
//! "noch nicht fertig". Scheitert alles, degradiert das Ergebnis zu
//! `None` und die Sitzung schliesst ohne Audio ab.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};

use intervox_core::SitzungsId;

/// Ausgang eines einzelnen Abruf-Versuchs
#[derive(Debug)]
pub enum AbrufErgebnis {
    /// Aufnahme liegt vor
    Bereit(Bytes),
    /// Backend verarbeitet noch (HTTP 404)
    NochNichtBereit,
    /// Endgueltiger Fehler, weitere Versuche sind sinnlos
    Fehler(String),
}

/// Quelle des Sitzungs-Audios
#[async_trait]
pub trait AudioQuelle: Send + Sync {
    async fn versuchen(&self, sitzungs_id: &SitzungsId) -> AbrufErgebnis;
}

/// Abruf-Parameter
#[derive(Debug, Clone)]
pub struct AbrufKonfig {
    pub versuche: u32,
    pub abstand: Duration,
}

impl Default for AbrufKonfig {
    fn default() -> Self {
        Self {
            versuche: 10,
            abstand: Duration::from_secs(3),
        }
    }
}

/// Ruft das Sitzungs-Audio mit begrenzten Wiederholungen ab
pub async fn sitzungs_audio_abrufen(
    quelle: &dyn AudioQuelle,
    sitzungs_id: &SitzungsId,
    konfig: &AbrufKonfig,
) -> Option<Bytes> {
    for versuch in 1..=konfig.versuche {
        match quelle.versuchen(sitzungs_id).await {
            AbrufErgebnis::Bereit(daten) => {
                info!(
                    "Sitzungs-Audio nach {} Versuch(en) erhalten: {} Bytes",
                    versuch,
                    daten.len()
                );
                return Some(daten);
            }
            AbrufErgebnis::NochNichtBereit => {
                debug!("Sitzungs-Audio noch nicht bereit (Versuch {})", versuch);
                if versuch < konfig.versuche {
                    tokio::time::sleep(konfig.abstand).await;
                }
            }
            AbrufErgebnis::Fehler(e) => {
                warn!("Sitzungs-Audio nicht abrufbar: {}", e);
                return None;
            }
        }
    }
    warn!(
        "Sitzungs-Audio nach {} Versuchen aufgegeben",
        konfig.versuche
    );
    None
}

/// Abruf ueber das HTTP-Backend
pub struct HttpAudioQuelle {
    client: reqwest::Client,
    basis_url: String,
}

impl HttpAudioQuelle {
    /// `basis_url` wie beim HTTP-Transport (versionierte REST-Basis)
    pub fn neu(basis_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            basis_url: basis_url.into(),
        }
    }

    fn url(&self, sitzungs_id: &SitzungsId) -> String {
        format!(
            "{}/sessions/{}/audio",
            self.basis_url.trim_end_matches('/'),
            sitzungs_id.als_str()
        )
    }
}

#[async_trait]
impl AudioQuelle for HttpAudioQuelle {
    async fn versuchen(&self, sitzungs_id: &SitzungsId) -> AbrufErgebnis {
        let antwort = match self.client.get(self.url(sitzungs_id)).send().await {
            Ok(antwort) => antwort,
            Err(e) => return AbrufErgebnis::Fehler(e.to_string()),
        };

        if antwort.status().as_u16() == 404 {
            return AbrufErgebnis::NochNichtBereit;
        }
        if !antwort.status().is_success() {
            return AbrufErgebnis::Fehler(format!("HTTP {}", antwort.status()));
        }
        match antwort.bytes().await {
            Ok(daten) => AbrufErgebnis::Bereit(daten),
            Err(e) => AbrufErgebnis::Fehler(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Quelle die erst nach n Versuchen liefert
    struct VerzogerteQuelle {
        ab_versuch: u32,
        zaehler: AtomicU32,
    }

    impl VerzogerteQuelle {
        fn neu(ab_versuch: u32) -> Self {
            Self {
                ab_versuch,
                zaehler: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl AudioQuelle for VerzogerteQuelle {
        async fn versuchen(&self, _sitzungs_id: &SitzungsId) -> AbrufErgebnis {
            let versuch = self.zaehler.fetch_add(1, Ordering::SeqCst) + 1;
            if versuch >= self.ab_versuch {
                AbrufErgebnis::Bereit(Bytes::from_static(b"mp3-daten"))
            } else {
                AbrufErgebnis::NochNichtBereit
            }
        }
    }

    struct KaputteQuelle {
        zaehler: AtomicU32,
    }

    #[async_trait]
    impl AudioQuelle for KaputteQuelle {
        async fn versuchen(&self, _sitzungs_id: &SitzungsId) -> AbrufErgebnis {
            self.zaehler.fetch_add(1, Ordering::SeqCst);
            AbrufErgebnis::Fehler("HTTP 500".into())
        }
    }

    fn konfig() -> AbrufKonfig {
        AbrufKonfig::default()
    }

    #[tokio::test(start_paused = true)]
    async fn wartet_auf_verzoegerte_bereitstellung() {
        let quelle = VerzogerteQuelle::neu(4);
        let daten = sitzungs_audio_abrufen(&quelle, &SitzungsId::neu(), &konfig()).await;
        assert_eq!(daten.as_deref(), Some(b"mp3-daten".as_slice()));
        assert_eq!(quelle.zaehler.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn gibt_nach_allen_versuchen_auf() {
        let quelle = VerzogerteQuelle::neu(99);
        let daten = sitzungs_audio_abrufen(&quelle, &SitzungsId::neu(), &konfig()).await;
        assert!(daten.is_none());
        assert_eq!(quelle.zaehler.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn endgueltiger_fehler_bricht_sofort_ab() {
        let quelle = KaputteQuelle {
            zaehler: AtomicU32::new(0),
        };
        let daten = sitzungs_audio_abrufen(&quelle, &SitzungsId::neu(), &konfig()).await;
        assert!(daten.is_none());
        assert_eq!(quelle.zaehler.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn url_aufbau() {
        let quelle = HttpAudioQuelle::neu("https://app.example.test/wp-json/intervox/v1/");
        let url = quelle.url(&SitzungsId::vom_backend("srv-7"));
        assert_eq!(
            url,
            "https://app.example.test/wp-json/intervox/v1/sessions/srv-7/audio"
        );
    }
}
