//! intervox-transport – Transportstrategien
//!
//! Drei austauschbare Wege zum Konversations-Backend:
//! - `NativTransport`: direkter WebSocket zum Konversationsdienst
//! - `ProxyTransport`: WebSocket ueber den selbst gehosteten Relay
//! - `HttpTransport`: HTTP Runde-fuer-Runde fuer restriktive Netze
//!
//! Dazu die `VerbindungsProbe` die vor dem Start misst welcher Weg
//! aus dem aktuellen Netz erreichbar ist.

pub mod error;
pub mod http;
pub mod nativ;
pub mod probe;
pub mod proxy;
pub mod strategie;
mod ws_leitung;

pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use nativ::NativTransport;
pub use probe::{
    ProbenErgebnis, ProbenVerbinder, VerbindungsProbe, Verbindungsmodus, CACHE_TTL,
    PROBEN_TIMEOUT,
};
pub use proxy::ProxyTransport;
pub use strategie::{SitzungsKonfig, TransportStrategie};

use intervox_core::TransportArt;

/// Endpunkte der drei Transportwege
#[derive(Debug, Clone)]
pub struct TransportEndpunkte {
    /// Basis des nativen Dienstes, z. B. `wss://api.elevenlabs.io`
    pub nativ_basis: String,
    /// Vollstaendige Relay-URL, z. B. `wss://relay.intervox.app/ws`
    pub proxy_url: String,
    /// Versionierte REST-Basis des HTTP-Backends
    pub http_basis: String,
}

impl Default for TransportEndpunkte {
    fn default() -> Self {
        Self {
            nativ_basis: "wss://api.elevenlabs.io".into(),
            proxy_url: "wss://relay.intervox.app/ws".into(),
            http_basis: "https://app.intervox.app/wp-json/intervox/v1".into(),
        }
    }
}

/// Erstellt die Transportvariante fuer eine neue Sitzung
pub fn strategie_erstellen(
    art: TransportArt,
    endpunkte: &TransportEndpunkte,
) -> Box<dyn TransportStrategie> {
    match art {
        TransportArt::Nativ => Box::new(NativTransport::neu(endpunkte.nativ_basis.clone())),
        TransportArt::Proxy => Box::new(ProxyTransport::neu(endpunkte.proxy_url.clone())),
        TransportArt::Http => Box::new(HttpTransport::neu(endpunkte.http_basis.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fabrik_liefert_die_passende_variante() {
        let endpunkte = TransportEndpunkte::default();
        assert_eq!(
            strategie_erstellen(TransportArt::Nativ, &endpunkte).art(),
            TransportArt::Nativ
        );
        assert_eq!(
            strategie_erstellen(TransportArt::Proxy, &endpunkte).art(),
            TransportArt::Proxy
        );
        assert_eq!(
            strategie_erstellen(TransportArt::Http, &endpunkte).art(),
            TransportArt::Http
        );
    }
}
