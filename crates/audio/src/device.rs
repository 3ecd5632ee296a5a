//! Audio-Geraete-Enumeration und -Auswahl
//!
//! Aufloesung einer optionalen Geraete-ID auf ein cpal-Device. Die
//! Namens-Zuordnung ist als reine Funktion herausgezogen damit sie ohne
//! Audio-Hardware testbar bleibt.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use tracing::{debug, warn};

use crate::error::{AudioError, AudioResult};

/// Ein Audio-Geraet mit seinen Eigenschaften
#[derive(Debug, Clone)]
pub struct AudioGeraet {
    /// Geraetename (dient zugleich als ID)
    pub name: String,
    /// Maximale Kanalanzahl
    pub kanaele: u16,
}

/// Listet alle verfuegbaren Eingabegeraete auf
pub fn eingabegeraete_auflisten() -> AudioResult<Vec<AudioGeraet>> {
    let host = cpal::default_host();
    let geraete = host
        .input_devices()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let mut ergebnis = Vec::new();
    for geraet in geraete {
        match geraet.name() {
            Ok(name) => {
                let kanaele = geraet
                    .supported_input_configs()
                    .ok()
                    .and_then(|mut cfgs| cfgs.next())
                    .map(|c| c.channels())
                    .unwrap_or(1);
                ergebnis.push(AudioGeraet { name, kanaele });
            }
            Err(e) => warn!("Eingabegeraet konnte nicht gelesen werden: {}", e),
        }
    }
    debug!("Gefundene Eingabegeraete: {}", ergebnis.len());
    Ok(ergebnis)
}

/// Waehlt aus einer Namensliste den Treffer fuer die gesuchte ID
///
/// Teilstring-Match: "USB" trifft "USB-Mikrofon (C-Media)".
pub fn name_aufloesen<'a>(namen: impl IntoIterator<Item = &'a str>, gesucht: &str) -> Option<usize> {
    namen
        .into_iter()
        .position(|name| name.contains(gesucht))
}

/// Laedt das cpal-Eingabegeraet fuer eine optionale Geraete-ID
///
/// `None` liefert das Standard-Eingabegeraet. Eine ID ohne Treffer
/// ergibt `GeraetNichtGefunden`; es wird dabei kein Stream geoeffnet.
pub fn eingabegeraet_finden(geraet_id: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match geraet_id {
        None => host
            .default_input_device()
            .ok_or(AudioError::KeinStandardEingabegeraet),
        Some(id) => {
            let geraete: Vec<Device> = host
                .input_devices()
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?
                .collect();
            let namen: Vec<String> = geraete
                .iter()
                .map(|g| g.name().unwrap_or_default())
                .collect();
            name_aufloesen(namen.iter().map(String::as_str), id)
                .and_then(|index| geraete.into_iter().nth(index))
                .ok_or_else(|| AudioError::GeraetNichtGefunden(id.to_string()))
        }
    }
}

/// Laedt das cpal-Ausgabegeraet fuer eine optionale Geraete-ID
pub fn ausgabegeraet_finden(geraet_id: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match geraet_id {
        None => host
            .default_output_device()
            .ok_or(AudioError::KeinStandardAusgabegeraet),
        Some(id) => {
            let geraete: Vec<Device> = host
                .output_devices()
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?
                .collect();
            let namen: Vec<String> = geraete
                .iter()
                .map(|g| g.name().unwrap_or_default())
                .collect();
            name_aufloesen(namen.iter().map(String::as_str), id)
                .and_then(|index| geraete.into_iter().nth(index))
                .ok_or_else(|| AudioError::GeraetNichtGefunden(id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_aufloesung_teilstring() {
        let namen = ["Eingebautes Mikrofon", "USB-Mikrofon (C-Media)"];
        assert_eq!(name_aufloesen(namen, "USB"), Some(1));
        assert_eq!(name_aufloesen(namen, "Eingebautes"), Some(0));
    }

    #[test]
    fn name_aufloesung_ohne_treffer() {
        let namen = ["Eingebautes Mikrofon"];
        assert_eq!(name_aufloesen(namen, "Headset"), None);
    }

    #[test]
    fn name_aufloesung_leere_liste() {
        assert_eq!(name_aufloesen([], "irgendwas"), None);
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn eingabegeraete_auflistbar() {
        let geraete = eingabegeraete_auflisten().expect("Liste sollte abrufbar sein");
        println!(
            "Eingabegeraete: {:?}",
            geraete.iter().map(|g| &g.name).collect::<Vec<_>>()
        );
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn unbekannte_geraete_id_ohne_stream() {
        // Nicht existente ID -> GeraetNichtGefunden, kein Stream
        // wird geoeffnet
        let fehler = eingabegeraet_finden(Some("definitiv-nicht-vorhanden-4711"));
        assert!(matches!(
            fehler,
            Err(AudioError::GeraetNichtGefunden(id)) if id.contains("4711")
        ));
    }
}
