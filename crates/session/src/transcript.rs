//! Transkript-Zeitleiste
//!
//! Transkripte kommen erst an wenn eine Aeusserung abgeschlossen ist;
//! der tatsaechliche Sprechbeginn liegt also vor der Ankunftszeit. Die
//! Zeitleiste schaetzt ihn ueber zwei Cursor:
//! - Agenten-Zeilen beginnen am Ende der vorigen Runde
//! - Benutzer-Zeilen beginnen am Ende der letzten Agenten-Aeusserung
//!
//! Eintraege sind nach dem Anfuegen unveraenderlich; die Reihenfolge
//! ist die Ankunftsreihenfolge.

use chrono::Utc;
use tracing::debug;

use intervox_core::{RohEintrag, Sprecher, TranskriptEintrag};

/// Geordnete Liste der Aeusserungen einer Sitzung
#[derive(Debug, Default)]
pub struct TranskriptZeitleiste {
    eintraege: Vec<TranskriptEintrag>,
    /// Ende der letzten Benutzer-Runde (Sekunden seit Sitzungsstart)
    letztes_runden_ende: f64,
    /// Ende der letzten Agenten-Aeusserung
    letztes_agent_ende: f64,
}

impl TranskriptZeitleiste {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Fuegt eine Aeusserung an und leitet ihren Startzeitpunkt ab
    ///
    /// `verstrichen_sekunden` ist die Ankunftszeit der Nachricht
    /// relativ zum Sitzungsstart.
    pub fn anfuegen(
        &mut self,
        sprecher: Sprecher,
        text: impl Into<String>,
        verstrichen_sekunden: f64,
    ) -> &TranskriptEintrag {
        let start_sekunden = match sprecher {
            Sprecher::Agent => self.letztes_runden_ende,
            Sprecher::Benutzer => self.letztes_agent_ende,
        };
        match sprecher {
            // Eine Agenten-Aeusserung beendet auch die laufende Runde:
            // die naechste Zeile beginnt an ihrer Ankunftszeit
            Sprecher::Agent => {
                self.letztes_agent_ende = verstrichen_sekunden;
                self.letztes_runden_ende = verstrichen_sekunden;
            }
            Sprecher::Benutzer => self.letztes_runden_ende = verstrichen_sekunden,
        }

        let index = self.eintraege.len();
        self.eintraege.push(TranskriptEintrag {
            sprecher,
            text: text.into(),
            start_sekunden,
            empfangen_am: Utc::now(),
        });
        &self.eintraege[index]
    }

    /// Uebernimmt das Backend-Gesamttranskript falls die Zeitleiste
    /// leer ist
    ///
    /// Passiert wenn die Sitzung endet bevor Live-Transkripte kamen
    /// (HTTP-Transport liefert dann `full_transcript`). Sind schon
    /// Live-Eintraege da, bleiben diese massgeblich.
    pub fn voll_transkript_uebernehmen(&mut self, roh: &[RohEintrag]) {
        if !self.eintraege.is_empty() {
            debug!(
                "Gesamttranskript verworfen, {} Live-Eintraege vorhanden",
                self.eintraege.len()
            );
            return;
        }
        for eintrag in roh {
            self.anfuegen(eintrag.sprecher, eintrag.text.clone(), 0.0);
        }
    }

    pub fn eintraege(&self) -> &[TranskriptEintrag] {
        &self.eintraege
    }

    pub fn ist_leer(&self) -> bool {
        self.eintraege.is_empty()
    }

    pub fn laenge(&self) -> usize {
        self.eintraege.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_beginnt_am_vorigen_runden_ende() {
        let mut zeitleiste = TranskriptZeitleiste::neu();

        // Eroeffnung des Agenten: Runde 0 beginnt bei 0
        let eintrag = zeitleiste.anfuegen(Sprecher::Agent, "Erzaehlen Sie von sich.", 5.0);
        assert_eq!(eintrag.start_sekunden, 0.0);

        // Benutzer antwortet: beginnt als der Agent fertig war
        let eintrag = zeitleiste.anfuegen(Sprecher::Benutzer, "Gerne.", 9.0);
        assert_eq!(eintrag.start_sekunden, 5.0);

        // Naechste Agenten-Frage: beginnt am Runden-Ende des Benutzers
        let eintrag = zeitleiste.anfuegen(Sprecher::Agent, "Warum wir?", 15.0);
        assert_eq!(eintrag.start_sekunden, 9.0);

        let eintrag = zeitleiste.anfuegen(Sprecher::Benutzer, "Weil...", 20.0);
        assert_eq!(eintrag.start_sekunden, 15.0);
    }

    #[test]
    fn aufeinanderfolgende_agenten_zeilen_reihen_sich_aneinander() {
        let mut zeitleiste = TranskriptZeitleiste::neu();
        let a = zeitleiste.anfuegen(Sprecher::Agent, "Willkommen.", 3.0).start_sekunden;
        let b = zeitleiste
            .anfuegen(Sprecher::Agent, "Legen wir los.", 6.0)
            .start_sekunden;
        // Jede Agenten-Zeile beginnt an der Ankunftszeit der
        // unmittelbar vorangehenden Zeile
        assert_eq!(a, 0.0);
        assert_eq!(b, 3.0);
    }

    #[test]
    fn benutzer_zuerst_beginnt_bei_null() {
        let mut zeitleiste = TranskriptZeitleiste::neu();
        let eintrag = zeitleiste.anfuegen(Sprecher::Benutzer, "Hallo?", 2.0);
        assert_eq!(eintrag.start_sekunden, 0.0);
    }

    #[test]
    fn reihenfolge_ist_ankunftsreihenfolge() {
        let mut zeitleiste = TranskriptZeitleiste::neu();
        zeitleiste.anfuegen(Sprecher::Agent, "A", 1.0);
        zeitleiste.anfuegen(Sprecher::Benutzer, "B", 2.0);
        zeitleiste.anfuegen(Sprecher::Agent, "C", 3.0);

        let texte: Vec<&str> = zeitleiste.eintraege().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texte, vec!["A", "B", "C"]);
    }

    #[test]
    fn zeit_labels() {
        let mut zeitleiste = TranskriptZeitleiste::neu();
        zeitleiste.anfuegen(Sprecher::Agent, "Start", 65.0);
        let eintrag = zeitleiste.anfuegen(Sprecher::Benutzer, "Antwort", 70.0);
        // Benutzer beginnt bei 65s -> "01:05"
        assert_eq!(eintrag.zeit_label(), "01:05");
    }

    #[test]
    fn gesamttranskript_fuellt_nur_leere_zeitleiste() {
        let roh = vec![
            RohEintrag {
                sprecher: Sprecher::Agent,
                text: "Frage".into(),
            },
            RohEintrag {
                sprecher: Sprecher::Benutzer,
                text: "Antwort".into(),
            },
        ];

        let mut leer = TranskriptZeitleiste::neu();
        leer.voll_transkript_uebernehmen(&roh);
        assert_eq!(leer.laenge(), 2);

        let mut belegt = TranskriptZeitleiste::neu();
        belegt.anfuegen(Sprecher::Agent, "Live", 1.0);
        belegt.voll_transkript_uebernehmen(&roh);
        assert_eq!(belegt.laenge(), 1);
        assert_eq!(belegt.eintraege()[0].text, "Live");
    }
}
