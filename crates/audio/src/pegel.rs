//! Pegelmessung fuer die Visualisierung
//!
//! Normierter mittlerer Betragspegel in [0,1], exponentiell geglaettet
//! damit die Anzeige nicht flackert.

/// Misst den Eingangspegel ueber aufeinanderfolgende Sample-Bloecke
#[derive(Debug, Clone)]
pub struct PegelMesser {
    geglaettet: f32,
    glaettung: f32,
}

impl PegelMesser {
    /// Erstellt einen Messer mit dem gegebenen Glaettungsfaktor (0..1,
    /// hoeher = schnellere Reaktion)
    pub fn neu(glaettung: f32) -> Self {
        Self {
            geglaettet: 0.0,
            glaettung: glaettung.clamp(0.0, 1.0),
        }
    }

    /// Verarbeitet einen Block und gibt den geglaetteten Pegel zurueck
    pub fn verarbeiten(&mut self, samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return self.geglaettet;
        }
        let mittel = samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32;
        // Sprachsignale erreichen selten Vollausschlag; leichte
        // Anhebung damit normale Sprache sichtbar ausschlaegt
        let pegel = (mittel * 2.5).clamp(0.0, 1.0);
        self.geglaettet += self.glaettung * (pegel - self.geglaettet);
        self.geglaettet
    }

    /// Aktueller geglaetteter Pegel
    pub fn wert(&self) -> f32 {
        self.geglaettet
    }
}

impl Default for PegelMesser {
    fn default() -> Self {
        Self::neu(0.3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stille_ergibt_null() {
        let mut messer = PegelMesser::default();
        let pegel = messer.verarbeiten(&vec![0.0f32; 512]);
        assert!(pegel.abs() < f32::EPSILON);
    }

    #[test]
    fn vollpegel_naehert_sich_eins() {
        let mut messer = PegelMesser::neu(0.5);
        let laut = vec![1.0f32; 512];
        let mut pegel = 0.0;
        for _ in 0..20 {
            pegel = messer.verarbeiten(&laut);
        }
        assert!(pegel > 0.95, "Pegel war {}", pegel);
        assert!(pegel <= 1.0);
    }

    #[test]
    fn pegel_bleibt_im_wertebereich() {
        let mut messer = PegelMesser::neu(1.0);
        // Uebersteuerte Samples duerfen den Bereich nicht verlassen
        let pegel = messer.verarbeiten(&vec![5.0f32; 128]);
        assert!((0.0..=1.0).contains(&pegel));
    }

    #[test]
    fn leerer_block_aendert_nichts() {
        let mut messer = PegelMesser::neu(1.0);
        messer.verarbeiten(&vec![0.4f32; 128]);
        let vorher = messer.wert();
        let nachher = messer.verarbeiten(&[]);
        assert_eq!(vorher, nachher);
    }

    #[test]
    fn glaettung_reagiert_traege() {
        let mut messer = PegelMesser::neu(0.1);
        let pegel = messer.verarbeiten(&vec![1.0f32; 128]);
        // Erster Block darf bei traeger Glaettung nicht sofort 1.0 erreichen
        assert!(pegel < 0.5);
    }
}
