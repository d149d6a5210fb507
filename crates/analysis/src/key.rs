use std::collections::BTreeSet;

use tracing::debug;

use tonika_domain::{ChordEvent, DomainError, KeyEstimate, KeyMatch, ScaleCatalog};

/// Scores a song's distinct chord roots against every scale of a catalog.
pub struct ScaleMatcher {
    tolerance: f64,
}

impl ScaleMatcher {
    /// `tolerance` must be positive, otherwise every scale would be reported.
    pub fn new(tolerance: f64) -> Result<Self, DomainError> {
        if !(tolerance > 0.0 && tolerance.is_finite()) {
            return Err(DomainError::validation(
                "scale match tolerance must be positive",
            ));
        }
        Ok(Self { tolerance })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn match_chords(&self, chords: &[ChordEvent], catalog: &ScaleCatalog) -> KeyEstimate {
        let roots = chord_roots(chords);
        debug!(?roots, "normalized chord roots");
        if roots.is_empty() {
            return KeyEstimate::empty();
        }

        let mut estimate = KeyEstimate::empty();
        for (keynote, scale) in catalog.iter() {
            let shared = roots
                .iter()
                .filter(|root| scale.chords.contains(**root))
                .count();
            let score = shared as f64 / roots.len() as f64;
            debug!(keynote, scale = %scale.name, score, "scale score");
            if score < self.tolerance {
                continue;
            }
            if score > estimate.best_score {
                estimate.best_keynote = Some(keynote.to_string());
                estimate.best_score = score;
            }
            estimate.matches.push(KeyMatch {
                keynote: keynote.to_string(),
                scale: scale.name.clone(),
                score,
            });
        }
        debug!(best = ?estimate.best_keynote, score = estimate.best_score, "key estimate");
        estimate
    }
}

/// Distinct normalized chord roots of a song.
pub fn chord_roots(chords: &[ChordEvent]) -> BTreeSet<&str> {
    chords.iter().map(ChordEvent::root).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonika_domain::{KeynoteScales, Scale};

    fn events(labels: &[&str]) -> Vec<ChordEvent> {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| ChordEvent::new(*label, i as f64).unwrap())
            .collect()
    }

    fn scale(name: &str, chords: &[&str]) -> Scale {
        Scale {
            name: name.to_string(),
            chords: chords.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn catalog(entries: Vec<(&str, Vec<Scale>)>) -> ScaleCatalog {
        ScaleCatalog::new(
            entries
                .into_iter()
                .map(|(keynote, scales)| KeynoteScales {
                    keynote: keynote.to_string(),
                    scales,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn c_major_song_matches_fully() {
        let catalog = catalog(vec![("C", vec![scale("major", &["C", "F", "G"])])]);
        let matcher = ScaleMatcher::new(0.5).unwrap();
        let estimate = matcher.match_chords(&events(&["C", "F", "G", "C"]), &catalog);
        assert_eq!(estimate.best_keynote.as_deref(), Some("C"));
        assert_eq!(estimate.key_scores().get("C-major"), Some(1.0));
    }

    #[test]
    fn slash_chords_match_by_root() {
        let catalog = catalog(vec![("G", vec![scale("major", &["G", "C", "D", "Em"])])]);
        let matcher = ScaleMatcher::new(0.1).unwrap();
        let estimate = matcher.match_chords(&events(&["G/B", "C", "D/F#", "Em"]), &catalog);
        assert_eq!(estimate.score_of("G", "major"), Some(1.0));
    }

    #[test]
    fn empty_song_has_no_key() {
        let matcher = ScaleMatcher::new(0.015).unwrap();
        let estimate = matcher.match_chords(&[], &ScaleCatalog::builtin());
        assert_eq!(estimate.best_keynote, None);
        assert!(estimate.matches.is_empty());
    }

    #[test]
    fn first_keynote_wins_ties() {
        let catalog = catalog(vec![
            ("C", vec![scale("major", &["C", "F", "G", "Am"])]),
            ("F", vec![scale("major", &["F", "C", "Bb", "Dm"])]),
            ("A", vec![scale("minor", &["Am", "Dm", "E"])]),
        ]);
        let matcher = ScaleMatcher::new(0.2).unwrap();
        let estimate = matcher.match_chords(&events(&["C", "F", "E", "Dm"]), &catalog);
        assert_eq!(estimate.score_of("C", "major"), Some(0.5));
        assert_eq!(estimate.score_of("F", "major"), Some(0.75));
        assert_eq!(estimate.score_of("A", "minor"), Some(0.5));
        assert_eq!(estimate.best_keynote.as_deref(), Some("F"));

        let tied = catalog_tie();
        let estimate = matcher.match_chords(&events(&["C", "G"]), &tied);
        assert_eq!(estimate.best_keynote.as_deref(), Some("G"));
    }

    fn catalog_tie() -> ScaleCatalog {
        catalog(vec![
            ("G", vec![scale("major", &["G", "C"])]),
            ("C", vec![scale("major", &["C", "G"])]),
        ])
    }

    #[test]
    fn higher_tolerance_reports_subset() {
        let catalog = ScaleCatalog::builtin();
        let song = events(&["Am", "F", "C", "G", "E7", "Dm/F"]);
        let loose = ScaleMatcher::new(0.3).unwrap().match_chords(&song, &catalog);
        let strict = ScaleMatcher::new(0.8).unwrap().match_chords(&song, &catalog);
        let loose_labels = loose.key_scores();
        assert!(!strict.matches.is_empty());
        assert!(strict.matches.len() < loose.matches.len());
        for (label, _) in strict.key_scores().iter() {
            assert!(loose_labels.get(label).is_some());
        }
    }

    #[test]
    fn tolerance_must_be_positive() {
        assert!(ScaleMatcher::new(0.0).is_err());
        assert!(ScaleMatcher::new(-0.5).is_err());
        assert!(ScaleMatcher::new(f64::NAN).is_err());
    }
}
