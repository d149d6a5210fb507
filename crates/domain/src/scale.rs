use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::{tone::PitchClass, DomainError};

/// A named scale and the chord roots that belong to it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Scale {
    pub name: String,
    pub chords: BTreeSet<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct KeynoteScales {
    pub keynote: String,
    pub scales: Vec<Scale>,
}

/// Keynote -> scale -> chord set reference data.
///
/// Iteration order is the declaration order, which makes the scale
/// matcher's first-seen tie-break reproducible.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Vec<KeynoteScales>", into = "Vec<KeynoteScales>")]
pub struct ScaleCatalog {
    keynotes: Vec<KeynoteScales>,
}

/// Scale degrees, in semitones above the keynote.
const BUILTIN_SCALES: &[(&str, [usize; 7])] = &[
    ("major", [0, 2, 4, 5, 7, 9, 11]),
    ("minor", [0, 2, 3, 5, 7, 8, 10]),
    ("dorian", [0, 2, 3, 5, 7, 9, 10]),
    ("mixolydian", [0, 2, 4, 5, 7, 9, 10]),
    ("harmonic_minor", [0, 2, 3, 5, 7, 8, 11]),
];

impl ScaleCatalog {
    pub fn new(keynotes: Vec<KeynoteScales>) -> Result<Self, DomainError> {
        let mut seen_keynotes = HashSet::new();
        for entry in &keynotes {
            if entry.keynote.is_empty() {
                return Err(DomainError::validation("keynote names cannot be empty"));
            }
            if !seen_keynotes.insert(entry.keynote.as_str()) {
                return Err(DomainError::validation(format!(
                    "duplicate keynote {:?}",
                    entry.keynote
                )));
            }
            let mut seen_scales = HashSet::new();
            for scale in &entry.scales {
                if !seen_scales.insert(scale.name.as_str()) {
                    return Err(DomainError::validation(format!(
                        "duplicate scale {:?} for keynote {:?}",
                        scale.name, entry.keynote
                    )));
                }
            }
        }
        Ok(Self { keynotes })
    }

    /// Diatonic triads and sevenths for every keynote over the common scales.
    pub fn builtin() -> Self {
        let keynotes = PitchClass::ALL
            .iter()
            .map(|&keynote| KeynoteScales {
                keynote: keynote.name().to_string(),
                scales: BUILTIN_SCALES
                    .iter()
                    .map(|(name, degrees)| Scale {
                        name: name.to_string(),
                        chords: diatonic_chords(keynote, degrees),
                    })
                    .collect(),
            })
            .collect();
        Self { keynotes }
    }

    pub fn keynotes(&self) -> &[KeynoteScales] {
        &self.keynotes
    }

    /// Every `(keynote, scale)` pair in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scale)> {
        self.keynotes.iter().flat_map(|entry| {
            entry
                .scales
                .iter()
                .map(move |scale| (entry.keynote.as_str(), scale))
        })
    }

    pub fn get(&self, keynote: &str, scale: &str) -> Option<&Scale> {
        self.keynotes
            .iter()
            .find(|entry| entry.keynote == keynote)?
            .scales
            .iter()
            .find(|candidate| candidate.name == scale)
    }

    /// Number of `(keynote, scale)` pairs.
    pub fn len(&self) -> usize {
        self.keynotes.iter().map(|entry| entry.scales.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TryFrom<Vec<KeynoteScales>> for ScaleCatalog {
    type Error = DomainError;

    fn try_from(keynotes: Vec<KeynoteScales>) -> Result<Self, Self::Error> {
        Self::new(keynotes)
    }
}

impl From<ScaleCatalog> for Vec<KeynoteScales> {
    fn from(catalog: ScaleCatalog) -> Self {
        catalog.keynotes
    }
}

fn diatonic_chords(keynote: PitchClass, degrees: &[usize; 7]) -> BTreeSet<String> {
    let interval = |from: usize, steps: usize| {
        (degrees[(from + steps) % 7] + 12 - degrees[from]) % 12
    };
    let mut chords = BTreeSet::new();
    for degree in 0..7 {
        let root = keynote.transpose(degrees[degree]).name();
        let (third, fifth, seventh) = (interval(degree, 2), interval(degree, 4), interval(degree, 6));
        if let Some(suffix) = triad_suffix(third, fifth) {
            chords.insert(format!("{root}{suffix}"));
        }
        if let Some(suffix) = seventh_suffix(third, fifth, seventh) {
            chords.insert(format!("{root}{suffix}"));
        }
    }
    chords
}

fn triad_suffix(third: usize, fifth: usize) -> Option<&'static str> {
    match (third, fifth) {
        (4, 7) => Some(""),
        (3, 7) => Some("m"),
        (3, 6) => Some("dim"),
        (4, 8) => Some("aug"),
        _ => None,
    }
}

fn seventh_suffix(third: usize, fifth: usize, seventh: usize) -> Option<&'static str> {
    match (third, fifth, seventh) {
        (4, 7, 11) => Some("maj7"),
        (4, 7, 10) => Some("7"),
        (3, 7, 10) => Some("m7"),
        (3, 6, 10) => Some("m7b5"),
        (3, 6, 9) => Some("dim7"),
        (3, 7, 11) => Some("mM7"),
        (4, 8, 11) => Some("maj7#5"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chords(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn builtin_c_major_has_diatonic_chords() {
        let catalog = ScaleCatalog::builtin();
        let c_major = catalog.get("C", "major").unwrap();
        assert_eq!(
            c_major.chords,
            chords(&[
                "C", "Cmaj7", "Dm", "Dm7", "Em", "Em7", "F", "Fmaj7", "G", "G7", "Am", "Am7",
                "Bdim", "Bm7b5"
            ])
        );
    }

    #[test]
    fn builtin_harmonic_minor_uses_sharp_spelling() {
        let catalog = ScaleCatalog::builtin();
        let a_harmonic = catalog.get("A", "harmonic_minor").unwrap();
        for chord in ["Am", "AmM7", "Caug", "Cmaj7#5", "E7", "G#dim", "G#dim7"] {
            assert!(a_harmonic.chords.contains(chord), "missing {chord}");
        }
    }

    #[test]
    fn builtin_covers_every_keynote_in_order() {
        let catalog = ScaleCatalog::builtin();
        assert_eq!(catalog.len(), 12 * BUILTIN_SCALES.len());
        let (first_key, first_scale) = catalog.iter().next().unwrap();
        assert_eq!((first_key, first_scale.name.as_str()), ("C", "major"));
        assert_eq!(catalog.keynotes().last().unwrap().keynote, "B");
    }

    #[test]
    fn rejects_duplicate_keynotes() {
        let entry = KeynoteScales {
            keynote: "C".into(),
            scales: vec![],
        };
        assert!(ScaleCatalog::new(vec![entry.clone(), entry]).is_err());
    }

    #[test]
    fn deserializes_as_ordered_list() {
        let json = r#"[{"keynote": "G", "scales": [{"name": "major", "chords": ["G", "C", "D"]}]},
                       {"keynote": "C", "scales": [{"name": "major", "chords": ["C", "F", "G"]}]}]"#;
        let catalog: ScaleCatalog = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = catalog.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["G", "C"]);
        assert!(catalog.get("C", "major").unwrap().chords.contains("F"));
    }
}
