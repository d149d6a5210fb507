use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fraction of a song's distinct chord roots contained in one catalog scale.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct KeyMatch {
    pub keynote: String,
    pub scale: String,
    pub score: f64,
}

impl KeyMatch {
    /// The `"keynote-scale"` key used in persisted score maps.
    pub fn label(&self) -> String {
        format!("{}-{}", self.keynote, self.scale)
    }
}

/// Result of matching a song's chords against a scale catalog.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct KeyEstimate {
    pub best_keynote: Option<String>,
    pub best_score: f64,
    /// Every match at or above the tolerance, in catalog order.
    pub matches: Vec<KeyMatch>,
}

impl KeyEstimate {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Labelled scores in catalog order.
    pub fn key_scores(&self) -> KeyScores {
        self.matches
            .iter()
            .map(|candidate| (candidate.label(), candidate.score))
            .collect()
    }

    pub fn score_of(&self, keynote: &str, scale: &str) -> Option<f64> {
        self.matches
            .iter()
            .find(|candidate| candidate.keynote == keynote && candidate.scale == scale)
            .map(|candidate| candidate.score)
    }
}

/// `"keynote-scale"` scores that keep their insertion order, stored as a JSON object.
///
/// Order matters: among equal scores the earliest entry is the best one, the
/// same rule the matcher applies while walking the catalog.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyScores(Vec<(String, f64)>);

impl KeyScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(candidate, _)| candidate == label)
            .map(|(_, score)| *score)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(label, score)| (label.as_str(), *score))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First label holding the highest score.
    pub fn best(&self) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for (label, score) in self.iter() {
            if best.map_or(true, |(_, current)| score > current) {
                best = Some((label, score));
            }
        }
        best.map(|(label, _)| label)
    }
}

impl FromIterator<(String, f64)> for KeyScores {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for KeyScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, score) in &self.0 {
            map.serialize_entry(label, score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for KeyScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = KeyScores;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of key labels to scores")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<KeyScores, A::Error> {
                let mut scores = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, f64>()? {
                    scores.push(entry);
                }
                Ok(KeyScores(scores))
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_scores_use_dashed_labels() {
        let estimate = KeyEstimate {
            best_keynote: Some("C".into()),
            best_score: 1.0,
            matches: vec![
                KeyMatch {
                    keynote: "C".into(),
                    scale: "major".into(),
                    score: 1.0,
                },
                KeyMatch {
                    keynote: "A".into(),
                    scale: "minor".into(),
                    score: 0.5,
                },
            ],
        };
        let scores = estimate.key_scores();
        assert_eq!(scores.get("C-major"), Some(1.0));
        assert_eq!(scores.get("A-minor"), Some(0.5));
        assert_eq!(estimate.score_of("A", "minor"), Some(0.5));
        assert_eq!(estimate.score_of("A", "major"), None);
    }

    #[test]
    fn order_survives_json_and_decides_ties() {
        let scores: KeyScores = [
            ("G-major".to_string(), 0.8),
            ("C-major".to_string(), 0.8),
            ("A-minor".to_string(), 0.5),
        ]
        .into_iter()
        .collect();
        assert_eq!(scores.best(), Some("G-major"));

        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"G-major":0.8,"C-major":0.8,"A-minor":0.5}"#);
        let reloaded: KeyScores = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, scores);
        assert_eq!(reloaded.best(), Some("G-major"));
        assert_eq!(KeyScores::new().best(), None);
    }
}
