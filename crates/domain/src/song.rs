use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::key::{KeyEstimate, KeyScores};
use crate::tone::ToneObservation;

/// Persisted key result: either the full score map or an already resolved keynote.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum KeyField {
    Scores(KeyScores),
    Resolved(String),
}

impl KeyField {
    /// Highest-scoring `"keynote-scale"` label; equal scores resolve to the
    /// one stored first, which is catalog order for matcher output.
    pub fn best(&self) -> Option<&str> {
        match self {
            KeyField::Resolved(key) => Some(key.as_str()),
            KeyField::Scores(scores) => scores.best(),
        }
    }
}

impl Default for KeyField {
    fn default() -> Self {
        KeyField::Scores(KeyScores::new())
    }
}

impl From<&KeyEstimate> for KeyField {
    fn from(estimate: &KeyEstimate) -> Self {
        KeyField::Scores(estimate.key_scores())
    }
}

/// `[timestamp, tone]` pair as stored in the ledger.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToneAtBeat(pub f64, pub Option<String>);

impl From<&ToneObservation> for ToneAtBeat {
    fn from(observation: &ToneObservation) -> Self {
        ToneAtBeat(observation.timestamp, Some(observation.tone.to_string()))
    }
}

/// One analysis run of one song, as appended to the ledger.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SongEntry {
    pub artist: String,
    pub title: String,
    /// Occurrences per original chord label.
    #[serde(default)]
    pub chords: BTreeMap<String, u32>,
    pub bpm: f64,
    #[serde(default)]
    pub tempo_changes: Vec<f64>,
    #[serde(default)]
    pub tones_at_beats: Vec<ToneAtBeat>,
    #[serde(default)]
    pub keynote: KeyField,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub analyzed_at: Option<OffsetDateTime>,
}

impl SongEntry {
    pub fn new(artist: impl Into<String>, title: impl Into<String>, bpm: f64) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            chords: BTreeMap::new(),
            bpm,
            tempo_changes: Vec::new(),
            tones_at_beats: Vec::new(),
            keynote: KeyField::default(),
            analyzed_at: None,
        }
    }

    pub fn total_chord_count(&self) -> u32 {
        self.chords.values().sum()
    }

    /// Name of the first field holding NaN or infinity, if any.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        if !self.bpm.is_finite() {
            return Some("bpm");
        }
        if self.tempo_changes.iter().any(|t| !t.is_finite()) {
            return Some("tempo_changes");
        }
        if self.tones_at_beats.iter().any(|pair| !pair.0.is_finite()) {
            return Some("tones_at_beats");
        }
        if let KeyField::Scores(scores) = &self.keynote {
            if scores.iter().any(|(_, score)| !score.is_finite()) {
                return Some("keynote");
            }
        }
        None
    }
}
