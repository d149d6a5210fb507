use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Label the chord detectors emit for stretches without a recognisable chord.
pub const NO_CHORD: &str = "N";

/// A chord label at a point in time, as produced by a chord detector.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChordEvent {
    pub chord: String,
    /// Seconds from the start of the track.
    pub timestamp: f64,
}

impl ChordEvent {
    pub fn new(chord: impl Into<String>, timestamp: f64) -> Result<Self, DomainError> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(DomainError::validation(
                "chord timestamps must be finite and non-negative",
            ));
        }
        Ok(Self {
            chord: chord.into(),
            timestamp,
        })
    }

    /// Root form of the label used for scale matching.
    pub fn root(&self) -> &str {
        normalize_chord(&self.chord)
    }

    pub fn is_no_chord(&self) -> bool {
        self.chord == NO_CHORD
    }
}

/// Drops a slash bass annotation: `"G/B"` becomes `"G"`.
pub fn normalize_chord(label: &str) -> &str {
    match label.find('/') {
        Some(slash) => &label[..slash],
        None => label,
    }
}
