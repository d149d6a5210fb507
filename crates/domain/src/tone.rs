use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Concert pitch used for every frequency <-> note conversion.
pub const A4_HZ: f64 = 440.0;
pub const A4_MIDI: f64 = 69.0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitone index within the octave, C = 0.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }

    pub fn transpose(self, semitones: usize) -> Self {
        Self::from_index(self.index() + semitones)
    }

    /// Sharp spelling, matching the chord labels chord detectors emit.
    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let letter = chars
            .next()
            .ok_or_else(|| DomainError::validation("empty pitch class"))?;
        let base = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            other => {
                return Err(DomainError::validation(format!(
                    "unknown note letter {other:?}"
                )))
            }
        };
        let mut offset: i32 = 0;
        for accidental in chars {
            offset += match accidental {
                '#' | '♯' => 1,
                'b' | '♭' => -1,
                other => {
                    return Err(DomainError::validation(format!(
                        "unknown accidental {other:?} in {s:?}"
                    )))
                }
            };
        }
        Ok(Self::from_index((base + offset).rem_euclid(12) as usize))
    }
}

/// A pitch class in a specific octave, e.g. `A4`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Tone {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl Tone {
    pub fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self {
            pitch_class,
            octave,
        }
    }

    /// Nearest equal-tempered note for a fractional MIDI number.
    pub fn from_midi(midi: f64) -> Self {
        let note = midi.round() as i64;
        Self {
            pitch_class: PitchClass::from_index(note.rem_euclid(12) as usize),
            octave: (note.div_euclid(12) - 1) as i32,
        }
    }

    pub fn midi(&self) -> i32 {
        (self.octave + 1) * 12 + self.pitch_class.index() as i32
    }

    pub fn frequency(&self) -> f64 {
        midi_to_hz(self.midi() as f64)
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for Tone {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit() || c == '-')
            .ok_or_else(|| DomainError::validation(format!("tone {s:?} has no octave")))?;
        let (name, octave) = s.split_at(split);
        let octave = octave
            .parse()
            .map_err(|_| DomainError::validation(format!("invalid octave in tone {s:?}")))?;
        Ok(Self::new(name.parse()?, octave))
    }
}

impl TryFrom<String> for Tone {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Tone> for String {
    fn from(tone: Tone) -> Self {
        tone.to_string()
    }
}

pub fn hz_to_midi(hz: f64) -> f64 {
    12.0 * (hz / A4_HZ).log2() + A4_MIDI
}

pub fn midi_to_hz(midi: f64) -> f64 {
    A4_HZ * 2f64.powf((midi - A4_MIDI) / 12.0)
}

/// Dominant tone of one inter-beat interval.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToneObservation {
    /// Index of the beat that opens the interval.
    pub beat_index: usize,
    /// Timestamp of that beat, in seconds.
    pub timestamp: f64,
    pub tone: Tone,
    /// Mean of the strong pitches within half an octave of A4; diagnostic only.
    pub reference_hz: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn midi_conversions() {
        assert_relative_eq!(hz_to_midi(440.0), 69.0);
        assert_relative_eq!(hz_to_midi(880.0), 81.0);
        assert_relative_eq!(midi_to_hz(60.0), 261.6255653005986, epsilon = 1e-9);
    }

    #[test]
    fn tone_from_fractional_midi_rounds_to_nearest() {
        assert_eq!(Tone::from_midi(69.2).to_string(), "A4");
        assert_eq!(Tone::from_midi(60.6).to_string(), "C#4");
        assert_eq!(Tone::from_midi(59.0).to_string(), "B3");
        assert_eq!(Tone::from_midi(11.0).to_string(), "B-1");
    }

    #[test]
    fn tone_round_trips_through_text() {
        let tone: Tone = "F#3".parse().unwrap();
        assert_eq!(tone, Tone::new(PitchClass::FSharp, 3));
        assert_eq!(tone.midi(), 54);
        assert_eq!("Bb2".parse::<Tone>().unwrap(), Tone::new(PitchClass::ASharp, 2));
        assert_eq!("B-1".parse::<Tone>().unwrap().octave, -1);
        assert!("H4".parse::<Tone>().is_err());
        assert!("C".parse::<Tone>().is_err());
    }

    #[test]
    fn tone_serializes_as_string() {
        let json = serde_json::to_string(&Tone::new(PitchClass::A, 4)).unwrap();
        assert_eq!(json, "\"A4\"");
        let parsed: Tone = serde_json::from_str("\"C#5\"").unwrap();
        assert_eq!(parsed.frequency().round(), 554.0);
    }

    #[test]
    fn pitch_class_parsing_accepts_flats() {
        assert_eq!("Eb".parse::<PitchClass>().unwrap(), PitchClass::DSharp);
        assert_eq!("Cb".parse::<PitchClass>().unwrap(), PitchClass::B);
        assert_eq!(PitchClass::A.transpose(3), PitchClass::C);
    }
}
