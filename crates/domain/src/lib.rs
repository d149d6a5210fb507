pub mod beat;
pub mod chord;
pub mod error;
pub mod io;
pub mod key;
pub mod scale;
pub mod song;
pub mod tone;

pub use crate::beat::{BarTimeline, BeatGrid, Meter};
pub use crate::chord::{normalize_chord, ChordEvent, NO_CHORD};
pub use crate::error::DomainError;
pub use crate::io::{decode_catalog, encode_catalog, DataFormat};
pub use crate::key::{KeyEstimate, KeyMatch, KeyScores};
pub use crate::scale::{KeynoteScales, Scale, ScaleCatalog};
pub use crate::song::{KeyField, SongEntry, ToneAtBeat};
pub use crate::tone::{hz_to_midi, midi_to_hz, PitchClass, Tone, ToneObservation};
