use std::collections::BTreeMap;

use time::OffsetDateTime;
use tonika_domain::{ChordEvent, KeyEstimate, KeyField, SongEntry, ToneAtBeat, ToneObservation};
use tracing::{info, instrument};

use crate::error::LedgerError;
use crate::store::LedgerStore;

/// Everything one analysis run contributes to the ledger.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisRecord<'a> {
    pub artist: &'a str,
    pub title: &'a str,
    pub chords: &'a [ChordEvent],
    pub bpm: f64,
    pub beats: &'a [f64],
    pub tones: &'a [ToneObservation],
    pub key: &'a KeyEstimate,
}

/// Occurrences per original chord label; slash chords are counted as written.
pub fn count_chords(chords: &[ChordEvent]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for event in chords {
        *counts.entry(event.chord.clone()).or_insert(0) += 1;
    }
    counts
}

pub struct AnalysisAggregator<S> {
    store: S,
}

impl<S: LedgerStore> AnalysisAggregator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn entry_for(record: &AnalysisRecord<'_>) -> SongEntry {
        SongEntry {
            artist: record.artist.to_string(),
            title: record.title.to_string(),
            chords: count_chords(record.chords),
            bpm: record.bpm,
            tempo_changes: record.beats.to_vec(),
            tones_at_beats: record.tones.iter().map(ToneAtBeat::from).collect(),
            keynote: KeyField::from(record.key),
            analyzed_at: Some(OffsetDateTime::now_utc()),
        }
    }

    /// Appends a new entry for this run and returns the updated ledger.
    ///
    /// Repeated runs for the same song are kept as separate entries.
    #[instrument(skip(self, record), fields(artist = record.artist, title = record.title))]
    pub fn record(&self, record: AnalysisRecord<'_>) -> Result<Vec<SongEntry>, LedgerError> {
        let entry = Self::entry_for(&record);
        if let Some(field) = entry.non_finite_field() {
            return Err(LedgerError::NonFinite {
                artist: entry.artist,
                title: entry.title,
                field,
            });
        }
        let ledger = self.store.append(entry)?;
        info!(entries = ledger.len(), "analysis recorded");
        Ok(ledger)
    }
}
