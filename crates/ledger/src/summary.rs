use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tonika_domain::{SongEntry, NO_CHORD};

/// One chord of one song version, merged across all runs that reported it.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct UsageRow {
    pub artist: String,
    pub title: String,
    pub chord: String,
    pub bpm: f64,
    pub keynote: String,
    /// Number of ledger entries that contained the chord.
    pub runs: u32,
    /// Sum of the chord's occurrence counts over those entries.
    pub uses: u32,
}

/// Read-time view of the ledger: duplicate analyses folded into one row per chord.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ChordUsageSummary {
    pub rows: Vec<UsageRow>,
    /// `(title, total chord count)` per ledger entry, in ledger order.
    pub entry_totals: Vec<(String, u32)>,
}

impl ChordUsageSummary {
    /// Groups by artist, title, chord, bpm and best keynote, skipping the no-chord label.
    pub fn from_entries(entries: &[SongEntry]) -> Self {
        let mut rows: Vec<UsageRow> = Vec::new();
        let mut index: HashMap<(String, String, String, u64, String), usize> = HashMap::new();
        for entry in entries {
            let keynote = entry.keynote.best().unwrap_or("Unknown").to_string();
            for (chord, count) in &entry.chords {
                if chord == NO_CHORD {
                    continue;
                }
                let key = (
                    entry.artist.clone(),
                    entry.title.clone(),
                    chord.clone(),
                    entry.bpm.to_bits(),
                    keynote.clone(),
                );
                match index.get(&key) {
                    Some(&row) => {
                        rows[row].runs += 1;
                        rows[row].uses += count;
                    }
                    None => {
                        index.insert(key, rows.len());
                        rows.push(UsageRow {
                            artist: entry.artist.clone(),
                            title: entry.title.clone(),
                            chord: chord.clone(),
                            bpm: entry.bpm,
                            keynote: keynote.clone(),
                            runs: 1,
                            uses: *count,
                        });
                    }
                }
            }
        }
        let entry_totals = entries
            .iter()
            .map(|entry| (entry.title.clone(), entry.total_chord_count()))
            .collect();
        Self { rows, entry_totals }
    }
}

impl fmt::Display for ChordUsageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<20} {:<24} {:<10} {:>5} {:>5} {:>8}  Keynote",
            "Artist", "Title", "Chord", "Runs", "Uses", "BPM"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<20} {:<24} {:<10} {:>5} {:>5} {:>8.2}  {}",
                row.artist, row.title, row.chord, row.runs, row.uses, row.bpm, row.keynote
            )?;
        }
        Ok(())
    }
}
