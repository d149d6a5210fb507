use std::fmt;

use serde::Serialize;

use tonika_domain::{BarTimeline, Meter};

/// Plain-text tempo and bar summary of one analysis.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TempoReport {
    pub bpm: f64,
    pub meter: Meter,
    pub bars: BarTimeline,
}

impl TempoReport {
    pub fn new(bpm: f64, meter: Meter, bars: BarTimeline) -> Self {
        Self { bpm, meter, bars }
    }
}

impl fmt::Display for TempoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BPM real: {:.6}", self.bpm)?;
        writeln!(f, "BPM fixed: {}", self.bars.rounded_bpm)?;
        writeln!(f, "Bar estimated: {}", self.bars.bar_count)?;
        writeln!(f, "Bar type estimated: {}", self.meter)?;
        writeln!(f, "Bar timestamps:")?;
        for (index, start) in self.bars.bar_starts.iter().enumerate() {
            writeln!(f, "Bar {}: {:.6}s", index + 1, start)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonika_domain::BeatGrid;

    #[test]
    fn renders_bars_one_based() {
        let grid = BeatGrid::new(119.6, vec![0.0, 0.5, 1.0]).unwrap();
        let report = TempoReport::new(grid.tempo, Meter::FourFour, grid.bar_timeline(1.0));
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "BPM real: 119.600000");
        assert_eq!(lines[1], "BPM fixed: 120");
        assert_eq!(lines[2], "Bar estimated: 2");
        assert_eq!(lines[3], "Bar type estimated: 4/4");
        assert_eq!(&lines[4..], &["Bar timestamps:", "Bar 1: 0.000000s", "Bar 2: 0.500000s"]);
    }

    #[test]
    fn empty_timeline_has_header_only() {
        let report = TempoReport::new(80.0, Meter::Unknown, BarTimeline::default());
        assert!(report.to_string().ends_with("Bar timestamps:\n"));
    }
}
