pub mod aggregator;
pub mod error;
pub mod store;
pub mod summary;

pub use aggregator::{count_chords, AnalysisAggregator, AnalysisRecord};
pub use error::LedgerError;
pub use store::{InMemoryLedger, JsonFileLedger, LedgerStore, DEFAULT_LEDGER_FILE};
pub use summary::{ChordUsageSummary, UsageRow};
