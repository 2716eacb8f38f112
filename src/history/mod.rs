/// History Ledger
///
/// Append-only record of every create, update and delete applied to an
/// annotation, kept independently of the current-state table.

pub mod ledger;
pub mod models;

pub use ledger::HistoryLedger;
pub use models::{ActionType, HistoryEntry, HistoryEntryView, HistoryFilter};
