//! Append-only execution ledger: the authoritative record of what ran, used for
//! resume and for status aggregation.

mod store;
mod types;

pub use store::{FileLedgerStore, LedgerError, LedgerStore, MemoryLedgerStore};
pub use types::{
    aggregate_status, EntryStatus, ExecutionRecord, IterationTag, LedgerEntry, ResumeAction,
    RunStatus,
};

pub(crate) use store::ends_with_error_after_stop;
#[cfg(test)]
pub(crate) use types::sample_entry;
