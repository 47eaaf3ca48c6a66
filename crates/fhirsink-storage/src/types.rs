use fhirsink_core::ResourceKind;
use std::collections::BTreeMap;

/// What happened to one row inside a bundle transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was staged for commit.
    Inserted,
    /// A row with this identifier already exists; first write wins and the
    /// new row is silently dropped.
    DuplicateSkipped,
}

/// Per-kind row counts, as reported by count and orphan probes.
pub type KindCounts = BTreeMap<ResourceKind, u64>;
