//! Shielded Notes
//!
//! A note is what an observer sees on-chain for one output:
//!
//! ```text
//! NoteRecord = {
//!     commitment,   // Poseidon3(spend_pub.x, spend_pub.y, pack(metadata))
//!     metadata,     // amount, asset_id, creation_time (public)
//!     message,      // 64-byte stealth message
//!     position,     // (tree_id, leaf_id) once inserted
//! }
//! ```
//!
//! Scanning tries every message with the recipient's keys and keeps only
//! the notes whose commitment recomputes from the recovered spend key.

use tracing::{debug, trace};

use crate::commitment::{Commitment, NoteMetadata};
use crate::error::StealthError;
use crate::stealth::{RecoveredSpend, Recovery, StealthMessage, StealthOutput, StealthRecipient};

/// Where a commitment sits in the forest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotePosition {
    pub tree_id: u32,
    pub leaf_id: u64,
}

/// A published note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub commitment: Commitment,
    pub metadata: NoteMetadata,
    pub message: StealthMessage,
    /// Position in the commitment forest (None if not yet inserted)
    pub position: Option<NotePosition>,
}

impl NoteRecord {
    pub fn new(commitment: Commitment, metadata: NoteMetadata, message: StealthMessage) -> Self {
        Self {
            commitment,
            metadata,
            message,
            position: None,
        }
    }

    /// Build the record a sender publishes for a stealth output
    pub fn from_output(output: &StealthOutput, metadata: NoteMetadata) -> Self {
        Self::new(output.commitment(&metadata), metadata, output.message)
    }

    /// Set the forest position (called after insertion)
    pub fn with_position(mut self, tree_id: u32, leaf_id: u64) -> Self {
        self.position = Some(NotePosition { tree_id, leaf_id });
        self
    }

    pub fn is_inserted(&self) -> bool {
        self.position.is_some()
    }
}

/// A note we can spend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedNote {
    pub record: NoteRecord,
    pub spend: RecoveredSpend,
}

/// Outcome of scanning a batch of notes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub owned: Vec<OwnedNote>,
    /// Marker mismatch, the common case
    pub not_for_us: usize,
    /// Marker matched by chance but the commitment does not recompute
    pub commitment_mismatch: usize,
    /// Messages that failed to parse (bad ephemeral point)
    pub malformed: usize,
}

impl ScanReport {
    pub fn scanned(&self) -> usize {
        self.owned.len() + self.not_for_us + self.commitment_mismatch + self.malformed
    }
}

/// Try a single record; `Ok(None)` when it is not ours
pub fn try_claim(
    recipient: &StealthRecipient,
    record: &NoteRecord,
) -> Result<Option<OwnedNote>, StealthError> {
    match recipient.recover(record.message.as_bytes())? {
        Recovery::Recovered(spend) if spend.matches_commitment(&record.metadata, &record.commitment) => {
            Ok(Some(OwnedNote {
                record: record.clone(),
                spend,
            }))
        }
        _ => Ok(None),
    }
}

/// Scan `records` for notes addressed to `recipient`.
///
/// Never aborts: malformed messages are counted and skipped.
pub fn scan_notes<'a, I>(recipient: &StealthRecipient, records: I) -> ScanReport
where
    I: IntoIterator<Item = &'a NoteRecord>,
{
    let mut report = ScanReport::default();

    for record in records {
        match recipient.recover(record.message.as_bytes()) {
            Ok(Recovery::Recovered(spend)) => {
                if spend.matches_commitment(&record.metadata, &record.commitment) {
                    trace!(position = ?record.position, "note is ours");
                    report.owned.push(OwnedNote {
                        record: record.clone(),
                        spend,
                    });
                } else {
                    trace!(position = ?record.position, "marker matched, commitment did not");
                    report.commitment_mismatch += 1;
                }
            }
            Ok(Recovery::NotAddressedToUs) => report.not_for_us += 1,
            Err(e) => {
                trace!(position = ?record.position, error = %e, "skipping malformed message");
                report.malformed += 1;
            }
        }
    }

    debug!(
        scanned = report.scanned(),
        owned = report.owned.len(),
        commitment_mismatch = report.commitment_mismatch,
        malformed = report.malformed,
        "note scan complete"
    );
    report
}
