//! Shade Privacy SDK
//!
//! Stealth notes and the commitment forest of the Shade shielded pool.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Shielded Output                          │
//! │  ┌──────────────────┐  ┌───────────────┐  ┌───────────────────┐  │
//! │  │ Stealth message  │  │  Commitment   │  │  Merkle forest    │  │
//! │  │ pack(E) ‖ AES ct │  │ P3(x, y, meta)│─►│  triads → root    │  │
//! │  └──────────────────┘  └───────────────┘  └───────────────────┘  │
//! │           │                    ▲                    │            │
//! │           ▼                    │                    ▼            │
//! │  recipient recovers ρ ──► spend key          inclusion proof     │
//! │                                                  + root hint     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod address;
pub mod cipher;
pub mod commitment;
pub mod error;
pub mod forest;
pub mod merkle;
pub mod note;
pub mod proof;
pub mod snapshot;
pub mod stealth;

pub use address::{ADDRESS_LEN, StealthAddress};
pub use cipher::{SymmetricKey, decrypt_block_pair, encrypt_block_pair};
pub use commitment::{Commitment, NoteMetadata};
pub use error::{SnapshotError, StealthError, TreeError};
pub use forest::MerkleForest;
pub use merkle::{
    InsertedBatch, MAX_DEPTH, MIN_DEPTH, MerkleHasher, PoseidonHasher, ROOT_CACHE_SLOTS,
    RootCache, Tree, ZeroHashes,
};
pub use note::{NotePosition, NoteRecord, OwnedNote, ScanReport, scan_notes, try_claim};
pub use proof::{CircuitPath, MerkleProof, SpendWitness, verify_merkle_path};
pub use snapshot::{
    ForestSnapshot, SNAPSHOT_VERSION, TreeSnapshot, deserialize_forest, deserialize_tree, load,
    save, serialize_forest, serialize_tree,
};
pub use stealth::{
    MARKER_BITS, MESSAGE_LEN, RecoveredSpend, Recovery, StealthMessage, StealthOutput,
    StealthRecipient, StealthSender, create_stealth, create_with_randoms, marker_matches,
    recover_stealth,
};
