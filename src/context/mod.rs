//! Context module - historical failure cases and similarity search
//!
//! ## SimilarityIndex trait
//!
//! The `SimilarityIndex` trait abstracts the nearest-case lookup so different
//! backends can be swapped (in-memory scan, NoOp, external vector store).

pub mod signature;
pub mod similarity;

pub use signature::{build_signature, channel_z_scores, signature_len};
pub use similarity::{InMemoryIndex, IndexError, NoOpIndex, SimilarityIndex, StoredCase};
