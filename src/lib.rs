//! Landmark-based acoustic fingerprinting.
//!
//! Recordings are reduced to SHA-1-prefix hashes of paired spectral peaks,
//! persisted in SQLite, and recognized by offset-histogram alignment of a
//! query's hashes against the index.

pub mod aligner;
pub mod database;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod hashing;
pub mod mic;
pub mod peaks;
pub mod spectrogram;

pub use aligner::Match;
pub use engine::{Engine, QuerySource};
pub use error::{Error, Result};
