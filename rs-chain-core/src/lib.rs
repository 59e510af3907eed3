//! Word-level Markov chain text generation library.
//!
//! This crate provides an order-1 word chain including:
//! - Text normalization and tokenization
//! - Additive training from free-form sentences
//! - Weighted random-walk sentence generation
//! - A versioned binary format (with a base64 text form) for persistence
//!
//! The learned graph itself is kept internal: callers only go through
//! [`model::chain::MarkovChain`], which serializes every access.

/// The chain, its graph storage and its codec.
pub mod model;

/// Text normalization (stripping, punctuation handling, tokenization).
pub mod normalizer;

/// Error type shared by every fallible operation.
pub mod error;

/// File and directory helpers for training texts and chain files.
pub mod io;

pub use error::{ChainError, ChainResult};
pub use model::chain::{DEFAULT_LIMIT, MarkovChain};
pub use model::codec::FORMAT_VERSION;
pub use model::snapshot::{ChainSnapshot, ChainStats};
pub use normalizer::Normalizer;
