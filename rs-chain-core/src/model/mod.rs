//! Top-level module for the word chain.
//!
//! - Public entry point (`MarkovChain`)
//! - Internal graph storage (`Graph`, `Node`)
//! - Binary codec
//! - Read-only views (`ChainStats`, `ChainSnapshot`)

/// Thread-safe chain: training, generation, merging and persistence.
pub mod chain;

/// Binary layout of a chain and its base64 text form.
///
/// Only the format version is public; encoding goes through `MarkovChain`.
pub mod codec;

/// Arena of nodes with the pool and the beginnings set.
///
/// Holds the training and random-walk algorithms. Not exposed.
mod graph;

/// A single token node and its weighted connections. Not exposed.
mod node;

/// Detached views of a chain's content.
pub mod snapshot;
