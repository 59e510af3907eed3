use std::io;

use thiserror::Error;

/// Errors surfaced by the chain engine.
///
/// Every failure is local: nothing is retried and no operation leaves a
/// partially mutated chain behind.
#[derive(Error, Debug)]
pub enum ChainError {
	/// `generate` was called before any sentence was learned.
	#[error("Chain has not been trained yet")]
	Untrained,

	/// A caller-supplied argument is out of range or malformed.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// The encoded data was written by a newer format version.
	#[error("Unsupported format version {found} (newest supported is {supported})")]
	Version { found: i32, supported: i32 },

	/// The encoded data is truncated or carries inconsistent counts/indices.
	#[error("Malformed chain data: {0}")]
	Format(String),

	/// A node reachable during generation cannot be sampled.
	#[error("Corrupt chain: {0}")]
	CorruptChain(String),

	/// Failure of the underlying reader/writer (file variants only).
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
}

pub type ChainResult<T> = Result<T, ChainError>;

impl From<base64::DecodeError> for ChainError {
	fn from(err: base64::DecodeError) -> Self {
		ChainError::Format(format!("invalid base64 text: {err}"))
	}
}
