use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, trace, warn};
use rand::Rng;

use super::codec;
use super::graph::Graph;
use super::snapshot::{ChainSnapshot, ChainStats};
use crate::error::ChainResult;
use crate::io::read_file;
use crate::normalizer::Normalizer;

/// Default maximum number of tokens produced by [`MarkovChain::generate`].
pub const DEFAULT_LIMIT: usize = 100;

/// Order-1 word-level Markov chain.
///
/// The chain learns word-to-word transitions from free-form sentences and
/// samples new sentences by a weighted random walk. It can be persisted with
/// the `serialize_*` methods and restored with the `deserialize_*` ones.
///
/// # Concurrency
/// The learned graph sits behind a single lock: training and generation each
/// hold it for their whole duration, so concurrent calls queue up and always
/// observe a consistent chain. Nothing hands out a reference into the graph;
/// [`MarkovChain::snapshot`] returns a detached copy.
///
/// # Example
/// ```
/// use rs_chain_core::model::chain::MarkovChain;
///
/// let chain = MarkovChain::new();
/// chain.train(["Hello world!", "World is beautiful!"]);
/// let sentence = chain.generate(20).unwrap();
/// assert!(!sentence.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MarkovChain {
	graph: Mutex<Graph>,
	normalizer: Normalizer,
}

impl MarkovChain {
	/// Creates an empty chain using the default [`Normalizer`].
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates an empty chain with a custom normalizer.
	pub fn with_normalizer(normalizer: Normalizer) -> Self {
		Self {
			graph: Mutex::default(),
			normalizer,
		}
	}

	fn from_graph(graph: Graph) -> Self {
		Self {
			graph: Mutex::new(graph),
			normalizer: Normalizer::default(),
		}
	}

	/// Training never leaves the graph half-updated, so a poisoned lock still
	/// guards a consistent graph.
	fn lock(&self) -> MutexGuard<'_, Graph> {
		self.graph.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Learns every sentence of `sentences`. Each entry is one independent
	/// sentence whose first token always becomes a beginning.
	///
	/// Entries that normalize to nothing are skipped. Training is additive:
	/// it never removes or lowers anything already learned.
	///
	/// Returns how many entries contributed tokens.
	pub fn train<I, S>(&self, sentences: I) -> usize
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		// Tokenize outside of the lock
		let tokenized: Vec<Vec<String>> = sentences
			.into_iter()
			.filter_map(|sentence| {
				let tokens = self.normalizer.tokenize(sentence.as_ref());
				if tokens.is_empty() {
					trace!("Skipping sentence without tokens: {:?}", sentence.as_ref());
					None
				} else {
					Some(tokens)
				}
			})
			.collect();

		if tokenized.is_empty() {
			return 0;
		}

		let mut graph = self.lock();
		for tokens in &tokenized {
			graph.train_sentence(tokens);
		}
		debug!("Trained on {} sentences, chain now has {}", tokenized.len(), graph.stats());
		tokenized.len()
	}

	/// Learns a single sentence. Returns `false` if it normalized to nothing.
	pub fn train_sentence(&self, sentence: &str) -> bool {
		self.train([sentence]) == 1
	}

	/// Learns every line of a text file, one sentence per line.
	pub fn train_file<P: AsRef<Path>>(&self, path: P) -> ChainResult<usize> {
		let lines = read_file(&path)?;
		let count = self.train(&lines);
		info!("Trained on {count} lines from {}", path.as_ref().display());
		Ok(count)
	}

	/// Generates a sentence of at most `limit` tokens using the thread-local,
	/// OS-seeded random generator.
	///
	/// # Errors
	/// - `Untrained` if nothing has been learned yet
	/// - `InvalidArgument` if `limit` is 0
	/// - `CorruptChain` if the walk reaches a node that cannot be sampled
	pub fn generate(&self, limit: usize) -> ChainResult<String> {
		self.generate_with_rng(limit, &mut rand::rng())
	}

	/// Same as [`MarkovChain::generate`] with a caller-provided random source.
	///
	/// The result only depends on the learned content and on `rng`, so a
	/// seeded generator reproduces the same sentence.
	pub fn generate_with_rng<R: Rng + ?Sized>(&self, limit: usize, rng: &mut R) -> ChainResult<String> {
		self.lock().generate(limit, rng)
	}

	/// Adds everything `other` learned into this chain.
	///
	/// Equivalent to training this chain on `other`'s data as well.
	pub fn merge(&self, other: &MarkovChain) {
		// Copy first so that merging a chain into itself does not lock twice
		let theirs = other.lock().clone();
		let mut graph = self.lock();
		graph.merge(&theirs);
		debug!("Merged chain, now {}", graph.stats());
	}

	/// `true` once at least one sentence has been learned.
	pub fn is_trained(&self) -> bool {
		self.lock().is_trained()
	}

	pub fn stats(&self) -> ChainStats {
		self.lock().stats()
	}

	/// Detached, order-independent copy of the learned content.
	pub fn snapshot(&self) -> ChainSnapshot {
		self.lock().snapshot()
	}

	/// Encodes the chain in the binary layout.
	///
	/// # Errors
	/// `Format` only for chains too large for the layout's 32-bit tables.
	pub fn serialize_to_bytes(&self) -> ChainResult<Vec<u8>> {
		let bytes = codec::to_bytes(&self.lock())?;
		debug!("Serialized chain into {} bytes", bytes.len());
		Ok(bytes)
	}

	/// Encodes the chain as base64 text.
	pub fn serialize_to_string(&self) -> ChainResult<String> {
		Ok(codec::to_text(&self.serialize_to_bytes()?))
	}

	/// Writes the binary encoding to `writer`.
	pub fn serialize_to_writer<W: Write>(&self, writer: W) -> ChainResult<()> {
		codec::write_to(&self.lock(), writer)
	}

	/// Writes the binary encoding to a file, replacing it if it exists.
	pub fn serialize_to_file<P: AsRef<Path>>(&self, path: P) -> ChainResult<()> {
		let file = File::create(&path)?;
		self.serialize_to_writer(BufWriter::new(file))?;
		info!("Saved chain to {}", path.as_ref().display());
		Ok(())
	}

	/// Decodes a chain from its binary encoding. The whole buffer must be consumed.
	///
	/// # Errors
	/// - `Version` if the data comes from a newer format
	/// - `Format` if the data is truncated or inconsistent
	pub fn deserialize_from_bytes(bytes: &[u8]) -> ChainResult<Self> {
		codec::from_bytes(bytes).map(Self::from_graph).inspect_err(|e| warn!("Rejected chain data: {e}"))
	}

	/// Decodes a chain from base64 text.
	pub fn deserialize_from_string(text: &str) -> ChainResult<Self> {
		Self::deserialize_from_bytes(&codec::from_text(text)?)
	}

	/// Decodes one chain from `reader`, reading exactly its encoded bytes.
	pub fn deserialize_from_reader<R: Read>(reader: R) -> ChainResult<Self> {
		codec::read_from(reader).map(Self::from_graph).inspect_err(|e| warn!("Rejected chain data: {e}"))
	}

	/// Reads a chain file written by [`MarkovChain::serialize_to_file`].
	pub fn deserialize_from_file<P: AsRef<Path>>(path: P) -> ChainResult<Self> {
		let bytes = std::fs::read(&path)?;
		let chain = Self::deserialize_from_bytes(&bytes)?;
		info!("Loaded chain from {}", path.as_ref().display());
		Ok(chain)
	}

	/// Replaces the normalizer used by later training calls.
	pub fn set_normalizer(&mut self, normalizer: Normalizer) {
		self.normalizer = normalizer;
	}
}
