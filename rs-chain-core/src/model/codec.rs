//! Versioned binary layout of a chain.
//!
//! All integers are big-endian, all lengths are in bytes:
//!
//! ```text
//! i32 version
//! i32 node_count
//! node_count × { i32 length, UTF-8 content, i32 connection_count }
//! node_count × { i32 connection_count, connection_count × { i64 weight, i32 target } }
//! i32 beginnings_count
//! beginnings_count × i32 node_index
//! ```
//!
//! `target` is `-1` for the end of a sentence, a position in the node table
//! otherwise. Positions may point forward, so decoding creates every node
//! before reading any connection.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::graph::Graph;
use super::node::{Connection, Node, Target};
use crate::error::{ChainError, ChainResult};

/// Newest layout this crate reads and the one it writes.
pub const FORMAT_VERSION: i32 = 1;

const TERMINAL_INDEX: i32 = -1;

/// Upper bound for capacities taken from untrusted counts.
const PREALLOC_LIMIT: usize = 4096;

/// Encodes `graph` into a fresh buffer.
///
/// # Errors
/// `Format` if a table is larger than the layout can index (more than `i32::MAX` entries).
pub(crate) fn to_bytes(graph: &Graph) -> ChainResult<Vec<u8>> {
	let mut out = Vec::new();
	put_i32(&mut out, FORMAT_VERSION);
	put_len(&mut out, graph.nodes.len(), "node table")?;

	for node in &graph.nodes {
		put_len(&mut out, node.content.len(), "node content")?;
		out.extend_from_slice(node.content.as_bytes());
		put_len(&mut out, node.connections.len(), "connection list")?;
	}

	for node in &graph.nodes {
		put_len(&mut out, node.connections.len(), "connection list")?;
		for connection in &node.connections {
			// Saturates for weights no training run can reach
			put_i64(&mut out, i64::try_from(connection.weight).unwrap_or(i64::MAX));
			match connection.target {
				Target::Terminal => put_i32(&mut out, TERMINAL_INDEX),
				Target::Node(index) => put_len(&mut out, index, "node index")?,
			}
		}
	}

	put_len(&mut out, graph.beginnings.len(), "beginnings")?;
	for &index in &graph.beginnings {
		put_len(&mut out, index, "node index")?;
	}

	Ok(out)
}

/// Encodes `graph` into `writer`.
pub(crate) fn write_to<W: Write>(graph: &Graph, mut writer: W) -> ChainResult<()> {
	let bytes = to_bytes(graph)?;
	writer.write_all(&bytes)?;
	writer.flush()?;
	Ok(())
}

/// Decodes a complete buffer; trailing bytes are rejected.
pub(crate) fn from_bytes(bytes: &[u8]) -> ChainResult<Graph> {
	let mut remaining = bytes;
	let graph = read_from(&mut remaining)?;
	if !remaining.is_empty() {
		return Err(ChainError::Format(format!("{} trailing bytes after chain data", remaining.len())));
	}
	Ok(graph)
}

/// Decodes one chain from `reader`, consuming exactly its bytes.
pub(crate) fn read_from<R: Read>(reader: R) -> ChainResult<Graph> {
	let mut input = Decoder { reader };

	let version = input.i32("version")?;
	if version > FORMAT_VERSION {
		return Err(ChainError::Version { found: version, supported: FORMAT_VERSION });
	}
	if version < 1 {
		return Err(ChainError::Format(format!("invalid version {version}")));
	}

	let node_count = input.count("node count")?;
	let mut nodes = Vec::with_capacity(node_count.min(PREALLOC_LIMIT));
	let mut declared = Vec::with_capacity(node_count.min(PREALLOC_LIMIT));
	for _ in 0..node_count {
		nodes.push(Node::new(&input.string("node content")?));
		declared.push(input.count("connection count")?);
	}

	for (index, node) in nodes.iter_mut().enumerate() {
		let count = input.count("connection count")?;
		if count != declared[index] {
			return Err(ChainError::Format(format!(
				"node {index} declares {} connections then {count}",
				declared[index]
			)));
		}

		node.connections.reserve(count.min(PREALLOC_LIMIT));
		for _ in 0..count {
			let weight = input.i64("connection weight")?;
			let weight = u64::try_from(weight)
				.map_err(|_| ChainError::Format(format!("negative weight {weight} on node {index}")))?;
			let target = match input.i32("connection target")? {
				TERMINAL_INDEX => Target::Terminal,
				raw => Target::Node(table_index(raw, node_count)?),
			};
			if node.connections.iter().any(|c| c.target == target) {
				return Err(ChainError::Format(format!("node {index} repeats a connection target")));
			}
			node.connections.push(Connection { target, weight });
		}
	}

	let mut pool = HashMap::with_capacity(nodes.len());
	for (index, node) in nodes.iter().enumerate() {
		if pool.insert(Node::key_of(&node.content), index).is_some() {
			return Err(ChainError::Format(format!("duplicate node `{}`", node.content)));
		}
	}

	let beginnings_count = input.count("beginnings count")?;
	let mut beginnings = BTreeSet::new();
	for _ in 0..beginnings_count {
		let raw = input.i32("beginning index")?;
		beginnings.insert(table_index(raw, node_count)?);
	}

	Ok(Graph { nodes, pool, beginnings })
}

/// Standard base64 of the full byte stream.
pub(crate) fn to_text(bytes: &[u8]) -> String {
	STANDARD.encode(bytes)
}

pub(crate) fn from_text(text: &str) -> ChainResult<Vec<u8>> {
	Ok(STANDARD.decode(text.trim())?)
}

fn put_i32(out: &mut Vec<u8>, value: i32) {
	out.extend_from_slice(&value.to_be_bytes());
}

fn put_i64(out: &mut Vec<u8>, value: i64) {
	out.extend_from_slice(&value.to_be_bytes());
}

fn put_len(out: &mut Vec<u8>, value: usize, what: &str) -> ChainResult<()> {
	let value = i32::try_from(value)
		.map_err(|_| ChainError::Format(format!("{what} too large to encode ({value})")))?;
	put_i32(out, value);
	Ok(())
}

fn table_index(raw: i32, node_count: usize) -> ChainResult<usize> {
	usize::try_from(raw)
		.ok()
		.filter(|&index| index < node_count)
		.ok_or_else(|| ChainError::Format(format!("node index {raw} outside table of {node_count}")))
}

struct Decoder<R> {
	reader: R,
}

impl<R: Read> Decoder<R> {
	fn fill(&mut self, buf: &mut [u8], what: &str) -> ChainResult<()> {
		self.reader.read_exact(buf).map_err(|e| truncated(e, what))
	}

	fn i32(&mut self, what: &str) -> ChainResult<i32> {
		let mut buf = [0u8; 4];
		self.fill(&mut buf, what)?;
		Ok(i32::from_be_bytes(buf))
	}

	fn i64(&mut self, what: &str) -> ChainResult<i64> {
		let mut buf = [0u8; 8];
		self.fill(&mut buf, what)?;
		Ok(i64::from_be_bytes(buf))
	}

	/// Non-negative `i32` used as a count or length.
	fn count(&mut self, what: &str) -> ChainResult<usize> {
		let raw = self.i32(what)?;
		usize::try_from(raw).map_err(|_| ChainError::Format(format!("negative {what} ({raw})")))
	}

	fn string(&mut self, what: &str) -> ChainResult<String> {
		let len = self.count(what)?;
		let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT));
		(&mut self.reader)
			.take(len as u64)
			.read_to_end(&mut buf)
			.map_err(|e| truncated(e, what))?;
		if buf.len() != len {
			return Err(ChainError::Format(format!("truncated while reading {what}")));
		}
		String::from_utf8(buf).map_err(|_| ChainError::Format(format!("{what} is not valid UTF-8")))
	}
}

fn truncated(err: io::Error, what: &str) -> ChainError {
	if err.kind() == io::ErrorKind::UnexpectedEof {
		ChainError::Format(format!("truncated while reading {what}"))
	} else {
		ChainError::Io(err)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::normalizer::Normalizer;

	fn trained(sentences: &[&str]) -> Graph {
		let normalizer = Normalizer::default();
		let mut graph = Graph::default();
		for sentence in sentences {
			graph.train_sentence(&normalizer.tokenize(sentence));
		}
		graph
	}

	#[test]
	fn empty_graph_layout() {
		let bytes = to_bytes(&Graph::default()).unwrap();
		assert_eq!(bytes, vec![0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
		let graph = from_bytes(&bytes).unwrap();
		assert!(graph.nodes.is_empty());
		assert!(!graph.is_trained());
	}

	#[test]
	fn single_sentence_layout() {
		let graph = trained(&["Hi!"]);
		let bytes = to_bytes(&graph).unwrap();

		#[rustfmt::skip]
		let expected: Vec<u8> = vec![
			0, 0, 0, 1,                   // version
			0, 0, 0, 2,                   // nodes
			0, 0, 0, 2, b'H', b'i',       // "Hi"
			0, 0, 0, 1,                   // 1 connection
			0, 0, 0, 1, b'!',             // "!"
			0, 0, 0, 1,                   // 1 connection
			0, 0, 0, 1,                   // Hi: 1 connection
			0, 0, 0, 0, 0, 0, 0, 1,       //   weight 1
			0, 0, 0, 1,                   //   -> node 1
			0, 0, 0, 1,                   // !: 1 connection
			0, 0, 0, 0, 0, 0, 0, 1,       //   weight 1
			0xff, 0xff, 0xff, 0xff,       //   -> terminal
			0, 0, 0, 1,                   // 1 beginning
			0, 0, 0, 0,                   //   node 0
		];
		assert_eq!(bytes, expected);
	}

	#[test]
	fn round_trip_preserves_content() {
		let graph = trained(&["Hello world!", "World is beautiful!", "Über café, naïve."]);
		let decoded = from_bytes(&to_bytes(&graph).unwrap()).unwrap();
		assert_eq!(decoded.snapshot(), graph.snapshot());
		assert_eq!(decoded.pool.len(), decoded.nodes.len());
	}

	#[test]
	fn decodes_forward_references() {
		let mut bytes = Vec::new();
		put_i32(&mut bytes, 1);
		put_i32(&mut bytes, 2);
		for (content, connections) in [("a", 1), ("b", 1)] {
			put_i32(&mut bytes, content.len() as i32);
			bytes.extend_from_slice(content.as_bytes());
			put_i32(&mut bytes, connections);
		}
		// a -> b (forward), b -> terminal
		put_i32(&mut bytes, 1);
		put_i64(&mut bytes, 4);
		put_i32(&mut bytes, 1);
		put_i32(&mut bytes, 1);
		put_i64(&mut bytes, 4);
		put_i32(&mut bytes, -1);
		put_i32(&mut bytes, 1);
		put_i32(&mut bytes, 0);

		let graph = from_bytes(&bytes).unwrap();
		assert_eq!(graph.nodes[0].connections, vec![Connection { target: Target::Node(1), weight: 4 }]);
		assert_eq!(graph.pool["b"], 1);
	}

	#[test]
	fn rejects_newer_version() {
		let mut bytes = to_bytes(&trained(&["hi"])).unwrap();
		bytes[3] = 2;
		assert!(matches!(
			from_bytes(&bytes),
			Err(ChainError::Version { found: 2, supported: 1 })
		));
	}

	#[test]
	fn rejects_every_truncation() {
		let bytes = to_bytes(&trained(&["Hello world!"])).unwrap();
		for len in 0..bytes.len() {
			assert!(
				matches!(from_bytes(&bytes[..len]), Err(ChainError::Format(_))),
				"prefix of {len} bytes was accepted"
			);
		}
	}

	#[test]
	fn rejects_trailing_bytes() {
		let mut bytes = to_bytes(&trained(&["hi"])).unwrap();
		bytes.push(0);
		assert!(matches!(from_bytes(&bytes), Err(ChainError::Format(_))));
	}

	#[test]
	fn rejects_inconsistent_tables() {
		let graph = trained(&["Hi!"]);
		let valid = to_bytes(&graph).unwrap();

		// Second connection count of "Hi" (bytes 27..31) disagrees with the first
		let mut bytes = valid.clone();
		bytes[30] = 2;
		assert!(matches!(from_bytes(&bytes), Err(ChainError::Format(_))));

		// Target of "Hi" (bytes 39..43) points past the table
		let mut bytes = valid.clone();
		bytes[42] = 9;
		assert!(matches!(from_bytes(&bytes), Err(ChainError::Format(_))));

		// Negative node count
		let mut bytes = valid;
		bytes[4] = 0x80;
		assert!(matches!(from_bytes(&bytes), Err(ChainError::Format(_))));
	}

	#[test]
	fn rejects_case_duplicates() {
		let mut bytes = Vec::new();
		put_i32(&mut bytes, 1);
		put_i32(&mut bytes, 2);
		for content in ["Word", "word"] {
			put_i32(&mut bytes, 4);
			bytes.extend_from_slice(content.as_bytes());
			put_i32(&mut bytes, 0);
		}
		put_i32(&mut bytes, 0);
		put_i32(&mut bytes, 0);
		put_i32(&mut bytes, 0);
		assert!(matches!(from_bytes(&bytes), Err(ChainError::Format(_))));
	}

	#[test]
	fn text_wrapper_round_trips() {
		let bytes = to_bytes(&trained(&["Hello world!"])).unwrap();
		let text = to_text(&bytes);
		assert_eq!(from_text(&format!("{text}\n")).unwrap(), bytes);
		assert!(matches!(from_text("not base64 !"), Err(ChainError::Format(_))));
	}
}
