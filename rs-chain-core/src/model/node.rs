use rand::Rng;

use crate::error::{ChainError, ChainResult};

/// Index of a node inside the graph arena.
///
/// Also the node's position in the encoded node table.
pub(crate) type NodeId = usize;

/// Target of a connection: a regular node or the end-of-sentence sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Target {
	Node(NodeId),
	Terminal,
}

/// Weighted directed edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Connection {
	pub(crate) target: Target,
	/// Number of times this transition was observed.
	pub(crate) weight: u64,
}

/// A token of the chain.
///
/// `content` keeps the casing of the first occurrence ever inserted; the
/// lowercase form is the key under which the graph pools the node.
///
/// ## Invariants
/// - No two connections share a target
/// - Connections keep their insertion order (first encountered target first)
#[derive(Clone, Debug)]
pub(crate) struct Node {
	pub(crate) content: String,
	pub(crate) connections: Vec<Connection>,
}

impl Node {
	pub(crate) fn new(content: &str) -> Self {
		Self {
			content: content.to_owned(),
			connections: Vec::new(),
		}
	}

	/// Canonical pool key for some content.
	pub(crate) fn key_of(content: &str) -> String {
		content.to_lowercase()
	}

	/// Adds `amount` observations of the transition toward `target`.
	///
	/// The connection is looked up first and only created when missing.
	pub(crate) fn add_transition(&mut self, target: Target, amount: u64) {
		let index = match self.connections.iter().position(|c| c.target == target) {
			Some(index) => index,
			None => {
				self.connections.push(Connection { target, weight: 0 });
				self.connections.len() - 1
			}
		};
		let connection = &mut self.connections[index];
		connection.weight = connection.weight.saturating_add(amount);
	}

	/// Selects the next target by weighted sequential elimination.
	///
	/// Walks the connections in insertion order, drawing a fresh value in
	/// `[1, remaining]` for each one; the connection is selected when the draw
	/// falls within its weight, otherwise its weight leaves the remainder.
	/// Each connection ends up selected with probability `weight / total`.
	///
	/// Returns `None` if the node has no connections.
	///
	/// # Errors
	/// `CorruptChain` if the connections carry no weight at all (or more than
	/// a `u64` can count), which training never produces.
	pub(crate) fn pick_next<R: Rng + ?Sized>(&self, rng: &mut R) -> ChainResult<Option<Target>> {
		if self.connections.is_empty() {
			return Ok(None);
		}

		let mut remaining = self
			.connections
			.iter()
			.try_fold(0u64, |sum, c| sum.checked_add(c.weight))
			.ok_or_else(|| {
				ChainError::CorruptChain(format!("total weight of `{}` overflows", self.content))
			})?;

		for connection in &self.connections {
			if remaining == 0 {
				break;
			}
			if rng.random_range(1..=remaining) <= connection.weight {
				return Ok(Some(connection.target));
			}
			remaining -= connection.weight;
		}

		Err(ChainError::CorruptChain(format!(
			"node `{}` has no outgoing weight",
			self.content
		)))
	}
}
