use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

/// Size counters of a chain.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainStats {
	pub nodes: usize,
	pub connections: usize,
	pub beginnings: usize,
	/// Sum of all connection weights (saturating).
	pub total_weight: u64,
}

impl fmt::Display for ChainStats {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} nodes, {} connections, {} beginnings, total weight {}",
			self.nodes, self.connections, self.beginnings, self.total_weight
		)
	}
}

/// Owned, order-independent copy of a chain's learned content.
///
/// Two chains holding the same transitions compare equal whatever order their
/// nodes were created in. Connection targets are keyed by content, `None`
/// standing for the end of a sentence.
///
/// This is a detached copy: changing it never affects the chain it came from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainSnapshot {
	pub nodes: BTreeMap<String, BTreeMap<Option<String>, u64>>,
	pub beginnings: BTreeSet<String>,
}

impl ChainSnapshot {
	/// Weight of `from → to` (`to = None` for the terminal), 0 if unknown.
	///
	/// Both sides are matched on their exact stored content.
	pub fn weight(&self, from: &str, to: Option<&str>) -> u64 {
		self.nodes
			.get(from)
			.and_then(|connections| connections.get(&to.map(str::to_owned)))
			.copied()
			.unwrap_or(0)
	}
}
