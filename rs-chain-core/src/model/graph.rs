use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::Rng;
use rand::seq::IteratorRandom;

use super::node::{Node, NodeId, Target};
use super::snapshot::{ChainSnapshot, ChainStats};
use crate::error::{ChainError, ChainResult};
use crate::normalizer::{attaches_left, attaches_right, is_sentence_end};

/// Arena-backed word graph.
///
/// Nodes live in `nodes` and are referenced everywhere by index; the terminal
/// sentinel is not stored at all, it only exists as [`Target::Terminal`].
///
/// # Invariants
/// - `pool` maps the lowercase form of every node's content to its index
/// - `pool` and `nodes` always hold the same set of nodes
/// - `beginnings` only holds valid indices
#[derive(Clone, Debug, Default)]
pub(crate) struct Graph {
	pub(crate) nodes: Vec<Node>,
	pub(crate) pool: HashMap<String, NodeId>,
	/// Ordered by index so that sampling is reproducible across instances.
	pub(crate) beginnings: BTreeSet<NodeId>,
}

impl Graph {
	/// Returns the node for `content`, creating it if needed.
	///
	/// A new node keeps the casing it was first seen with.
	pub(crate) fn resolve(&mut self, content: &str) -> NodeId {
		let key = Node::key_of(content);
		if let Some(&id) = self.pool.get(&key) {
			return id;
		}
		let id = self.nodes.len();
		self.nodes.push(Node::new(content));
		self.pool.insert(key, id);
		id
	}

	/// Learns one tokenized sentence. Empty token lists are ignored.
	pub(crate) fn train_sentence<S: AsRef<str>>(&mut self, tokens: &[S]) {
		let Some(first) = tokens.first() else {
			return;
		};

		let mut prev = self.resolve(first.as_ref());
		self.beginnings.insert(prev);

		for token in &tokens[1..] {
			let cur = self.resolve(token.as_ref());
			self.nodes[prev].add_transition(Target::Node(cur), 1);

			// A new sentence starts right after an ending mark
			if is_sentence_end(&self.nodes[prev].content) && !attaches_left(&self.nodes[cur].content) {
				self.beginnings.insert(cur);
			}
			prev = cur;
		}

		self.nodes[prev].add_transition(Target::Terminal, 1);
	}

	/// Performs a weighted random walk of at most `limit` nodes and renders it.
	pub(crate) fn generate<R: Rng + ?Sized>(&self, limit: usize, rng: &mut R) -> ChainResult<String> {
		if limit < 1 {
			return Err(ChainError::InvalidArgument("limit must be >= 1".to_owned()));
		}
		let mut current = *self.beginnings.iter().choose(rng).ok_or(ChainError::Untrained)?;

		let mut text = String::new();
		let mut previous: Option<&str> = None;
		for _ in 0..limit {
			let node = self.node(current)?;
			if let Some(previous) = previous {
				if !attaches_left(&node.content) && !attaches_right(previous) {
					text.push(' ');
				}
			}
			text.push_str(&node.content);
			previous = Some(node.content.as_str());

			match node.pick_next(rng)? {
				Some(Target::Node(next)) => current = next,
				Some(Target::Terminal) | None => break,
			}
		}
		Ok(text)
	}

	fn node(&self, id: NodeId) -> ChainResult<&Node> {
		self.nodes
			.get(id)
			.ok_or_else(|| ChainError::CorruptChain(format!("dangling node index {id}")))
	}

	/// Adds every weight and beginning of `other` into this graph.
	///
	/// Nodes are matched by canonical key; nodes unknown here are created with
	/// the casing `other` holds. The result equals training this graph on
	/// `other`'s data as well.
	pub(crate) fn merge(&mut self, other: &Graph) {
		let mapping: Vec<NodeId> = other.nodes.iter().map(|node| self.resolve(&node.content)).collect();

		for (node, &id) in other.nodes.iter().zip(&mapping) {
			for connection in &node.connections {
				let target = match connection.target {
					Target::Node(index) => Target::Node(mapping[index]),
					Target::Terminal => Target::Terminal,
				};
				self.nodes[id].add_transition(target, connection.weight);
			}
		}

		self.beginnings.extend(other.beginnings.iter().map(|&index| mapping[index]));
	}

	pub(crate) fn is_trained(&self) -> bool {
		!self.beginnings.is_empty()
	}

	pub(crate) fn stats(&self) -> ChainStats {
		let (connections, total_weight) = self
			.nodes
			.iter()
			.flat_map(|node| &node.connections)
			.fold((0, 0u64), |(count, weight), c| (count + 1, weight.saturating_add(c.weight)));

		ChainStats {
			nodes: self.nodes.len(),
			connections,
			beginnings: self.beginnings.len(),
			total_weight,
		}
	}

	pub(crate) fn snapshot(&self) -> ChainSnapshot {
		let nodes = self
			.nodes
			.iter()
			.map(|node| {
				let connections: BTreeMap<Option<String>, u64> = node
					.connections
					.iter()
					.map(|c| {
						let target = match c.target {
							Target::Node(index) => Some(self.nodes[index].content.clone()),
							Target::Terminal => None,
						};
						(target, c.weight)
					})
					.collect();
				(node.content.clone(), connections)
			})
			.collect();

		let beginnings = self
			.beginnings
			.iter()
			.map(|&index| self.nodes[index].content.clone())
			.collect();

		ChainSnapshot { nodes, beginnings }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::normalizer::Normalizer;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn trained(sentences: &[&str]) -> Graph {
		let normalizer = Normalizer::default();
		let mut graph = Graph::default();
		for sentence in sentences {
			graph.train_sentence(&normalizer.tokenize(sentence));
		}
		graph
	}

	fn weight(graph: &Graph, from: &str, to: Option<&str>) -> u64 {
		let node = &graph.nodes[graph.pool[from]];
		let target = match to {
			Some(content) => Target::Node(graph.pool[content]),
			None => Target::Terminal,
		};
		node.connections
			.iter()
			.find(|c| c.target == target)
			.map_or(0, |c| c.weight)
	}

	fn beginning_contents(graph: &Graph) -> Vec<&str> {
		graph.beginnings.iter().map(|&i| graph.nodes[i].content.as_str()).collect()
	}

	#[test]
	fn resolve_is_case_insensitive_and_keeps_first_casing() {
		let mut graph = Graph::default();
		let a = graph.resolve("World");
		let b = graph.resolve("world");
		assert_eq!(a, b);
		assert_eq!(graph.nodes[a].content, "World");
		assert_eq!(graph.pool.len(), 1);
	}

	#[test]
	fn learns_two_sentences() {
		let graph = trained(&["Hello world!", "World is beautiful!"]);

		let mut keys: Vec<&str> = graph.pool.keys().map(String::as_str).collect();
		keys.sort_unstable();
		assert_eq!(keys, vec!["!", "beautiful", "hello", "is", "world"]);

		assert_eq!(weight(&graph, "hello", Some("world")), 1);
		assert_eq!(weight(&graph, "world", Some("!")), 1);
		assert_eq!(weight(&graph, "world", Some("is")), 1);
		assert_eq!(weight(&graph, "is", Some("beautiful")), 1);
		assert_eq!(weight(&graph, "beautiful", Some("!")), 1);
		assert_eq!(weight(&graph, "!", None), 2);
		assert_eq!(beginning_contents(&graph), vec!["Hello", "world"]);
	}

	#[test]
	fn terminal_follows_last_token_even_without_punctuation() {
		let graph = trained(&["no ending here"]);
		assert_eq!(weight(&graph, "here", None), 1);
	}

	#[test]
	fn sentence_restart_registers_inner_beginnings() {
		let graph = trained(&["Hi there. How are you? Fine!) ok"]);
		assert_eq!(beginning_contents(&graph), vec!["Hi", "How", "Fine"]);
	}

	#[test]
	fn generate_renders_spacing() {
		let graph = trained(&["hello world!"]);
		let mut rng = StdRng::seed_from_u64(0);
		assert_eq!(graph.generate(100, &mut rng).unwrap(), "hello world!");
	}

	#[test]
	fn generate_glues_brackets() {
		let graph = trained(&["call (now) [please]"]);
		let mut rng = StdRng::seed_from_u64(0);
		assert_eq!(graph.generate(100, &mut rng).unwrap(), "call (now) [please]");
	}

	#[test]
	fn generate_stops_at_limit() {
		let graph = trained(&["one two three four"]);
		let mut rng = StdRng::seed_from_u64(0);
		assert_eq!(graph.generate(2, &mut rng).unwrap(), "one two");
	}

	#[test]
	fn generate_checks_arguments_and_state() {
		let mut rng = StdRng::seed_from_u64(0);
		assert!(matches!(Graph::default().generate(10, &mut rng), Err(ChainError::Untrained)));

		let graph = trained(&["hi"]);
		assert!(matches!(graph.generate(0, &mut rng), Err(ChainError::InvalidArgument(_))));
	}

	#[test]
	fn merge_adds_weights_and_beginnings() {
		let mut left = trained(&["Hello world!"]);
		let right = trained(&["hello there!", "World peace."]);
		left.merge(&right);

		let expected = trained(&["Hello world!", "hello there!", "World peace."]);
		assert_eq!(left.snapshot(), expected.snapshot());
	}

	#[test]
	fn stats_count_everything() {
		let graph = trained(&["Hello world!", "World is beautiful!"]);
		let stats = graph.stats();
		assert_eq!(stats.nodes, 5);
		assert_eq!(stats.connections, 6);
		assert_eq!(stats.beginnings, 2);
		assert_eq!(stats.total_weight, 7);
	}
}
