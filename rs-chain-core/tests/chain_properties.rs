use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rs_chain_core::{DEFAULT_LIMIT, MarkovChain};

fn sentence() -> impl Strategy<Value = String> {
	prop::collection::vec(
		prop_oneof![
			"[a-zA-Z]{1,6}",
			Just(".".to_owned()),
			Just("!".to_owned()),
			Just(",".to_owned()),
			Just("(".to_owned()),
			Just(")".to_owned()),
		],
		1..12,
	)
	.prop_map(|tokens| tokens.join(" "))
}

fn dataset() -> impl Strategy<Value = Vec<String>> {
	prop::collection::vec(sentence(), 1..8)
}

fn trained(data: &[String]) -> MarkovChain {
	let chain = MarkovChain::new();
	chain.train(data);
	chain
}

proptest! {
	#[test]
	fn generation_is_deterministic_per_seed(data in dataset(), seed in any::<u64>()) {
		let first = trained(&data);
		let second = trained(&data);
		let a = first.generate_with_rng(DEFAULT_LIMIT, &mut StdRng::seed_from_u64(seed)).unwrap();
		let b = second.generate_with_rng(DEFAULT_LIMIT, &mut StdRng::seed_from_u64(seed)).unwrap();
		prop_assert_eq!(a, b);
	}

	#[test]
	fn trained_chain_generates_something(data in dataset()) {
		let chain = trained(&data);
		prop_assert!(chain.stats().beginnings > 0);
		prop_assert!(!chain.generate(DEFAULT_LIMIT).unwrap().is_empty());
	}

	#[test]
	fn split_training_equals_concatenation(first in dataset(), second in dataset()) {
		let split = trained(&first);
		split.train(&second);

		let joint: Vec<String> = first.iter().chain(&second).cloned().collect();
		prop_assert_eq!(split.snapshot(), trained(&joint).snapshot());
	}

	#[test]
	fn round_trip_is_lossless(data in dataset()) {
		let chain = trained(&data);
		let restored = MarkovChain::deserialize_from_bytes(&chain.serialize_to_bytes().unwrap()).unwrap();
		prop_assert_eq!(restored.snapshot(), chain.snapshot());
	}

	#[test]
	fn generation_respects_limit(data in dataset(), limit in 1usize..6, seed in any::<u64>()) {
		let chain = trained(&data);
		let text = chain.generate_with_rng(limit, &mut StdRng::seed_from_u64(seed)).unwrap();
		let tokens = rs_chain_core::Normalizer::without_stripping().tokenize(&text);
		prop_assert!(tokens.len() <= limit);
	}
}
