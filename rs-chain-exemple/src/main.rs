use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rs_chain_core::io::chain_path_for;
use rs_chain_core::{ChainError, MarkovChain, Normalizer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Optional training text, one sentence per line
    // Without argument a small built-in corpus is used
    let corpus = std::env::args().nth(1);

    // The default normalizer strips links, tags and code spans,
    // a custom one can strip something else (here: tags, links and hashtags)
    let normalizer = Normalizer::with_patterns(&[r"<[^>]*>", r"https?://\S+", r"#\w+"])?;
    let chain = MarkovChain::with_normalizer(normalizer);

    // Generating before any training fails
    match chain.generate(10) {
        Err(ChainError::Untrained) => println!("Nothing learned yet"),
        _ => println!("Should not happen"),
    }

    match &corpus {
        Some(path) => {
            let count = chain.train_file(path)?;
            info!("Learned {count} sentences from {path}");
        }
        None => {
            chain.train([
                "Hello world! How are you today?",
                "World is beautiful, isn't it?",
                "The world (as we know it) is changing. #news",
                "Knock-knock! Who's there?",
                "Read more at https://example.com before you go.",
            ]);
        }
    }
    println!("Chain: {}", chain.stats());

    // A limit of 0 is refused
    match chain.generate(0) {
        Err(ChainError::InvalidArgument(e)) => println!("Invalid limit: {e}"),
        _ => println!("Should not happen"),
    }

    // Generate 5 sentences with the default random source
    for i in 0..5 {
        println!("Generated sentence {}: {}", i + 1, chain.generate(rs_chain_core::DEFAULT_LIMIT)?);
    }

    // The same seed always gives the same sentence
    let seeded = chain.generate_with_rng(30, &mut StdRng::seed_from_u64(42))?;
    println!("Seeded sentence: {seeded}");

    // Round trip through the text form
    let text = chain.serialize_to_string()?;
    let restored = MarkovChain::deserialize_from_string(&text)?;
    println!("Encoded in {} base64 characters, identical: {}", text.len(), restored.snapshot() == chain.snapshot());

    // Save next to the corpus (or in the current folder)
    let output = chain_path_for(corpus.as_deref().unwrap_or("demo.txt"))?;
    chain.serialize_to_file(&output)?;
    let reloaded = MarkovChain::deserialize_from_file(&output)?;
    println!("Saved to {} ({})", output.display(), reloaded.stats());

    Ok(())
}
