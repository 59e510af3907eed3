use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ChainError, ChainResult};

/// Characters that always form a token of their own.
const SPLIT_PUNCTUATION: [char; 11] = ['.', ',', '?', '!', ':', ';', '/', '(', ')', '[', ']'];

/// Marks that end a sentence.
const SENTENCE_END: [char; 3] = ['.', '!', '?'];

/// Marks rendered without a space before them.
const ATTACH_LEFT: [char; 8] = ['.', ',', ':', ';', '!', '?', ')', ']'];

/// Marks rendered without a space after them.
const ATTACH_RIGHT: [char; 2] = ['(', '['];

macro_rules! strip_pattern {
	($name:ident, $regex_str:expr) => {
		static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
	};
}

// <tag ...> spans, must run before the URL one so a link inside an attribute
// cannot swallow the closing `>`
strip_pattern!(RE_TAG, r"<[^>]*>");
// URLs up to the next whitespace
strip_pattern!(RE_URL, r"https?://\S+");
// ```block``` spans, must run before the single-delimited one
strip_pattern!(RE_CODE_BLOCK, r"(?s)```.*?```");
// `inline` spans
strip_pattern!(RE_CODE_INLINE, r"`[^`]*`");

/// Turns raw input text into chain tokens.
///
/// The stripping stage is configurable: the default removes URLs, angle-bracket
/// tags and code spans, [`Normalizer::with_patterns`] replaces that set.
/// The punctuation rules applied afterwards are fixed.
#[derive(Clone, Debug)]
pub struct Normalizer {
	strip_patterns: Vec<Regex>,
}

impl Default for Normalizer {
	fn default() -> Self {
		let strip_patterns = [&RE_TAG, &RE_URL, &RE_CODE_BLOCK, &RE_CODE_INLINE]
			.into_iter()
			.filter_map(|pattern| (**pattern).clone())
			.collect();
		Self { strip_patterns }
	}
}

impl Normalizer {
	/// Builds a normalizer that strips the given regular expressions, applied in order.
	///
	/// # Errors
	/// Returns `InvalidArgument` if one of the patterns does not compile.
	pub fn with_patterns(patterns: &[&str]) -> ChainResult<Self> {
		let strip_patterns = patterns
			.iter()
			.map(|pattern| {
				Regex::new(pattern)
					.map_err(|e| ChainError::InvalidArgument(format!("strip pattern `{pattern}`: {e}")))
			})
			.collect::<ChainResult<Vec<_>>>()?;
		Ok(Self { strip_patterns })
	}

	/// Normalizer that strips nothing.
	pub fn without_stripping() -> Self {
		Self { strip_patterns: Vec::new() }
	}

	/// Removes every substring matched by the strip patterns.
	pub fn strip(&self, input: &str) -> String {
		let mut text = input.to_owned();
		for pattern in &self.strip_patterns {
			text = pattern.replace_all(&text, "").into_owned();
		}
		text
	}

	/// Tokenizes a raw sentence.
	///
	/// - Strips the meaningless substrings
	/// - Collapses runs of two or more `!`, `?`, `.` into a single `.`
	/// - Splits on whitespace and around each punctuation character
	///
	/// An empty result means the input carries nothing to learn.
	///
	/// Example: `"Hello world!"` → `["Hello", "world", "!"]`
	pub fn tokenize(&self, input: &str) -> Vec<String> {
		let stripped = self.strip(input);
		let collapsed = collapse_endings(&stripped);

		let mut tokens = Vec::new();
		let mut current = String::new();
		for c in collapsed.trim().chars() {
			if c.is_whitespace() {
				flush(&mut tokens, &mut current);
			} else if SPLIT_PUNCTUATION.contains(&c) {
				flush(&mut tokens, &mut current);
				tokens.push(c.to_string());
			} else {
				current.push(c);
			}
		}
		flush(&mut tokens, &mut current);
		tokens
	}
}

fn flush(tokens: &mut Vec<String>, current: &mut String) {
	if !current.is_empty() {
		tokens.push(std::mem::take(current));
	}
}

/// Replaces every run of two or more ending marks with a single `.`.
fn collapse_endings(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	let mut chars = text.chars().peekable();
	while let Some(c) = chars.next() {
		if !SENTENCE_END.contains(&c) {
			out.push(c);
			continue;
		}
		let mut run = 1;
		while chars.next_if(|next| SENTENCE_END.contains(next)).is_some() {
			run += 1;
		}
		out.push(if run > 1 { '.' } else { c });
	}
	out
}

/// Returns the only character of `content`, if it has exactly one.
fn single_char(content: &str) -> Option<char> {
	let mut chars = content.chars();
	match (chars.next(), chars.next()) {
		(Some(c), None) => Some(c),
		_ => None,
	}
}

/// `true` for `.`, `!` and `?` on their own.
pub(crate) fn is_sentence_end(content: &str) -> bool {
	single_char(content).is_some_and(|c| SENTENCE_END.contains(&c))
}

/// `true` for punctuation glued to the preceding token when rendered.
pub(crate) fn attaches_left(content: &str) -> bool {
	single_char(content).is_some_and(|c| ATTACH_LEFT.contains(&c))
}

/// `true` for punctuation glued to the following token when rendered.
pub(crate) fn attaches_right(content: &str) -> bool {
	single_char(content).is_some_and(|c| ATTACH_RIGHT.contains(&c))
}
