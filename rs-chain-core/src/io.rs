use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

/// File extension of serialized chains.
pub const CHAIN_EXTENSION: &str = "chain";

/// Reads a text file and returns its non-blank lines.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents
		.lines()
		.filter(|line| !line.trim().is_empty())
		.map(str::to_owned)
		.collect())
}

/// Path of the chain file that sits next to a training text.
///
/// Example:
/// `data/quotes.txt` → `data/quotes.chain`
pub fn chain_path_for<P: AsRef<Path>>(input_path: P) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(CHAIN_EXTENSION);

	Ok(output)
}

/// Resolves a chain name inside a data directory.
///
/// Names made of anything but alphanumerics, `-` and `_` are refused so that
/// a name can never escape `dir`.
pub fn named_chain_path<P: AsRef<Path>>(dir: P, name: &str) -> io::Result<PathBuf> {
	let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_');
	if !valid {
		return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid chain name: {name:?}")));
	}
	let mut path = dir.as_ref().join(name);
	path.set_extension(CHAIN_EXTENSION);
	Ok(path)
}

/// Resolves the directory holding `*.chain` files.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub fn normalize_folder(input: &str) -> PathBuf {
	if input == "." || input == "./" {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		PathBuf::from(input)
	}
}

/// Lists the chains stored in a directory, by name (file stem), sorted.
pub fn list_chains<P: AsRef<Path>>(dir: P) -> io::Result<Vec<String>> {
	let mut names = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();

		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(CHAIN_EXTENSION)) {
			if let Some(stem) = path.file_stem() {
				names.push(stem.to_string_lossy().to_string());
			}
		}
	}

	names.sort();
	Ok(names)
}
