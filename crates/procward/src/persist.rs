//! The persisted process list: one `<name> <space-joined args>` line per entry.
//!
//! Arguments are not escaped, so an argument containing whitespace does not
//! survive a round trip.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
	pub name: String,
	pub args: Vec<String>,
}

pub fn format_line(name: &str, args: &[String]) -> String {
	if args.is_empty() {
		name.to_string()
	} else {
		format!("{} {}", name, args.join(" "))
	}
}

pub fn parse_line(line: &str) -> Option<ListEntry> {
	let mut parts = line.split_whitespace();
	let name = parts.next()?.to_string();
	Some(ListEntry {
		name,
		args: parts.map(str::to_string).collect(),
	})
}

/// Overwrites `path` with one line per entry.
pub fn write_list(path: &Path, entries: &[ListEntry]) -> std::io::Result<()> {
	let mut writer = BufWriter::new(File::create(path)?);
	for entry in entries {
		writeln!(writer, "{}", format_line(&entry.name, &entry.args))?;
	}
	let file = writer.into_inner().map_err(|e| e.into_error())?;
	file.sync_all()
}

/// Reads entries back; a missing file is an empty list.
pub fn read_list(path: &Path) -> std::io::Result<Vec<ListEntry>> {
	let file = match File::open(path) {
		Ok(f) => f,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
		Err(e) => return Err(e),
	};
	let mut entries = Vec::new();
	for line in BufReader::new(file).lines() {
		if let Some(entry) = parse_line(&line?) {
			entries.push(entry);
		}
	}
	Ok(entries)
}
