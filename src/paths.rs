//! Path, wildcard and numeric-range resolution.
//!
//! Everything here is a plain function of its arguments and the file system;
//! none of it knows about action nodes.

use globset::Glob;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use walkdir::WalkDir;

use crate::constants::MAX_RANGE_ENTRIES;
use crate::error::{Error, Result};
use crate::model::Range;

lazy_static! {
    // A single numeric run: lazy prefix, the digits, then a digit-free suffix.
    static ref NUMERIC_RUN_RE: Regex = Regex::new(r"^(.*?)(\d+)(\D*)$").unwrap();
}

/// A value split around its last run of digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericParts {
    pub prefix: String,
    pub digits: String,
    pub suffix: String,
}

/// Whether `rel` is already anchored and must not be joined onto a base.
pub fn is_rooted(rel: &str) -> bool {
    rel.starts_with('/')
        || rel.starts_with('\\')
        || rel.starts_with('~')
        || rel.starts_with('$')
        || rel.contains(':')
}

/// Joins `rel` onto `working` unless `rel` is rooted. When either side is
/// empty the other one is returned as is.
pub fn absolute_path<P: AsRef<Path>>(working: P, rel: &str) -> PathBuf {
    let working = working.as_ref();
    if rel.is_empty() {
        return working.to_path_buf();
    }
    if is_rooted(rel) || working.as_os_str().is_empty() {
        return PathBuf::from(rel);
    }
    working.join(rel)
}

pub fn has_wildcards(value: &str) -> bool {
    value.contains('*') || value.contains('?')
}

/// Translates one glob segment into an anchored regex: `*` matches any run,
/// `?` one character, everything else literally.
pub fn glob_to_regex(segment: &str) -> Result<Regex> {
    let mut pattern = String::with_capacity(segment.len() + 8);
    pattern.push('^');
    for ch in segment.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
        .map_err(|e| Error::ConfigError(format!("invalid wildcard '{}': {}", segment, e)))
}

/// Files matching the last segment of `pattern`, taken relative to `working`.
///
/// Only the final segment may carry wildcards. A literal pattern yields the
/// path itself when it exists. Results are sorted by file name.
pub fn resolve_wildcards<P: AsRef<Path>>(working: P, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = absolute_path(working, pattern);
    let name = match full.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return Ok(existing(full)),
    };
    if !has_wildcards(&name) {
        return Ok(existing(full));
    }

    let parent = full
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !parent.is_dir() {
        debug!("No directory '{}' to match '{}' in", parent.display(), name);
        return Ok(Vec::new());
    }

    let matcher = Glob::new(&name)?.compile_matcher();
    let mut files = Vec::new();
    for entry in WalkDir::new(parent).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() && matcher.is_match(entry.file_name()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn existing(path: PathBuf) -> Vec<PathBuf> {
    if path.exists() {
        vec![path]
    } else {
        Vec::new()
    }
}

/// Walks `pattern` segment by segment below `base`.
///
/// Literal leading segments extend the base. The first segment with
/// wildcards is matched against directory names, recursing with the rest of
/// the pattern; a wildcard in the last segment matches files and directories
/// alike. A pattern without any wildcard yields the joined path whether or
/// not it exists.
pub fn enumerate_files_and_directories<P: AsRef<Path>>(
    base: P,
    pattern: &str,
) -> Result<Vec<PathBuf>> {
    let mut segments: Vec<&str> = pattern
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect();

    let start = if pattern.starts_with('/') || pattern.starts_with('\\') {
        PathBuf::from(MAIN_SEPARATOR.to_string())
    } else if segments.first().is_some_and(|s| s.ends_with(':')) {
        let drive = segments.remove(0);
        PathBuf::from(format!("{}{}", drive, MAIN_SEPARATOR))
    } else if is_rooted(pattern) {
        PathBuf::new()
    } else {
        base.as_ref().to_path_buf()
    };

    let mut found = Vec::new();
    enumerate_segments(start, &segments, &mut found)?;
    Ok(found)
}

fn enumerate_segments(base: PathBuf, segments: &[&str], found: &mut Vec<PathBuf>) -> Result<()> {
    let mut base = base;
    let mut rest = segments;
    while let Some((first, tail)) = rest.split_first() {
        if has_wildcards(first) {
            break;
        }
        base.push(first);
        rest = tail;
    }

    let (segment, tail) = match rest.split_first() {
        Some(split) => split,
        None => {
            found.push(base);
            return Ok(());
        }
    };

    let search = if base.as_os_str().is_empty() { PathBuf::from(".") } else { base };
    if !search.is_dir() {
        return Ok(());
    }

    let regex = glob_to_regex(segment)?;
    for entry in WalkDir::new(&search).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| regex.is_match(name));
        if !matches {
            continue;
        }
        if tail.is_empty() {
            found.push(entry.into_path());
        } else if entry.file_type().is_dir() {
            enumerate_segments(entry.into_path(), tail, found)?;
        }
    }
    Ok(())
}

pub fn split_numeric(value: &str) -> Option<NumericParts> {
    let caps = NUMERIC_RUN_RE.captures(value)?;
    Some(NumericParts {
        prefix: caps[1].to_string(),
        digits: caps[2].to_string(),
        suffix: caps[3].to_string(),
    })
}

/// Names covered by `range`.
///
/// The start value always comes first. When start and end share a prefix and
/// suffix around a numeric run, every number after the start seed up to and
/// including the end seed follows, zero-padded to the widest of `digits` and
/// both seeds. Otherwise the end value is appended verbatim.
///
/// # Errors
///
/// Returns `Error::ConfigError` when the range would expand to more than
/// [`MAX_RANGE_ENTRIES`] names.
pub fn enumerate_range(range: &Range, digits: usize) -> Result<Vec<String>> {
    if range.is_empty() {
        return Ok(Vec::new());
    }
    let mut names = vec![range.start_value.clone()];
    if range.end_value.is_empty() || range.end_value == range.start_value {
        return Ok(names);
    }

    let (start, end) = match (split_numeric(&range.start_value), split_numeric(&range.end_value)) {
        (Some(start), Some(end)) if start.prefix == end.prefix && start.suffix == end.suffix => {
            (start, end)
        }
        _ => {
            names.push(range.end_value.clone());
            return Ok(names);
        }
    };

    let (from, to) = match (start.digits.parse::<u64>(), end.digits.parse::<u64>()) {
        (Ok(from), Ok(to)) => (from, to),
        _ => {
            names.push(range.end_value.clone());
            return Ok(names);
        }
    };

    let count = to.saturating_sub(from).saturating_add(1);
    if count > MAX_RANGE_ENTRIES as u64 {
        return Err(Error::ConfigError(format!(
            "range '{}'-'{}' expands to {} names, more than the limit of {}",
            range.start_value, range.end_value, count, MAX_RANGE_ENTRIES
        )));
    }

    let width = digits.max(start.digits.len()).max(end.digits.len());
    for n in from.saturating_add(1)..=to {
        names.push(format!("{}{:0width$}{}", start.prefix, n, start.suffix, width = width));
    }
    Ok(names)
}

/// Numeric seed of a file name's stem, or 0 when it has none.
pub fn file_number(name: &str) -> i64 {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    split_numeric(&stem)
        .and_then(|parts| parts.digits.parse().ok())
        .unwrap_or(0)
}
