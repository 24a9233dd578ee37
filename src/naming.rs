use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_MAX_CHARS;
use crate::error::{NamerError, Result};
use crate::utils::is_image_extension;

/// Used when nothing usable is left of the model's suggestion.
pub const PLACEHOLDER_NAME: &str = "screenshot";

/// Upper bound for a whole file name (stem, dot and extension) on common
/// filesystems.
pub const MAX_FILENAME_BYTES: usize = 255;

const MAX_COLLISION_ATTEMPTS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingOptions {
    /// Character limit for the new stem, date prefix and suffix included.
    pub max_chars: usize,
    /// Prefix the date found in the original name, if any.
    pub date_prefix: bool,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            date_prefix: true,
        }
    }
}

/// Where a file is going. `proposed` is the sanitized name before collision
/// handling, `destination` the free path actually used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub source: PathBuf,
    pub proposed: PathBuf,
    pub destination: PathBuf,
}

impl RenamePlan {
    pub fn is_noop(&self) -> bool {
        self.source == self.destination
    }
}

/// Strip `<think>...</think>` blocks emitted by reasoning models.
///
/// An unclosed block swallows the rest of the text.
pub fn strip_think_tags(text: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find("<think>") {
        if let Some(end) = result[start..].find("</think>") {
            result = format!("{}{}", &result[..start], &result[start + end + 8..]);
        } else {
            result.truncate(start);
            break;
        }
    }
    result
}

/// Reduce a raw model reply to filename-safe characters.
///
/// Only the first non-empty line is used. Whitespace becomes `_`; anything
/// other than letters, digits, `_` and `-` is dropped. May return an empty
/// string.
pub fn clean_suggestion(raw: &str) -> String {
    let text = strip_think_tags(raw);
    let mut line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .trim_matches(|c| c == '"' || c == '\'' || c == '`');

    if let Some((stem, ext)) = line.rsplit_once('.') {
        if is_image_extension(ext) {
            line = stem;
        }
    }

    let mut cleaned = String::with_capacity(line.len());
    for c in line.chars() {
        let mapped = if c.is_whitespace() || c == '_' {
            '_'
        } else if c.is_alphanumeric() || c == '-' {
            c
        } else {
            continue;
        };
        if mapped == '_' && cleaned.ends_with('_') {
            continue;
        }
        cleaned.push(mapped);
    }

    cleaned.trim_matches(|c| c == '_' || c == '-').to_string()
}

/// Longest prefix of `s` within both limits, cut on a char boundary.
pub fn truncate_to(s: &str, max_chars: usize, max_bytes: usize) -> &str {
    let mut end = 0;
    for (count, (idx, c)) in s.char_indices().enumerate() {
        if count >= max_chars || idx + c.len_utf8() > max_bytes {
            break;
        }
        end = idx + c.len_utf8();
    }
    &s[..end]
}

/// Clean a suggestion and fit it into the limits, falling back to the
/// placeholder rather than ever returning an empty name.
pub fn sanitize_stem(suggestion: &str, max_chars: usize, max_bytes: usize) -> String {
    let cleaned = clean_suggestion(suggestion);
    let stem = truncate_to(&cleaned, max_chars, max_bytes).trim_end_matches(|c| c == '_' || c == '-');
    if stem.is_empty() {
        truncate_to(PLACEHOLDER_NAME, max_chars.max(1), max_bytes.max(1)).to_string()
    } else {
        stem.to_string()
    }
}

/// Find a date in a file stem such as `Screenshot 2024-05-24 at 23.53.04`.
///
/// Recognizes `YYYY-MM-DD`, `MM-DD-YYYY`, `DD-MM-YYYY` (with `-` or `/`) and
/// the same orders written as eight bare digits. The leftmost plausible date
/// wins.
pub fn extract_date(stem: &str) -> Option<NaiveDate> {
    let bytes = stem.as_bytes();
    (0..bytes.len())
        .filter(|&i| bytes[i].is_ascii_digit())
        .find_map(|i| date_at(&stem[i..]))
}

fn date_at(s: &str) -> Option<NaiveDate> {
    let b = s.as_bytes();
    let digits = |from: usize, to: usize| b.get(from..to).map_or(false, |r| r.iter().all(u8::is_ascii_digit));
    let sep = |i: usize| matches!(b.get(i), Some(b'-') | Some(b'/'));

    if digits(0, 4) && sep(4) && digits(5, 7) && sep(7) && digits(8, 10) {
        if let Some(date) = ymd(&s[0..4], &s[5..7], &s[8..10]) {
            return Some(date);
        }
    }

    if digits(0, 2) && sep(2) && digits(3, 5) && sep(5) && digits(6, 10) {
        let date = ymd(&s[6..10], &s[0..2], &s[3..5]).or_else(|| ymd(&s[6..10], &s[3..5], &s[0..2]));
        if date.is_some() {
            return date;
        }
    }

    if digits(0, 8) {
        return ymd(&s[0..4], &s[4..6], &s[6..8])
            .or_else(|| ymd(&s[4..8], &s[0..2], &s[2..4]))
            .or_else(|| ymd(&s[4..8], &s[2..4], &s[0..2]));
    }

    None
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    // Long digit runs (timestamps, ids) otherwise yield nonsense years.
    (1970..=2100).contains(&date.year()).then_some(date)
}

/// Build the sanitized, pre-collision destination for `source`.
pub fn propose_destination(source: &Path, suggestion: &str, options: &NamingOptions) -> PathBuf {
    let extension = source.extension().map(|e| e.to_os_string());
    let ext_bytes = extension.as_ref().map_or(0, |e| e.len() + 1);
    let stem_bytes = MAX_FILENAME_BYTES.saturating_sub(ext_bytes);

    let prefix = if options.date_prefix {
        source
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(extract_date)
            .map(|d| d.format("%Y-%m-%d-").to_string())
            .unwrap_or_default()
    } else {
        String::new()
    };
    // Keep room for at least the placeholder after the prefix.
    let prefix = if prefix.len() + PLACEHOLDER_NAME.len() <= options.max_chars.min(stem_bytes) {
        prefix
    } else {
        String::new()
    };

    let stem = format!(
        "{}{}",
        prefix,
        sanitize_stem(
            suggestion,
            options.max_chars - prefix.len(),
            stem_bytes.saturating_sub(prefix.len()),
        )
    );

    source.with_file_name(file_name(&stem, extension.as_ref()))
}

fn file_name(stem: &str, extension: Option<&OsString>) -> OsString {
    let mut name = OsString::from(stem);
    if let Some(ext) = extension {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Destinations handed out and sources given up earlier in the same run.
/// A dry run leaves the disk as it was, so collisions between its own plans
/// are only visible here.
#[derive(Debug, Default)]
pub struct PlannedNames {
    claimed: HashSet<PathBuf>,
    vacated: HashSet<PathBuf>,
}

impl PlannedNames {
    pub fn record(&mut self, plan: &RenamePlan) {
        if plan.is_noop() {
            return;
        }
        self.vacated.insert(plan.source.clone());
        self.vacated.remove(&plan.destination);
        self.claimed.remove(&plan.source);
        self.claimed.insert(plan.destination.clone());
    }

    fn is_claimed(&self, path: &Path) -> bool {
        self.claimed.contains(path)
    }

    fn is_vacated(&self, path: &Path) -> bool {
        self.vacated.contains(path)
    }
}

/// Whether `path` is occupied by something other than `source`.
fn is_taken(path: &Path, source: &Path, planned: &PlannedNames) -> bool {
    if path == source {
        return false;
    }
    if planned.is_claimed(path) {
        return true;
    }
    if planned.is_vacated(path) {
        return false;
    }
    // symlink_metadata so a dangling symlink still counts as occupied
    fs::symlink_metadata(path).is_ok() && !is_same_entry(path, source)
}

/// Whether two paths name the same directory entry, e.g. differ only in
/// case on a case-insensitive filesystem. Hard links are separate entries:
/// renaming onto one is a silent no-op.
#[cfg(unix)]
pub fn is_same_entry(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    if a == b {
        return true;
    }
    match (fs::symlink_metadata(a), fs::symlink_metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino() && ma.nlink() <= 1,
        _ => false,
    }
}

#[cfg(not(unix))]
pub fn is_same_entry(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

/// Pick a free destination for `source`, appending `-1`, `-2`, ... to the
/// stem while `proposed` is taken by another file or an earlier plan.
pub fn resolve_destination(
    source: &Path,
    proposed: &Path,
    max_chars: usize,
    planned: &PlannedNames,
) -> Result<PathBuf> {
    if !is_taken(proposed, source, planned) {
        return Ok(proposed.to_path_buf());
    }

    let stem = proposed
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = proposed.extension().map(|e| e.to_os_string());
    let ext_bytes = extension.as_ref().map_or(0, |e| e.len() + 1);
    let stem_bytes = MAX_FILENAME_BYTES.saturating_sub(ext_bytes);

    for n in 1..=MAX_COLLISION_ATTEMPTS {
        let suffix = format!("-{}", n);
        let base = truncate_to(
            &stem,
            max_chars.saturating_sub(suffix.len()),
            stem_bytes.saturating_sub(suffix.len()),
        );
        if base.is_empty() {
            break;
        }
        let candidate = proposed.with_file_name(file_name(&format!("{}{}", base, suffix), extension.as_ref()));
        if !is_taken(&candidate, source, planned) {
            return Ok(candidate);
        }
    }

    Err(NamerError::RenameFailed {
        from: source.to_path_buf(),
        to: proposed.to_path_buf(),
        source: io::Error::new(io::ErrorKind::AlreadyExists, "no free destination name"),
    })
}

pub fn plan_rename(source: &Path, suggestion: &str, options: &NamingOptions) -> Result<RenamePlan> {
    plan_rename_avoiding(source, suggestion, options, &PlannedNames::default())
}

/// Like [`plan_rename`], also steering clear of names planned earlier in
/// the run.
pub fn plan_rename_avoiding(
    source: &Path,
    suggestion: &str,
    options: &NamingOptions,
    planned: &PlannedNames,
) -> Result<RenamePlan> {
    let proposed = propose_destination(source, suggestion, options);
    let destination = resolve_destination(source, &proposed, options.max_chars, planned)?;
    Ok(RenamePlan {
        source: source.to_path_buf(),
        proposed,
        destination,
    })
}

/// Perform the rename. Refuses to replace any file that is not the source.
pub fn apply_rename(plan: &RenamePlan) -> Result<()> {
    if plan.is_noop() {
        return Ok(());
    }

    let failed = |source: io::Error| NamerError::RenameFailed {
        from: plan.source.clone(),
        to: plan.destination.clone(),
        source,
    };

    if is_taken(&plan.destination, &plan.source, &PlannedNames::default()) {
        return Err(failed(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "destination appeared after it was checked",
        )));
    }

    fs::rename(&plan.source, &plan.destination).map_err(failed)
}
