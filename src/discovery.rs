//! Locating KB export files under the data root.
//!
//! Exports are organised as `<root>/<year>/…/<file>` for the monthly reports
//! and `<root>/<failed searches dir>/<year>/<file>` for failed searches.
//! Files are dated from their path ([`period_from_path`]) since the exports
//! carry no reliable date column.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Extensions accepted in the failed-search directories.
const FAILED_SEARCH_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "xlsm"];

/// Recursively finds files under each `<root>/<year>` directory whose file
/// name matches any of `patterns`. Missing year directories are skipped.
/// The result is sorted.
pub fn find_files(root: &Path, years: &[String], patterns: &[&str]) -> Result<Vec<PathBuf>> {
    let globs = build_globset(patterns)?;
    let mut files = Vec::new();

    for year in years {
        let year_path = root.join(year);
        if !year_path.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&year_path) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("skipping unreadable path under {}: {}", year_path.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if globs.is_match(entry.file_name().to_string_lossy().as_ref()) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Spreadsheets directly inside each subdirectory of `dir` (one level, not
/// recursive). A missing `dir` yields an empty list. The result is sorted.
pub fn failed_search_files(dir: &Path) -> Result<Vec<PathBuf>> {
    failed_search_files_with(dir, &FAILED_SEARCH_EXTENSIONS)
}

/// Like [`failed_search_files`] restricted to the given extensions.
pub fn failed_search_files_with(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    for year_dir in year_dirs(dir)? {
        for entry in std::fs::read_dir(&year_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let matches = path
                .extension()
                .map(|e| extensions.iter().any(|x| e == *x))
                .unwrap_or(false);
            if matches {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Immediate subdirectories of `dir`, sorted.
pub fn year_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Derives a `YYYY-MM` period from a file path.
///
/// The first path component containing an English month name wins; the year
/// is the first of `years` found in that component or anywhere in the full
/// path. Returns `"unknown"` when no month/year pair is found.
pub fn period_from_path(path: &Path, years: &[String]) -> String {
    let full = path.to_string_lossy();
    for part in path.components() {
        let part_lower = part.as_os_str().to_string_lossy().to_lowercase();
        for (i, month) in MONTHS.iter().enumerate() {
            if !part_lower.contains(month) {
                continue;
            }
            if let Some(year) = years
                .iter()
                .find(|y| part_lower.contains(y.as_str()) || full.contains(y.as_str()))
            {
                return format!("{}-{:02}", year, i + 1);
            }
        }
    }
    "unknown".to_string()
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
