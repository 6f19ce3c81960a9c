//! Month-over-month tracking of failed searches.
//!
//! Each failed-search export contributes one [`MonthlyMetrics`] row, in the
//! order the exports sort on disk. [`TrendReport`] compares the first and
//! latest rows and turns the change into an [`ActionLevel`].

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use crate::discovery;
use crate::format::{format_number, format_rounded, format_signed, truncate};
use crate::table::Table;
use crate::workbook;

pub const SEARCH_PHRASE_COLUMN: &str = "Search Phrase";
pub const FAILED_SEARCHES_COLUMN: &str = "Failed Searches";

/// Percentage change beyond which the trend is no longer "stable".
const ACTION_THRESHOLD_PCT: f64 = 10.0;
const RECENT_MONTHS: usize = 6;

/// One CSV row. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyMetrics {
    pub file: String,
    pub total_failed_searches: u64,
    pub unique_search_terms: u64,
    pub avg_failures_per_term: f64,
}

/// Metrics for one export, or `None` when it lacks either required column.
pub fn metrics_for(table: &Table, file: &str) -> Option<MonthlyMetrics> {
    let phrase_col = table.column(SEARCH_PHRASE_COLUMN)?;
    let count_col = table.column(FAILED_SEARCHES_COLUMN)?;

    let mut total = 0.0;
    let mut phrases = HashSet::new();
    for row in 0..table.rows.len() {
        if let Some(n) = table.cell(row, count_col).as_number() {
            total += n;
        }
        let phrase = table.cell(row, phrase_col);
        if !phrase.is_empty() {
            phrases.insert(phrase.to_string());
        }
    }

    let unique = phrases.len() as u64;
    let avg = if unique > 0 {
        (total / unique as f64 * 100.0).round() / 100.0
    } else {
        0.0
    };
    Some(MonthlyMetrics {
        file: file.to_string(),
        total_failed_searches: total.max(0.0) as u64,
        unique_search_terms: unique,
        avg_failures_per_term: avg,
    })
}

/// Reads every `*.xlsx` one level under each year directory of `dir`.
/// Unreadable files are skipped with a warning; files without the
/// required columns are skipped silently.
pub fn track_monthly(dir: &Path, skip_rows: usize) -> Result<Vec<MonthlyMetrics>> {
    let files = discovery::failed_search_files_with(dir, &["xlsx"])
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    if files.is_empty() {
        tracing::warn!("no failed-search exports found under {}", dir.display());
    }

    let mut months = Vec::new();
    for file in files {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let table = match workbook::read_table(&file, skip_rows) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("could not process {}: {}", file.display(), e);
                continue;
            }
        };
        match metrics_for(&table, &stem) {
            Some(m) => {
                println!(
                    "  {}: {} failures",
                    stem,
                    format_number(m.total_failed_searches)
                );
                months.push(m);
            }
            None => tracing::debug!("{} lacks tracker columns, skipped", file.display()),
        }
    }
    Ok(months)
}

pub fn write_csv(months: &[MonthlyMetrics], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for month in months {
        writer.serialize(month)?;
    }
    writer.flush()?;
    tracing::info!("improvement tracker saved to {}", path.display());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionLevel {
    Increasing,
    Decreasing,
    Stable,
}

impl ActionLevel {
    pub fn from_pct_change(pct: f64) -> Self {
        if pct > ACTION_THRESHOLD_PCT {
            ActionLevel::Increasing
        } else if pct < -ACTION_THRESHOLD_PCT {
            ActionLevel::Decreasing
        } else {
            ActionLevel::Stable
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            ActionLevel::Increasing => "Failed searches are increasing!",
            ActionLevel::Decreasing => "Great job! Failed searches are decreasing!",
            ActionLevel::Stable => "Failed searches are relatively stable",
        }
    }

    pub fn actions(&self) -> [&'static str; 3] {
        match self {
            ActionLevel::Increasing => [
                "Focus on addressing top failed search queries",
                "Review search algorithm and synonyms",
                "Create missing content immediately",
            ],
            ActionLevel::Decreasing => [
                "Continue current improvement efforts",
                "Document what's working",
                "Share best practices",
            ],
            ActionLevel::Stable => [
                "Time to focus on new areas of improvement",
                "Review content quality, not just quantity",
                "Optimize existing high-performing content",
            ],
        }
    }
}

/// Summary over all tracked months.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSummary {
    pub months: usize,
    pub mean_failures: f64,
    pub direction: Direction,
}

impl TrackerSummary {
    pub fn from_months(months: &[MonthlyMetrics]) -> Option<Self> {
        let first = months.first()?;
        let last = months.last()?;
        let sum: f64 = months.iter().map(|m| m.total_failed_searches as f64).sum();
        let direction = if last.total_failed_searches > first.total_failed_searches {
            Direction::Increasing
        } else {
            Direction::Decreasing
        };
        Some(Self {
            months: months.len(),
            mean_failures: sum / months.len() as f64,
            direction,
        })
    }
}

/// First vs latest month comparison. Needs at least two months.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendReport {
    pub first: MonthlyMetrics,
    pub latest: MonthlyMetrics,
    pub change: i64,
    pub pct_change: f64,
    pub best: MonthlyMetrics,
    pub worst: MonthlyMetrics,
    pub action: ActionLevel,
}

impl TrendReport {
    pub fn from_months(months: &[MonthlyMetrics]) -> Option<Self> {
        if months.len() < 2 {
            return None;
        }
        let first = months.first()?.clone();
        let latest = months.last()?.clone();
        let change = (latest.total_failed_searches as i128 - first.total_failed_searches as i128)
            .clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        let pct_change = if first.total_failed_searches > 0 {
            change as f64 / first.total_failed_searches as f64 * 100.0
        } else {
            0.0
        };

        // Ties resolve to the earliest month.
        let mut best = &months[0];
        let mut worst = &months[0];
        for m in &months[1..] {
            if m.total_failed_searches < best.total_failed_searches {
                best = m;
            }
            if m.total_failed_searches > worst.total_failed_searches {
                worst = m;
            }
        }

        Some(Self {
            first,
            latest,
            change,
            pct_change,
            best: best.clone(),
            worst: worst.clone(),
            action: ActionLevel::from_pct_change(pct_change),
        })
    }
}

pub fn print_summary(months: &[MonthlyMetrics]) {
    let Some(summary) = TrackerSummary::from_months(months) else {
        println!("No failed-search exports with tracker columns were found.");
        return;
    };
    println!();
    println!("Summary:");
    println!("  Total months tracked: {}", summary.months);
    println!(
        "  Average monthly failures: {}",
        format_rounded(summary.mean_failures)
    );
    println!(
        "  Trend: {}",
        match summary.direction {
            Direction::Increasing => "Increasing",
            Direction::Decreasing => "Decreasing",
        }
    );

    if months.len() >= RECENT_MONTHS {
        println!();
        println!("  Recent {}-Month Trend:", RECENT_MONTHS);
        for m in &months[months.len() - RECENT_MONTHS..] {
            println!(
                "    {:<20}: {:>6} failures",
                truncate(&m.file, 20),
                format_number(m.total_failed_searches)
            );
        }
    }
}

pub fn print_trend(trend: &TrendReport) {
    let rule = "=".repeat(70);
    println!();
    println!("{}", rule);
    println!("INSIGHTS");
    println!("{}", rule);
    println!();
    println!("Overall Trend (First vs Latest Month):");
    println!(
        "  First month: {} failures",
        format_number(trend.first.total_failed_searches)
    );
    println!(
        "  Latest month: {} failures",
        format_number(trend.latest.total_failed_searches)
    );
    println!(
        "  Change: {} ({:+.1}%)",
        format_signed(trend.change),
        trend.pct_change
    );
    println!();
    println!("Best Month: {}", trend.best.file);
    println!(
        "   {} failures",
        format_number(trend.best.total_failed_searches)
    );
    println!();
    println!("Worst Month: {}", trend.worst.file);
    println!(
        "   {} failures",
        format_number(trend.worst.total_failed_searches)
    );

    println!();
    println!("{}", rule);
    println!("ACTION ITEMS");
    println!("{}", rule);
    println!();
    println!("{}", trend.action.headline());
    for action in trend.action.actions() {
        println!("   -> {}", action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn table(rows: Vec<(&str, f64)>) -> Table {
        Table {
            columns: vec![
                SEARCH_PHRASE_COLUMN.to_string(),
                FAILED_SEARCHES_COLUMN.to_string(),
            ],
            rows: rows
                .into_iter()
                .map(|(p, n)| {
                    let phrase = if p.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(p.to_string())
                    };
                    vec![phrase, Cell::Number(n)]
                })
                .collect(),
        }
    }

    fn month(file: &str, total: u64) -> MonthlyMetrics {
        MonthlyMetrics {
            file: file.to_string(),
            total_failed_searches: total,
            unique_search_terms: 1,
            avg_failures_per_term: total as f64,
        }
    }

    #[test]
    fn metrics_count_distinct_phrases() {
        let t = table(vec![("pto", 10.0), ("vpn", 5.0), ("pto", 2.0), ("", 3.0)]);
        let m = metrics_for(&t, "January 2024").unwrap();
        assert_eq!(m.file, "January 2024");
        assert_eq!(m.total_failed_searches, 20);
        assert_eq!(m.unique_search_terms, 2);
        assert_eq!(m.avg_failures_per_term, 10.0);
    }

    #[test]
    fn average_rounds_to_two_places() {
        let t = table(vec![("a", 1.0), ("b", 1.0), ("c", 0.0)]);
        let m = metrics_for(&t, "x").unwrap();
        assert_eq!(m.avg_failures_per_term, 0.67);
    }

    #[test]
    fn missing_columns_are_skipped() {
        let mut t = table(vec![("a", 1.0)]);
        t.columns[1] = "failed searches".to_string();
        assert!(metrics_for(&t, "x").is_none());
    }

    #[test]
    fn no_terms_means_zero_average() {
        let t = table(vec![]);
        let m = metrics_for(&t, "empty").unwrap();
        assert_eq!(m.unique_search_terms, 0);
        assert_eq!(m.avg_failures_per_term, 0.0);
    }

    #[test]
    fn summary_direction() {
        let months = vec![month("a", 100), month("b", 50), month("c", 120)];
        let s = TrackerSummary::from_months(&months).unwrap();
        assert_eq!(s.months, 3);
        assert!((s.mean_failures - 90.0).abs() < 1e-9);
        assert_eq!(s.direction, Direction::Increasing);

        let flat = vec![month("a", 100), month("b", 100)];
        let s = TrackerSummary::from_months(&flat).unwrap();
        assert_eq!(s.direction, Direction::Decreasing);
        assert!(TrackerSummary::from_months(&[]).is_none());
    }

    #[test]
    fn trend_needs_two_months() {
        assert!(TrendReport::from_months(&[month("a", 1)]).is_none());
    }

    #[test]
    fn trend_best_and_worst_take_first_extreme() {
        let months = vec![
            month("jan", 200),
            month("feb", 50),
            month("mar", 300),
            month("apr", 50),
            month("may", 300),
            month("jun", 150),
        ];
        let t = TrendReport::from_months(&months).unwrap();
        assert_eq!(t.change, -50);
        assert!((t.pct_change + 25.0).abs() < 1e-9);
        assert_eq!(t.best.file, "feb");
        assert_eq!(t.worst.file, "mar");
        assert_eq!(t.action, ActionLevel::Decreasing);
    }

    #[test]
    fn zero_first_month_has_zero_pct() {
        let t = TrendReport::from_months(&[month("a", 0), month("b", 40)]).unwrap();
        assert_eq!(t.change, 40);
        assert_eq!(t.pct_change, 0.0);
        assert_eq!(t.action, ActionLevel::Stable);
    }

    #[test]
    fn saturated_months_do_not_overflow() {
        let months = vec![month("a", u64::MAX), month("b", u64::MAX), month("c", 0)];
        let s = TrackerSummary::from_months(&months).unwrap();
        assert!(s.mean_failures > 1e19);
        let t = TrendReport::from_months(&months).unwrap();
        assert_eq!(t.change, i64::MIN);
        assert_eq!(t.worst.file, "a");
    }

    #[test]
    fn action_thresholds_are_exclusive() {
        assert_eq!(ActionLevel::from_pct_change(10.0), ActionLevel::Stable);
        assert_eq!(ActionLevel::from_pct_change(10.1), ActionLevel::Increasing);
        assert_eq!(ActionLevel::from_pct_change(-10.0), ActionLevel::Stable);
        assert_eq!(ActionLevel::from_pct_change(-10.5), ActionLevel::Decreasing);
    }

    #[test]
    fn csv_has_expected_header() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("improvement_tracker.csv");
        write_csv(&[month("January 2024", 1234)], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("file,total_failed_searches,unique_search_terms,avg_failures_per_term")
        );
        assert!(lines.next().unwrap().starts_with("January 2024,1234,1,1234"));
    }

    #[test]
    fn missing_directory_tracks_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let months = track_monthly(&tmp.path().join("nope"), 9).unwrap();
        assert!(months.is_empty());
    }
}
