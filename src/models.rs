//! Insight types shared by the analyzer, the report writers and the
//! dashboard.
//!
//! These serialize to `kb_insights_report.json`. Every struct defaults its
//! missing fields on read, so the dashboard can render partial reports.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label → count, ordered by rank (highest first).
pub type Ranking = IndexMap<String, u64>;

/// Running counts that remember first-seen order for tie-breaking.
pub type Tally = IndexMap<String, u64>;

/// Adds `count` to `key` in `tally`, saturating at `u64::MAX`.
pub fn tally_add(tally: &mut Tally, key: &str, count: u64) {
    let slot = tally.entry(key.to_string()).or_insert(0);
    *slot = slot.saturating_add(count);
}

/// Sum of all counts, saturating at `u64::MAX`.
pub fn tally_total(tally: &Tally) -> u64 {
    tally.values().fold(0, |acc, n| acc.saturating_add(*n))
}

/// All entries sorted by count, highest first. Ties keep first-seen order.
pub fn ranked(tally: &Tally) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = tally.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
}

/// The first `n` entries of a ranked list as a [`Ranking`].
pub fn top(entries: &[(String, u64)], n: usize) -> Ranking {
    entries.iter().take(n).cloned().collect()
}

/// The last `n` entries of a ranked list, still highest first.
pub fn bottom(entries: &[(String, u64)], n: usize) -> Ranking {
    let start = entries.len().saturating_sub(n);
    entries[start..].iter().cloned().collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsReport {
    pub generated_at: String,
    pub insights: Insights,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insights {
    pub summary: Summary,
    pub pain_points: PainPoints,
    pub top_content: TopContent,
    pub search_effectiveness: SearchEffectiveness,
    pub recommendations: Vec<Recommendation>,
}

/// How many files each dataset contributed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Summary {
    pub scorecard_files: usize,
    pub article_summary_files: usize,
    pub failed_search_files: usize,
    pub search_effectiveness_files: usize,
    /// Files that matched a dataset but could not be read.
    pub skipped_files: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PainPoints {
    pub total_failed_searches: u64,
    pub unique_failed_queries: usize,
    /// Absent in reports written before user and internal searches were split.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_user_queries: Option<usize>,
    pub top_failed_queries: Ranking,
    /// Searches from public portals that are not article IDs.
    pub top_user_queries: Ranking,
    /// Searches from internal portals, or article-ID lookups.
    pub top_internal_queries: Ranking,
    pub by_portal: Ranking,
    pub patterns: Vec<String>,
    pub user_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopContent {
    pub most_viewed: Ranking,
    pub least_viewed: Ranking,
    pub total_views: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchEffectiveness {
    pub files: Vec<SheetOverview>,
}

/// Where a file came from and what its first columns are called.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetOverview {
    pub file: String,
    pub period: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }

    /// Lowercase name, used as a CSS class.
    pub fn css_class(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendation {
    pub priority: Priority,
    pub category: String,
    pub recommendation: String,
    pub action: String,
}

impl Recommendation {
    pub fn new(priority: Priority, category: &str, recommendation: &str, action: &str) -> Self {
        Self {
            priority,
            category: category.to_string(),
            recommendation: recommendation.to_string(),
            action: action.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_is_stable_for_ties() {
        let mut t = Tally::new();
        tally_add(&mut t, "b", 2);
        tally_add(&mut t, "a", 5);
        tally_add(&mut t, "c", 2);
        tally_add(&mut t, "b", 1);
        let r = ranked(&t);
        assert_eq!(
            r,
            vec![
                ("a".to_string(), 5),
                ("b".to_string(), 3),
                ("c".to_string(), 2)
            ]
        );
        assert_eq!(top(&r, 2).keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(bottom(&r, 2).keys().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(bottom(&r, 10).len(), 3);
    }

    #[test]
    fn tally_saturates_instead_of_overflowing() {
        let mut t = Tally::new();
        for _ in 0..3 {
            tally_add(&mut t, "pto", i64::MAX as u64);
        }
        tally_add(&mut t, "w2", 7);
        assert_eq!(t.get("pto"), Some(&u64::MAX));
        assert_eq!(tally_total(&t), u64::MAX);
    }

    #[test]
    fn report_reads_back_with_missing_sections() {
        let json = r#"{"insights": {"pain_points": {"total_failed_searches": 12,
            "top_user_queries": {"pto": 7, "w2": 5}}}}"#;
        let report: InsightsReport = serde_json::from_str(json).unwrap();
        let pp = &report.insights.pain_points;
        assert_eq!(pp.total_failed_searches, 12);
        assert_eq!(pp.unique_user_queries, None);
        assert_eq!(pp.top_user_queries.get_index(0), Some((&"pto".to_string(), &7)));
        assert!(report.insights.recommendations.is_empty());
        assert_eq!(report.insights.top_content.total_views, 0);
    }

    #[test]
    fn priority_serializes_uppercase() {
        let rec = Recommendation::new(Priority::High, "Content Gaps", "r", "a");
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["priority"], "HIGH");
    }
}
