//! Report writers for analyzer output.
//!
//! - [`write_insights_json`] / [`read_insights_json`]: the machine-readable
//!   report consumed by the dashboard.
//! - [`render_summary`]: the plain-text executive summary.
//! - [`print_insights`]: the console walkthrough printed by `kbi analyze`.

use anyhow::{Context, Result};
use std::path::Path;

use crate::format::{format_number, truncate};
use crate::models::{Insights, InsightsReport};

const RULE_WIDTH: usize = 80;
const SUMMARY_USER_QUERIES: usize = 50;
const SUMMARY_MOST_VIEWED: usize = 30;

/// Wraps insights with a local ISO-8601 generation timestamp.
pub fn build_report(insights: Insights) -> InsightsReport {
    InsightsReport {
        generated_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        insights,
    }
}

pub fn write_insights_json(report: &InsightsReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    write_file(path, &json)?;
    tracing::info!("insights exported to {}", path.display());
    Ok(())
}

pub fn read_insights_json(path: &Path) -> Result<InsightsReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read insights file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse insights file: {}", path.display()))
}

/// Writes `contents`, creating parent directories as needed.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Renders the plain-text executive summary.
pub fn render_summary(insights: &Insights, generated: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let thin = "-".repeat(RULE_WIDTH);
    let mut lines: Vec<String> = vec![
        rule.clone(),
        "KNOWLEDGE BASE USAGE ANALYSIS - EXECUTIVE SUMMARY".into(),
        format!("Generated: {}", generated),
        rule.clone(),
        String::new(),
    ];

    let pp = &insights.pain_points;
    lines.push("PAIN POINTS - What Users Can't Find:".into());
    lines.push(thin.clone());
    lines.push(format!(
        "Total Failed Searches: {}",
        format_number(pp.total_failed_searches)
    ));
    lines.push(format!(
        "Unique User Search Terms: {}",
        format_number(pp.unique_user_queries.unwrap_or(0) as u64)
    ));
    lines.push(String::new());

    if !pp.by_portal.is_empty() {
        lines.push("Breakdown by Portal:".into());
        let mut portals: Vec<(&String, &u64)> = pp.by_portal.iter().collect();
        portals.sort_by(|a, b| b.1.cmp(a.1));
        for (portal, count) in portals {
            lines.push(format!("  {:<30} {:>8} failures", portal, format_number(*count)));
        }
        lines.push(String::new());
    }

    lines.push(format!(
        "Top {} REAL USER Failed Searches (excluding internal/IDs):",
        SUMMARY_USER_QUERIES
    ));
    let queries = if pp.top_user_queries.is_empty() {
        &pp.top_failed_queries
    } else {
        &pp.top_user_queries
    };
    for (i, (term, count)) in queries.iter().take(SUMMARY_USER_QUERIES).enumerate() {
        lines.push(ranked_line(i, term, *count, "times"));
    }
    lines.push(String::new());

    if !pp.patterns.is_empty() {
        lines.push("Common Failure Patterns:".into());
        lines.extend(pp.patterns.iter().map(|p| format!("  • {}", p)));
    }
    lines.push(String::new());
    lines.push(String::new());

    let tc = &insights.top_content;
    lines.push("TOP PERFORMING CONTENT:".into());
    lines.push(thin.clone());
    lines.push(format!("Total Article Views: {}", format_number(tc.total_views)));
    lines.push(String::new());
    lines.push(format!("Most Viewed Articles (Top {}):", SUMMARY_MOST_VIEWED));
    for (i, (title, views)) in tc.most_viewed.iter().take(SUMMARY_MOST_VIEWED).enumerate() {
        lines.push(ranked_line(i, title, *views, "views"));
    }
    lines.push(String::new());
    lines.push(format!(
        "Least Viewed Articles (Bottom {} - Consider Review):",
        tc.least_viewed.len()
    ));
    for (i, (title, views)) in tc.least_viewed.iter().enumerate() {
        lines.push(ranked_line(i, title, *views, "views"));
    }
    lines.push(String::new());
    lines.push(String::new());

    lines.push("RECOMMENDATIONS:".into());
    lines.push(thin);
    for (i, rec) in insights.recommendations.iter().enumerate() {
        lines.push(String::new());
        lines.push(format!("{}. [{}] {}", i + 1, rec.priority, rec.category));
        lines.push(format!("   Recommendation: {}", rec.recommendation));
        lines.push(format!("   Action: {}", rec.action));
    }

    lines.push(String::new());
    lines.push(rule);
    lines.push(String::new());
    lines.join("\n")
}

fn ranked_line(i: usize, label: &str, count: u64, unit: &str) -> String {
    format!(
        "  {:>2}. {:<65} {:>6} {}",
        i + 1,
        label,
        format_number(count),
        unit
    )
}

pub fn write_summary(insights: &Insights, path: &Path) -> Result<()> {
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    write_file(path, &render_summary(insights, &generated))?;
    tracing::info!("summary report written to {}", path.display());
    Ok(())
}

fn print_ranked<'a>(
    entries: impl Iterator<Item = (&'a String, &'a u64)>,
    unit: &str,
) {
    for (i, (label, count)) in entries.enumerate() {
        println!(
            "    {:>2}. {:<60} ({} {})",
            i + 1,
            truncate(label, 60),
            format_number(*count),
            unit
        );
    }
}

/// Prints the console walkthrough of an analysis run.
pub fn print_insights(insights: &Insights) {
    let pp = &insights.pain_points;
    let thin = "-".repeat(70);

    if insights.summary.failed_search_files > 0 {
        println!();
        println!("PAIN POINTS - What's NOT Working:");
        println!("{}", thin);
        println!();
        println!(
            "  Total Failed Searches: {}",
            format_number(pp.total_failed_searches)
        );
        println!(
            "  Unique Failed Search Terms: {}",
            format_number(pp.unique_failed_queries as u64)
        );

        println!();
        println!("  Breakdown by Portal:");
        let mut portals: Vec<(&String, &u64)> = pp.by_portal.iter().collect();
        portals.sort_by(|a, b| b.1.cmp(a.1));
        for (portal, count) in portals {
            println!("    {:<30} {:>8} failures", portal, format_number(*count));
        }

        println!();
        println!("  Top 30 REAL USER Pain Points (excluding internal/ID searches):");
        print_ranked(pp.top_user_queries.iter().take(30), "times");

        println!();
        println!("  Top 20 Internal/System Searches (for reference):");
        print_ranked(pp.top_internal_queries.iter().take(20), "times");

        if !pp.patterns.is_empty() {
            println!();
            println!("  Identified Patterns in Failed Searches:");
            for pattern in pp.patterns.iter().take(10) {
                println!("    • {}", pattern);
            }
        }
    }

    if insights.summary.article_summary_files > 0 {
        let tc = &insights.top_content;
        println!();
        println!("TOP PERFORMING CONTENT:");
        println!("{}", thin);
        println!();
        println!("  Total Article Views: {}", format_number(tc.total_views));
        println!();
        println!("  Top 20 Most Viewed Articles:");
        print_ranked(tc.most_viewed.iter().take(20), "views");
        println!();
        println!("  Bottom 10 Least Viewed Articles (may need review/removal):");
        let skip = tc.least_viewed.len().saturating_sub(10);
        print_ranked(tc.least_viewed.iter().skip(skip), "views");
    }

    if !insights.search_effectiveness.files.is_empty() {
        println!();
        println!("SEARCH EFFECTIVENESS:");
        println!("{}", thin);
        for file in &insights.search_effectiveness.files {
            println!();
            println!("  {} ({})", file.file, file.period);
            println!("  Columns found: {}...", file.columns.join(", "));
        }
    }

    println!();
    println!();
    println!("RECOMMENDATIONS:");
    println!("{}", thin);
    for (i, rec) in insights.recommendations.iter().enumerate() {
        println!();
        println!("  {}. [{}] {}", i + 1, rec.priority, rec.category);
        println!("     -> {}", rec.recommendation);
        println!("     Action: {}", rec.action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PainPoints, Priority, Recommendation, TopContent};

    fn sample() -> Insights {
        let mut pp = PainPoints {
            total_failed_searches: 12_345,
            unique_user_queries: Some(2),
            patterns: vec!["Time Off: 1,200 failed searches".to_string()],
            ..Default::default()
        };
        pp.top_user_queries.insert("pto balance".into(), 1_200);
        pp.top_user_queries.insert("w2".into(), 45);
        pp.by_portal.insert("Internal".into(), 10);
        pp.by_portal.insert("Employee".into(), 12_335);

        let mut tc = TopContent {
            total_views: 5_000,
            ..Default::default()
        };
        tc.most_viewed.insert("How to request PTO".into(), 4_990);
        tc.least_viewed.insert("Old policy".into(), 10);

        Insights {
            pain_points: pp,
            top_content: tc,
            recommendations: vec![Recommendation::new(
                Priority::High,
                "Content Gaps",
                "Create articles",
                "Review top 20",
            )],
            ..Default::default()
        }
    }

    #[test]
    fn summary_contains_every_section() {
        let text = render_summary(&sample(), "2025-01-31 09:00:00");
        assert!(text.contains("Generated: 2025-01-31 09:00:00"));
        assert!(text.contains("Total Failed Searches: 12,345"));
        assert!(text.contains("Unique User Search Terms: 2"));
        assert!(text.contains("   1. pto balance"));
        assert!(text.contains(" 1,200 times"));
        assert!(text.contains("  • Time Off: 1,200 failed searches"));
        assert!(text.contains("Total Article Views: 5,000"));
        assert!(text.contains("How to request PTO"));
        assert!(text.contains("Least Viewed Articles (Bottom 1 - Consider Review):"));
        assert!(text.contains("1. [HIGH] Content Gaps"));
        assert!(text.contains("   Action: Review top 20"));
    }

    #[test]
    fn summary_line_layout() {
        let text = render_summary(&sample(), "now");
        let rule = "=".repeat(RULE_WIDTH);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], rule);
        assert_eq!(lines[1], "KNOWLEDGE BASE USAGE ANALYSIS - EXECUTIVE SUMMARY");
        assert_eq!(lines[2], "Generated: now");
        assert_eq!(lines[3], rule);
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "PAIN POINTS - What Users Can't Find:");
        assert_eq!(*lines.last().unwrap(), rule);
        assert!(text.ends_with(&format!("\n\n{}\n", rule)));
        let least = format!("  {:>2}. {:<65} {:>6} views", 1, "Old policy", "10");
        assert!(lines.contains(&least.as_str()));
    }

    #[test]
    fn summary_sorts_portals_by_count() {
        let text = render_summary(&sample(), "now");
        let employee = text.find("Employee").unwrap();
        let internal = text.find("Internal   ").unwrap();
        assert!(employee < internal);
    }

    #[test]
    fn summary_falls_back_to_all_queries() {
        let mut insights = sample();
        insights.pain_points.top_user_queries.clear();
        insights
            .pain_points
            .top_failed_queries
            .insert("12345".into(), 3);
        let text = render_summary(&insights, "now");
        assert!(text.contains("   1. 12345"));
    }

    #[test]
    fn json_round_trip_through_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out/kb_insights_report.json");
        let report = build_report(sample());
        write_insights_json(&report, &path).unwrap();
        let back = read_insights_json(&path).unwrap();
        assert_eq!(back, report);
        let keys: Vec<&String> = back.insights.pain_points.top_user_queries.keys().collect();
        assert_eq!(keys, vec!["pto balance", "w2"]);
    }
}
