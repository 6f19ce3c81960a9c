//! Static HTML dashboard generated from the insights report.
//!
//! Besides the main page, the three "View all" links on it point to
//! detail pages that are written next to it.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::format::format_number;
use crate::models::{InsightsReport, Ranking};
use crate::report::write_file;

pub const PAIN_POINTS_PAGE: &str = "pain_points_detail.html";
pub const TOP_CONTENT_PAGE: &str = "top_content_detail.html";
pub const LOW_CONTENT_PAGE: &str = "low_content_detail.html";

const PREVIEW_PAIN_POINTS: usize = 5;
const PREVIEW_TOP_CONTENT: usize = 5;
const PREVIEW_LOW_CONTENT: usize = 3;

const STYLE: &str = r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: #f6f7fb;
            color: #0f172a;
            padding: 24px;
            line-height: 1.55;
        }
        .container { max-width: 1200px; margin: 0 auto; display: flex; flex-direction: column; gap: 20px; }
        .two-column-grid { display: grid; grid-template-columns: 1fr 1fr; gap: 20px; }
        h1 { color: #0f172a; font-size: 26px; font-weight: 700; display: flex; align-items: center; gap: 10px; }
        .subtitle { color: #64748b; font-size: 13px; }
        .stats-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 14px; }
        .stat-card {
            background: #fff; padding: 18px 20px; border-radius: 12px; border: 1px solid #e5e7eb;
            display: flex; flex-direction: column; gap: 6px;
        }
        .stat-number { font-size: 28px; font-weight: 800; color: #0f172a; }
        .stat-label { color: #64748b; font-size: 12px; letter-spacing: .3px; }
        .stat-number.danger { color: #dc2626; }
        .stat-number.accent { color: #334155; }
        .section { background: #fff; padding: 22px; border-radius: 12px; border: 1px solid #e5e7eb; }
        .section-header { display: flex; justify-content: space-between; align-items: center; margin-bottom: 14px; }
        .section h2 { color: #0f172a; font-size: 18px; font-weight: 700; display: flex; align-items: center; gap: 8px; }
        .section-note { color: #666; margin-bottom: 15px; }
        .view-all { color: #64748b; font-size: 12px; text-decoration: none; }
        .view-all:hover { text-decoration: underline; }
        .icon { font-size: 1.1em; }
        .list-item {
            padding: 12px; margin-bottom: 8px; background: #f8fafc; border-radius: 10px;
            display: flex; justify-content: space-between; align-items: center; border: 1px solid #eef2f7;
        }
        .list-item.pain-point { border-left: 4px solid #ef4444; }
        .list-item.top-content { border-left: 4px solid #22c55e; }
        .list-item.low-content { border-left: 4px solid #f59e0b; }
        .item-rank { font-weight: 700; color: #334155; margin-right: 10px; min-width: 30px; }
        .item-name { flex: 1; }
        .item-count {
            font-weight: 700; color: #475569; background: #fff; padding: 6px 12px;
            border-radius: 999px; border: 1px solid #e5e7eb;
        }
        .recommendation {
            padding: 16px 16px 14px 16px; margin-bottom: 12px; border-radius: 10px;
            background: #f8fafc; border: 1px solid #eef2f7; border-left: 5px solid #3b82f6;
        }
        .recommendation.high { border-left-color: #ef4444; }
        .recommendation.medium { border-left-color: #f59e0b; }
        .recommendation.low { border-left-color: #22c55e; }
        .rec-header { display: flex; align-items: center; gap: 10px; margin-bottom: 10px; }
        .priority-badge { padding: 4px 10px; border-radius: 20px; font-size: 11px; font-weight: 800; color: white; }
        .priority-badge.high { background: #ef4444; }
        .priority-badge.medium { background: #f59e0b; }
        .priority-badge.low { background: #22c55e; }
        .rec-title { font-weight: 700; font-size: 15px; }
        .rec-action { color: #64748b; font-size: 13px; padding-left: 20px; }
        .pattern-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(160px, 1fr)); gap: 12px; margin-top: 10px; }
        .pattern-card { padding: 12px; background: #fff; color: #0f172a; border-radius: 10px; text-align: center; border: 1px solid #e5e7eb; }
        .pattern-name { font-size: 12px; color: #64748b; margin-bottom: 4px; }
        .pattern-count { font-size: 20px; font-weight: 800; color: #2563eb; }
        .back-link { color: #2563eb; font-size: 13px; text-decoration: none; }
        @media (max-width: 768px) {
            h1 { font-size: 20px; }
            .stats-grid { grid-template-columns: 1fr; }
            .two-column-grid { grid-template-columns: 1fr; }
            .list-item { flex-direction: column; align-items: flex-start; gap: 10px; }
        }
"#;

/// Escapes text for HTML element and attribute content.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Splits a pattern line such as `"Benefits: 1,425 failed searches"` into
/// its name and bare count (`"Benefits"`, `"1425"`).
pub fn parse_pattern(pattern: &str) -> Option<(String, String)> {
    let mut parts = pattern.split(':');
    let name = parts.next()?.trim();
    let rest = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let count = rest.split_whitespace().next()?.replace(',', "");
    Some((name.to_string(), count))
}

fn page_head(out: &mut String, title: &str) {
    out.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <style>{}</style>
</head>
<body>
    <div class="container">
"#,
        escape_html(title),
        STYLE
    ));
}

fn page_tail(out: &mut String) {
    out.push_str("    </div>\n</body>\n</html>\n");
}

fn list_items(out: &mut String, entries: &Ranking, limit: usize, class: &str, unit: &str) {
    for (i, (label, count)) in entries.iter().take(limit).enumerate() {
        out.push_str(&format!(
            r#"
                    <div class="list-item {class}">
                        <span class="item-rank">{rank}.</span>
                        <span class="item-name">{label}</span>
                        <span class="item-count">{count} {unit}</span>
                    </div>
"#,
            class = class,
            rank = i + 1,
            label = escape_html(label),
            count = format_number(*count),
            unit = unit,
        ));
    }
}

fn stat_card(out: &mut String, value: &str, label: &str, class: &str) {
    out.push_str(&format!(
        r#"            <div class="stat-card">
                <div class="stat-number {}">{}</div>
                <div class="stat-label">{}</div>
            </div>
"#,
        class, value, label
    ));
}

fn section_open(out: &mut String, icon: &str, title: &str, link: Option<&str>) {
    let link = link
        .map(|href| format!(r#"<a class="view-all" href="{}">View all</a>"#, href))
        .unwrap_or_default();
    out.push_str(&format!(
        r#"            <div class="section">
                <div class="section-header">
                    <h2><span class="icon">{}</span> {}</h2>
                    {}
                </div>
"#,
        icon, title, link
    ));
}

/// Renders the main dashboard page.
pub fn render_dashboard(report: &InsightsReport, generated: &str) -> String {
    let insights = &report.insights;
    let pp = &insights.pain_points;
    let tc = &insights.top_content;
    let recs = &insights.recommendations;

    let unique_terms = pp
        .unique_user_queries
        .unwrap_or(pp.unique_failed_queries);

    let mut out = String::new();
    page_head(&mut out, "Knowledge Base Insights Dashboard");
    out.push_str(&format!(
        r#"        <h1>&#128218; Knowledge Base Insights Dashboard</h1>
        <div class="subtitle">Generated on {}</div>

        <div class="stats-grid">
"#,
        escape_html(generated)
    ));
    stat_card(
        &mut out,
        &format_number(pp.total_failed_searches),
        "Failed Searches",
        "danger",
    );
    stat_card(
        &mut out,
        &format_number(unique_terms as u64),
        "Unique User Search Terms",
        "accent",
    );
    stat_card(
        &mut out,
        &format_number(tc.total_views),
        "Total Article Views",
        "accent",
    );
    stat_card(&mut out, &recs.len().to_string(), "Action Items", "accent");
    out.push_str("        </div>\n\n        <div class=\"two-column-grid\">\n");

    section_open(
        &mut out,
        "&#128308;",
        "Top Pain Points - What Users Can't Find",
        Some(PAIN_POINTS_PAGE),
    );
    out.push_str(
        r#"                <p class="section-note">
                    These are real user searches that failed (excluding internal support team searches and article IDs)
                </p>
                <div id="pain-points-list">
"#,
    );
    let pain = if pp.top_user_queries.is_empty() {
        &pp.top_failed_queries
    } else {
        &pp.top_user_queries
    };
    list_items(&mut out, pain, PREVIEW_PAIN_POINTS, "pain-point", "times");
    out.push_str("                </div>\n            </div>\n");

    section_open(
        &mut out,
        "&#9989;",
        "Top Performing Content",
        Some(TOP_CONTENT_PAGE),
    );
    out.push_str("                <div id=\"top-content-list\">\n");
    list_items(
        &mut out,
        &tc.most_viewed,
        PREVIEW_TOP_CONTENT,
        "top-content",
        "views",
    );
    out.push_str("                </div>\n            </div>\n        </div>\n\n");

    out.push_str("        <div class=\"two-column-grid\">\n");
    section_open(&mut out, "&#128269;", "Common Failure Patterns", None);
    out.push_str("                <div class=\"pattern-grid\">\n");
    for (name, count) in pp.patterns.iter().filter_map(|p| parse_pattern(p)) {
        out.push_str(&format!(
            r#"
                    <div class="pattern-card">
                        <div class="pattern-name">{}</div>
                        <div class="pattern-count">{}</div>
                    </div>
"#,
            escape_html(&name),
            escape_html(&count)
        ));
    }
    out.push_str("                </div>\n            </div>\n");

    section_open(
        &mut out,
        "&#9888;&#65039;",
        "Low Performing Content - Consider Review",
        Some(LOW_CONTENT_PAGE),
    );
    out.push_str("                <div id=\"low-content-list\">\n");
    list_items(
        &mut out,
        &tc.least_viewed,
        PREVIEW_LOW_CONTENT,
        "low-content",
        "views",
    );
    out.push_str("                </div>\n            </div>\n        </div>\n\n");

    section_open(&mut out, "&#128161;", "Recommendations", None);
    for rec in recs {
        let class = rec.priority.css_class();
        out.push_str(&format!(
            r#"
                <div class="recommendation {class}">
                    <div class="rec-header">
                        <span class="priority-badge {class}">{priority}</span>
                        <span class="rec-title">{category}</span>
                    </div>
                    <div>{text}</div>
                    <div class="rec-action">&rarr; {action}</div>
                </div>
"#,
            class = class,
            priority = rec.priority,
            category = escape_html(&rec.category),
            text = escape_html(&rec.recommendation),
            action = escape_html(&rec.action),
        ));
    }
    out.push_str("            </div>\n");

    page_tail(&mut out);
    out
}

/// Renders one "View all" page listing every entry of `entries`.
pub fn render_detail_page(
    title: &str,
    generated: &str,
    entries: &Ranking,
    class: &str,
    unit: &str,
    back_href: &str,
) -> String {
    let mut out = String::new();
    page_head(&mut out, title);
    out.push_str(&format!(
        r#"        <a class="back-link" href="{}">&larr; Back to dashboard</a>
        <h1>{}</h1>
        <div class="subtitle">Generated on {} &middot; {} entries</div>
        <div class="section">
"#,
        escape_html(back_href),
        escape_html(title),
        escape_html(generated),
        entries.len()
    ));
    if entries.is_empty() {
        out.push_str("            <p class=\"section-note\">No data available.</p>\n");
    }
    list_items(&mut out, entries, entries.len(), class, unit);
    out.push_str("        </div>\n");
    page_tail(&mut out);
    out
}

/// Writes the dashboard and its detail pages. Returns the paths written,
/// dashboard first.
pub fn write_dashboard(report: &InsightsReport, output: &Path) -> Result<Vec<PathBuf>> {
    let generated = chrono::Local::now()
        .format("%B %d, %Y at %I:%M %p")
        .to_string();
    let dir = output.parent().unwrap_or_else(|| Path::new(""));
    let back = output
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let pp = &report.insights.pain_points;
    let tc = &report.insights.top_content;
    let pain = if pp.top_user_queries.is_empty() {
        &pp.top_failed_queries
    } else {
        &pp.top_user_queries
    };

    let pages = [
        (
            output.to_path_buf(),
            render_dashboard(report, &generated),
        ),
        (
            dir.join(PAIN_POINTS_PAGE),
            render_detail_page(
                "Failed Searches - All User Pain Points",
                &generated,
                pain,
                "pain-point",
                "times",
                &back,
            ),
        ),
        (
            dir.join(TOP_CONTENT_PAGE),
            render_detail_page(
                "Most Viewed Articles",
                &generated,
                &tc.most_viewed,
                "top-content",
                "views",
                &back,
            ),
        ),
        (
            dir.join(LOW_CONTENT_PAGE),
            render_detail_page(
                "Least Viewed Articles",
                &generated,
                &tc.least_viewed,
                "low-content",
                "views",
                &back,
            ),
        ),
    ];

    let mut written = Vec::with_capacity(pages.len());
    for (path, html) in pages {
        write_file(&path, &html)?;
        tracing::debug!("wrote {}", path.display());
        written.push(path);
    }
    tracing::info!("dashboard created: {}", output.display());
    Ok(written)
}
