//! KB usage analysis.
//!
//! [`KbAnalyzer`] loads four datasets from the export tree (scorecards,
//! article summaries, failed searches, search effectiveness) and derives
//! [`Insights`] from them. Column positions differ between export
//! versions, so every column is located by keyword on the header row.
//!
//! Unreadable files are logged and skipped; they never abort a run.

use anyhow::Result;
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::DataConfig;
use crate::discovery::{failed_search_files, find_files, period_from_path};
use crate::models::{
    bottom, ranked, tally_add, tally_total, top, Insights, PainPoints, Priority, Recommendation,
    SearchEffectiveness, SheetOverview, Summary, Tally, TopContent,
};
use crate::table::{is_numeric_id, Table};
use crate::workbook::read_table;

const SEARCH_TERM_KEYWORDS: [&str; 4] = ["search", "query", "phrase", "term"];
const FAILURE_COUNT_KEYWORDS: [&str; 5] = ["failed", "count", "frequency", "number", "total"];
const PORTAL_KEYWORDS: [&str; 1] = ["portal"];
const TITLE_KEYWORDS: [&str; 5] = ["article name", "article", "title", "name", "subject"];
const VIEW_KEYWORDS: [&str; 4] = ["article view", "view", "count", "hit"];

/// Portals whose searches come from support staff rather than end users.
const INTERNAL_PORTAL_MARKERS: [&str; 2] = ["internal", "dbi"];

const TOP_QUERIES: usize = 100;
const MOST_VIEWED: usize = 30;
const LEAST_VIEWED: usize = 20;
const OVERVIEW_COLUMNS: usize = 5;

/// Failure topics and the keywords that place a search term in them.
const TOPICS: [(&str, &[&str]); 6] = [
    ("password", &["password", "pw", "login", "forgot password"]),
    ("benefits", &["benefit", "insurance", "health", "dental", "vision"]),
    ("payroll", &["payroll", "pay", "salary", "wage", "paycheck"]),
    ("time_off", &["pto", "vacation", "time off", "leave", "absence"]),
    ("forms", &["form", "template", "document"]),
    ("technical", &["error", "issue", "not working", "how to"]),
];

/// A table together with the file it came from.
#[derive(Debug, Clone)]
pub struct DatedTable {
    pub file: PathBuf,
    /// `YYYY-MM` or `unknown`, see [`period_from_path`].
    pub period: String,
    pub table: Table,
}

/// Everything loaded from the export tree.
#[derive(Debug, Default)]
pub struct Datasets {
    pub scorecards: Vec<DatedTable>,
    pub article_summaries: Vec<DatedTable>,
    pub failed_searches: Vec<DatedTable>,
    pub search_effectiveness: Vec<DatedTable>,
    pub skipped_files: usize,
}

pub struct KbAnalyzer {
    config: DataConfig,
    data: Datasets,
}

impl KbAnalyzer {
    pub fn new(config: DataConfig) -> Self {
        Self {
            config,
            data: Datasets::default(),
        }
    }

    pub fn datasets(&self) -> &Datasets {
        &self.data
    }

    /// Loads all four datasets.
    pub fn load_all(&mut self) -> Result<()> {
        self.load_scorecards()?;
        self.load_article_summaries()?;
        self.load_failed_searches()?;
        self.load_search_effectiveness()?;
        Ok(())
    }

    pub fn load_scorecards(&mut self) -> Result<usize> {
        let files = find_files(&self.config.root, &self.config.years, &["*scorecard*.xlsx"])?;
        let tables = self.read_all(&files, |this, file| this.read(file, 0));
        tracing::info!("found {} scorecard files", tables.len());
        self.data.scorecards = tables;
        Ok(self.data.scorecards.len())
    }

    /// Article summaries come in two layouts: a plain header row, or a
    /// banner block above the header. The second shows up as an
    /// `Unnamed` first column and is re-read past the banner.
    pub fn load_article_summaries(&mut self) -> Result<usize> {
        let files = find_files(
            &self.config.root,
            &self.config.years,
            &["*Article*Summary*.xlsx", "*Article*Summary*.xlsm"],
        )?;
        let skip = self.config.header_skip_rows;
        let tables = self.read_all(&files, |this, file| {
            let table = this.read(file, 0)?;
            let banner = !table.is_empty()
                && table
                    .columns
                    .first()
                    .map(|c| c.contains("Unnamed"))
                    .unwrap_or(false);
            if banner {
                tracing::debug!("{}: header below banner, re-reading", file.display());
                this.read(file, skip)
            } else {
                Some(table)
            }
        });
        tracing::info!("found {} article summary files", tables.len());
        self.data.article_summaries = tables;
        Ok(self.data.article_summaries.len())
    }

    pub fn load_failed_searches(&mut self) -> Result<usize> {
        let files = failed_search_files(&self.config.failed_searches_path())?;
        let skip = self.config.header_skip_rows;
        let tables = self.read_all(&files, |this, file| this.read(file, skip));
        tracing::info!("found {} failed search files", tables.len());
        self.data.failed_searches = tables;
        Ok(self.data.failed_searches.len())
    }

    pub fn load_search_effectiveness(&mut self) -> Result<usize> {
        let files = find_files(
            &self.config.root,
            &self.config.years,
            &["*Search*Effectiveness*.xlsx"],
        )?;
        let tables = self.read_all(&files, |this, file| this.read(file, 0));
        tracing::info!("found {} search effectiveness files", tables.len());
        self.data.search_effectiveness = tables;
        Ok(self.data.search_effectiveness.len())
    }

    fn read_all<F>(&mut self, files: &[PathBuf], mut read: F) -> Vec<DatedTable>
    where
        F: FnMut(&mut Self, &Path) -> Option<Table>,
    {
        let mut out = Vec::new();
        for file in files {
            if let Some(table) = read(self, file.as_path()) {
                if table.is_empty() {
                    tracing::debug!("{}: no data rows", file.display());
                    continue;
                }
                out.push(DatedTable {
                    file: file.clone(),
                    period: period_from_path(file, &self.config.years),
                    table,
                });
            }
        }
        out
    }

    fn read(&mut self, file: &Path, skip_rows: usize) -> Option<Table> {
        match read_table(file, skip_rows) {
            Ok(table) => Some(table),
            Err(e) => {
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| file.display().to_string());
                tracing::warn!("could not read {}: {}", name, e);
                self.data.skipped_files += 1;
                None
            }
        }
    }

    /// Derives insights from whatever has been loaded.
    pub fn generate_insights(&self) -> Insights {
        let d = &self.data;
        let failed: Vec<&Table> = d.failed_searches.iter().map(|t| &t.table).collect();
        let articles: Vec<&Table> = d.article_summaries.iter().map(|t| &t.table).collect();

        Insights {
            summary: Summary {
                scorecard_files: d.scorecards.len(),
                article_summary_files: d.article_summaries.len(),
                failed_search_files: d.failed_searches.len(),
                search_effectiveness_files: d.search_effectiveness.len(),
                skipped_files: d.skipped_files,
            },
            pain_points: if failed.is_empty() {
                PainPoints::default()
            } else {
                analyze_pain_points(&failed)
            },
            top_content: if articles.is_empty() {
                TopContent::default()
            } else {
                analyze_top_content(&articles)
            },
            search_effectiveness: overview(&d.search_effectiveness),
            recommendations: recommendations(!failed.is_empty(), !articles.is_empty()),
        }
    }
}

/// One row of a failed-search export after cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedSearch {
    /// Lowercased, trimmed search text.
    pub term: String,
    pub count: u64,
    pub portal: String,
    pub is_numeric: bool,
}

impl FailedSearch {
    /// Internal searches come from staff portals or are article-ID lookups.
    pub fn is_internal(&self) -> bool {
        let portal = self.portal.to_lowercase();
        self.is_numeric || INTERNAL_PORTAL_MARKERS.iter().any(|m| portal.contains(m))
    }
}

/// Extracts failed searches from one export. Returns nothing when no
/// search-term column can be found.
///
/// The count is the integer part of the count cell; a missing count column,
/// blank cell or unparsable value counts as one failure.
pub fn failed_searches_in(table: &Table) -> Vec<FailedSearch> {
    let search_col = match table.find_column(&SEARCH_TERM_KEYWORDS) {
        Some(c) => c,
        None => return Vec::new(),
    };
    let count_col = table.find_column(&FAILURE_COUNT_KEYWORDS);
    let portal_col = table.find_column(&PORTAL_KEYWORDS);

    let mut out = Vec::new();
    for row in 0..table.rows.len() {
        let term_cell = table.cell(row, search_col);
        if term_cell.is_empty() {
            continue;
        }
        let term = term_cell.to_string().trim().to_string();

        let portal = portal_col
            .map(|c| table.cell(row, c))
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string().trim().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let count = match count_col.map(|c| table.cell(row, c)) {
            Some(cell) if !cell.is_empty() => cell.as_count().unwrap_or(1),
            _ => 1,
        };

        if term.is_empty() || count <= 0 {
            continue;
        }
        out.push(FailedSearch {
            is_numeric: is_numeric_id(&term),
            term: term.to_lowercase(),
            count: count as u64,
            portal,
        });
    }
    out
}

/// Aggregates failed searches across exports.
pub fn analyze_pain_points(tables: &[&Table]) -> PainPoints {
    let mut all = Tally::new();
    let mut user = Tally::new();
    let mut internal = Tally::new();
    let mut portals = Tally::new();

    for table in tables {
        for item in failed_searches_in(table) {
            tally_add(&mut all, &item.term, item.count);
            tally_add(&mut portals, &item.portal, item.count);
            if item.is_internal() {
                tally_add(&mut internal, &item.term, item.count);
            } else {
                tally_add(&mut user, &item.term, item.count);
            }
        }
    }

    let all_ranked = ranked(&all);
    let user_ranked = ranked(&user);
    let internal_ranked = ranked(&internal);
    let patterns: Vec<String> = search_patterns(&user_ranked)
        .iter()
        .map(|p| p.to_string())
        .collect();

    PainPoints {
        total_failed_searches: tally_total(&all),
        unique_failed_queries: all.len(),
        unique_user_queries: Some(user.len()),
        top_failed_queries: top(&all_ranked, TOP_QUERIES),
        top_user_queries: top(&user_ranked, TOP_QUERIES),
        top_internal_queries: top(&internal_ranked, TOP_QUERIES),
        by_portal: portals,
        user_patterns: patterns.clone(),
        patterns,
    }
}

/// Failed searches attributed to one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCount {
    pub topic: &'static str,
    pub count: u64,
}

impl fmt::Display for TopicCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} failed searches",
            crate::format::title_case(self.topic),
            crate::format::format_number(self.count)
        )
    }
}

/// Groups terms into [`TOPICS`]. A term counts toward every topic with a
/// matching keyword. Topics without hits are omitted; the rest are sorted by
/// count, highest first, with ties in the order the topics were first hit.
pub fn search_patterns(terms: &[(String, u64)]) -> Vec<TopicCount> {
    let mut hits: IndexMap<&'static str, u64> = IndexMap::new();
    for (term, count) in terms {
        let term = term.to_lowercase();
        for (topic, keywords) in TOPICS.iter() {
            if keywords.iter().any(|k| term.contains(k)) {
                let slot = hits.entry(*topic).or_insert(0);
                *slot = slot.saturating_add(*count);
            }
        }
    }

    let mut counts: Vec<TopicCount> = hits
        .into_iter()
        .map(|(topic, count)| TopicCount { topic, count })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// Locates the title and view columns of an article export.
fn article_columns(table: &Table) -> Option<(usize, usize)> {
    if let (Some(t), Some(v)) = (table.column("Article Name"), table.column("Article Views")) {
        return Some((t, v));
    }
    Some((
        table.find_column(&TITLE_KEYWORDS)?,
        table.find_column(&VIEW_KEYWORDS)?,
    ))
}

/// `(title, views)` pairs from one article export. Rows with unparsable
/// views, zero views, numeric IDs for titles, or titles of three characters
/// or fewer are dropped.
pub fn article_views_in(table: &Table) -> Vec<(String, u64)> {
    let (title_col, view_col) = match article_columns(table) {
        Some(cols) => cols,
        None => return Vec::new(),
    };

    let mut out = Vec::new();
    for row in 0..table.rows.len() {
        let title_cell = table.cell(row, title_col);
        let view_cell = table.cell(row, view_col);
        if title_cell.is_empty() || view_cell.is_empty() {
            continue;
        }
        let views = match view_cell.as_count() {
            Some(v) => v,
            None => continue,
        };
        let title = title_cell.to_string().trim().to_string();
        if title.is_empty() || views <= 0 || is_numeric_id(&title) || title.chars().count() <= 3 {
            continue;
        }
        out.push((title, views as u64));
    }
    out
}

/// Aggregates article views by exact title.
pub fn analyze_top_content(tables: &[&Table]) -> TopContent {
    let mut views = Tally::new();
    for table in tables {
        for (title, n) in article_views_in(table) {
            tally_add(&mut views, &title, n);
        }
    }
    let ranking = ranked(&views);
    TopContent {
        most_viewed: top(&ranking, MOST_VIEWED),
        least_viewed: bottom(&ranking, LEAST_VIEWED),
        total_views: tally_total(&views),
    }
}

fn overview(tables: &[DatedTable]) -> SearchEffectiveness {
    SearchEffectiveness {
        files: tables
            .iter()
            .map(|t| SheetOverview {
                file: t
                    .file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                period: t.period.clone(),
                columns: t.table.columns.iter().take(OVERVIEW_COLUMNS).cloned().collect(),
            })
            .collect(),
    }
}

/// The recommendation catalogue, filtered by which datasets were present.
pub fn recommendations(has_failed_searches: bool, has_articles: bool) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    if has_failed_searches {
        recs.push(Recommendation::new(
            Priority::High,
            "Content Gaps",
            "Create articles for top failed search queries",
            "Review top 20 failed searches and create missing content",
        ));
    }

    if has_articles {
        recs.push(Recommendation::new(
            Priority::Medium,
            "Content Cleanup",
            "Archive or improve low-performing articles",
            "Review articles with <10 views and decide: update, merge, or remove",
        ));
        recs.push(Recommendation::new(
            Priority::High,
            "Content Promotion",
            "Optimize and feature top-performing content",
            "Ensure top 20 articles are easy to find and well-maintained",
        ));
    }

    recs.push(Recommendation::new(
        Priority::High,
        "Search Optimization",
        "Improve search synonyms and related terms",
        "Add synonyms for common failed searches to existing articles",
    ));
    recs.push(Recommendation::new(
        Priority::Medium,
        "User Experience",
        "Analyze user journey for pain points",
        "Track where users are getting stuck and simplify those flows",
    ));

    recs
}
