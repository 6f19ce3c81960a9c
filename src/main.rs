//! # KB Insights CLI (`kbi`)
//!
//! ## Usage
//!
//! ```bash
//! kbi --config ./config/kbi.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbi analyze` | Analyze the exports, write the JSON and text reports |
//! | `kbi dashboard` | Render the HTML dashboard from the JSON report |
//! | `kbi track` | Write the month-over-month failed-search CSV |
//! | `kbi serve` | Start the chat assistant server |
//!
//! ## Examples
//!
//! ```bash
//! # Analyze a data directory other than the configured one
//! kbi analyze --data-dir "/srv/exports/eGain KB Data"
//!
//! # Dashboard from a report produced elsewhere
//! kbi dashboard --input ./out/kb_insights_report.json --output ./site/index.html
//!
//! # Verbose logging
//! kbi --verbose track
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kb_insights::analyzer::KbAnalyzer;
use kb_insights::config::{self, Config};
use kb_insights::format::format_number;
use kb_insights::{dashboard, logging, report, server, tracker};

/// KB Insights: knowledge-base usage analytics.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file at the default path means built-in defaults.
#[derive(Parser)]
#[command(
    name = "kbi",
    about = "Knowledge-base usage analytics from spreadsheet exports",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kbi.toml")]
    config: PathBuf,

    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the KB exports.
    ///
    /// Prints pain points, top content, and recommendations, then writes
    /// the JSON report and the text executive summary.
    Analyze {
        /// Overrides `[data].root`.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Render the HTML dashboard and its detail pages from the JSON report.
    Dashboard {
        /// Defaults to the configured JSON report path.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Defaults to the configured dashboard path.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Track failed searches month over month.
    Track {
        /// Overrides `[data].root`.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Defaults to the configured tracker CSV path.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Start the chat assistant server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Analyze { data_dir } => {
            if let Some(dir) = data_dir {
                cfg.data.root = dir;
            }
            run_analyze(&cfg)?;
        }
        Commands::Dashboard { input, output } => {
            let input = input.unwrap_or_else(|| cfg.output.insights_json_path());
            let output = output.unwrap_or_else(|| cfg.output.dashboard_html_path());
            let report = report::read_insights_json(&input)?;
            let written = dashboard::write_dashboard(&report, &output)?;
            println!("Dashboard created: {}", output.display());
            for page in written.iter().skip(1) {
                println!("  detail page: {}", page.display());
            }
        }
        Commands::Track { data_dir, output } => {
            if let Some(dir) = data_dir {
                cfg.data.root = dir;
            }
            let output = output.unwrap_or_else(|| cfg.output.tracker_csv_path());
            run_track(&cfg, &output)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn run_analyze(cfg: &Config) -> Result<()> {
    let rule = "=".repeat(70);
    println!("{}", rule);
    println!("KNOWLEDGE BASE USAGE ANALYSIS");
    println!("{}", rule);

    if !cfg.data.root.is_dir() {
        tracing::warn!("data directory {} does not exist", cfg.data.root.display());
    }

    let mut analyzer = KbAnalyzer::new(cfg.data.clone());
    analyzer.load_all()?;
    let data = analyzer.datasets();
    println!();
    println!("Loaded:");
    println!("  Scorecards:           {}", data.scorecards.len());
    println!("  Article summaries:    {}", data.article_summaries.len());
    println!("  Failed searches:      {}", data.failed_searches.len());
    println!("  Search effectiveness: {}", data.search_effectiveness.len());
    if data.skipped_files > 0 {
        println!("  Skipped (unreadable): {}", data.skipped_files);
    }

    let insights = analyzer.generate_insights();
    report::print_insights(&insights);

    let json_path = cfg.output.insights_json_path();
    let summary_path = cfg.output.summary_txt_path();
    report::write_summary(&insights, &summary_path)?;
    let full = report::build_report(insights);
    report::write_insights_json(&full, &json_path)?;

    println!();
    println!("{}", rule);
    println!("Analysis complete!");
    println!("  Insights: {}", json_path.display());
    println!("  Summary:  {}", summary_path.display());
    println!(
        "  Failed searches analyzed: {}",
        format_number(full.insights.pain_points.total_failed_searches)
    );
    println!("{}", rule);
    Ok(())
}

fn run_track(cfg: &Config, output: &std::path::Path) -> Result<()> {
    let rule = "=".repeat(70);
    println!("{}", rule);
    println!("KNOWLEDGE BASE IMPROVEMENT TRACKER");
    println!("{}", rule);
    println!();
    println!("Analyzing monthly trends...");
    println!();

    let months = tracker::track_monthly(&cfg.data.failed_searches_path(), cfg.data.header_skip_rows)?;
    if months.is_empty() {
        tracker::print_summary(&months);
        return Ok(());
    }

    tracker::write_csv(&months, output)?;
    println!();
    println!("Improvement tracker saved to: {}", output.display());
    tracker::print_summary(&months);

    if let Some(trend) = tracker::TrendReport::from_months(&months) {
        tracker::print_trend(&trend);
    }
    Ok(())
}
