//! # KB Insights
//!
//! Usage analytics for a knowledge base exported as monthly spreadsheets.
//!
//! KB Insights reads failed-search, article-view, scorecard, and
//! search-effectiveness exports, ranks what users could not find and what
//! they read most, and turns that into a JSON report, an executive summary,
//! a static HTML dashboard, and a month-over-month tracker. A small HTTP
//! server fronts a chat assistant backed by Gemini.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌────────────┐   ┌──────────────┐
//! │  Discovery  │──▶│  Workbook  │──▶│   Analyzer    │
//! │ year dirs   │   │ xlsx→Table │   │ pain/content │
//! └─────────────┘   └────────────┘   └──────┬───────┘
//!                                           │
//!                  ┌────────────────────────┼──────────────┐
//!                  ▼                        ▼              ▼
//!            ┌──────────┐           ┌────────────┐   ┌──────────┐
//!            │  Report  │──JSON────▶│ Dashboard  │   │ Tracker  │
//!            │ JSON/TXT │           │   HTML     │   │   CSV    │
//!            └──────────┘           └────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kbi analyze                   # JSON + text reports
//! kbi dashboard                 # HTML dashboard from the JSON
//! kbi track                     # month-over-month CSV
//! kbi serve                     # chat assistant on :5000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`discovery`] | Locating export files and dating them |
//! | [`workbook`] | Reading `.xlsx` sheets into tables |
//! | [`table`] | Header + rows of typed cells |
//! | [`analyzer`] | Pain points, top content, recommendations |
//! | [`models`] | Report data types |
//! | [`report`] | JSON and text report writers |
//! | [`dashboard`] | Static HTML dashboard |
//! | [`tracker`] | Month-over-month failed-search tracker |
//! | [`chat`] | Chat model trait and Gemini client |
//! | [`server`] | Chat HTTP server |

pub mod analyzer;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod discovery;
pub mod format;
pub mod logging;
pub mod models;
pub mod report;
pub mod server;
pub mod table;
pub mod tracker;
pub mod workbook;
