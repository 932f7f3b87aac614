//! Data flow analysis for security review.
//!
//! This module discovers taint flows: paths along which data from an
//! untrusted source (HTTP input, environment variables, files, databases,
//! external calls) reaches a sensitive sink (command execution, database
//! queries, HTTP responses, logs, file writes, templates, redirects)
//! without intervening sanitization. It also flags variables that may be
//! nil and are dereferenced without a guard.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (sources, sinks, flows, nil sources, stats)
//!   and the [`Analyzer`] trait
//! - [`patterns`] - Pattern catalogs for sources, sinks, sanitizers, and
//!   nil-producing expressions
//! - [`analyzer`] - The native in-process engine for Go sources
//! - [`delegate`] - Analyzer that shells out to an external worker for
//!   other languages
//! - [`report`] - Markdown report generation over per-language results
//!
//! # Usage
//!
//! The main entry point is [`analyze_go_files`], or [`GoAnalyzer`] /
//! [`DelegateAnalyzer`] through the [`Analyzer`] trait for control over
//! individual phases.

pub mod analyzer;
pub mod delegate;
pub mod patterns;
pub mod report;
pub mod types;

pub use analyzer::GoAnalyzer;
pub use delegate::DelegateAnalyzer;
pub use report::generate_security_summary;
pub use types::{
    Analyzer, Flow, FlowAnalysis, NilSource, RiskLevel, Sink, SinkKind, Source, SourceKind, Stats,
};

/// Run the complete native analysis pipeline over the given Go files.
pub fn analyze_go_files(files: &[String]) -> anyhow::Result<FlowAnalysis> {
    GoAnalyzer::new().analyze(files)
}
