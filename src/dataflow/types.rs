//! Data flow analysis types and data structures.
//!
//! This module contains the core types shared by every analyzer:
//! - Source, sink, and risk categories
//! - Source/sink occurrence records and flows between them
//! - Nil-source records and per-language analysis results
//! - The [`Analyzer`] trait implemented by native and delegating analyzers

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Categories of untrusted data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// HTTP request body
    HttpBody,
    /// HTTP query or form parameters
    HttpQuery,
    /// HTTP header values
    HttpHeader,
    /// HTTP path parameters
    HttpPath,
    /// Environment variables
    EnvVar,
    /// File content reads
    FileRead,
    /// Database query results
    Database,
    /// Interactive console input
    UserInput,
    /// External API responses
    ExternalApi,
}

impl SourceKind {
    /// Wire name as used in JSON output and flow descriptions.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::HttpBody => "http_body",
            SourceKind::HttpQuery => "http_query",
            SourceKind::HttpHeader => "http_header",
            SourceKind::HttpPath => "http_path",
            SourceKind::EnvVar => "env_var",
            SourceKind::FileRead => "file_read",
            SourceKind::Database => "database",
            SourceKind::UserInput => "user_input",
            SourceKind::ExternalApi => "external_api",
        }
    }

    /// True for categories an external user directly controls.
    #[must_use]
    pub fn is_user_controlled(&self) -> bool {
        matches!(
            self,
            SourceKind::HttpBody
                | SourceKind::HttpQuery
                | SourceKind::HttpHeader
                | SourceKind::HttpPath
                | SourceKind::UserInput
        )
    }
}

/// Categories of sensitive data sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// SQL/NoSQL statement execution
    Database,
    /// OS command execution
    CommandExec,
    /// HTTP response output
    HttpResponse,
    /// Log output
    Logging,
    /// File system writes
    FileWrite,
    /// Template rendering
    Template,
    /// HTTP redirects
    Redirect,
}

impl SinkKind {
    /// Wire name as used in JSON output and flow descriptions.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Database => "database",
            SinkKind::CommandExec => "command_exec",
            SinkKind::HttpResponse => "http_response",
            SinkKind::Logging => "logging",
            SinkKind::FileWrite => "file_write",
            SinkKind::Template => "template",
            SinkKind::Redirect => "redirect",
        }
    }
}

/// Severity of a detected flow or nil risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl RiskLevel {
    /// Wire name as used in JSON output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "critical",
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
            RiskLevel::Info => "info",
        }
    }

    /// Capitalized display name for reports.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "Critical",
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
            RiskLevel::Info => "Info",
        }
    }

    /// Sort priority for reports: lower sorts first.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            RiskLevel::Critical => 0,
            RiskLevel::High => 1,
            RiskLevel::Medium => 2,
            RiskLevel::Low => 3,
            RiskLevel::Info => 4,
        }
    }

    /// Classify the risk of a flow from its source and sink categories.
    ///
    /// The rules are evaluated in order and the first match wins; this
    /// ordering is part of the contract and must not be rearranged:
    ///
    /// 1. Sanitized flows are always `Low`.
    /// 2. User-controlled input into command execution or the database is
    ///    `Critical` (command/SQL injection).
    /// 3. User-controlled input into responses, templates, or redirects is
    ///    `High` (XSS, open redirect).
    /// 4. Environment variables into the database or command execution is
    ///    `Medium`.
    /// 5. File content into command execution or the database is `Medium`.
    /// 6. Anything into a file write is `Medium`.
    /// 7. Anything into logging is `Low`.
    /// 8. Everything else is `Info`.
    #[must_use]
    pub fn classify(source: SourceKind, sink: SinkKind, sanitized: bool) -> RiskLevel {
        if sanitized {
            return RiskLevel::Low;
        }

        if source.is_user_controlled()
            && matches!(sink, SinkKind::CommandExec | SinkKind::Database)
        {
            return RiskLevel::Critical;
        }

        if source.is_user_controlled()
            && matches!(
                sink,
                SinkKind::HttpResponse | SinkKind::Template | SinkKind::Redirect
            )
        {
            return RiskLevel::High;
        }

        if source == SourceKind::EnvVar
            && matches!(sink, SinkKind::Database | SinkKind::CommandExec)
        {
            return RiskLevel::Medium;
        }

        if source == SourceKind::FileRead
            && matches!(sink, SinkKind::CommandExec | SinkKind::Database)
        {
            return RiskLevel::Medium;
        }

        if sink == SinkKind::FileWrite {
            return RiskLevel::Medium;
        }

        if sink == SinkKind::Logging {
            return RiskLevel::Low;
        }

        RiskLevel::Info
    }
}

/// One occurrence of untrusted data entering the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Source category
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// File path
    pub file: String,
    /// 1-based line number
    pub line: usize,
    /// 1-based column of the first pattern match
    #[serde(default)]
    pub column: usize,
    /// Variable bound on this line, empty when none could be extracted
    #[serde(default)]
    pub variable: String,
    /// Human-readable description of the matched pattern
    pub pattern: String,
    /// Trimmed source line
    #[serde(default)]
    pub context: String,
}

/// One occurrence of data leaving into a sensitive operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sink {
    /// Sink category
    #[serde(rename = "type")]
    pub kind: SinkKind,
    /// File path
    pub file: String,
    /// 1-based line number
    pub line: usize,
    /// 1-based column of the first pattern match
    #[serde(default)]
    pub column: usize,
    /// Called function, empty when none could be extracted
    #[serde(default)]
    pub function: String,
    /// Human-readable description of the matched pattern
    pub pattern: String,
    /// Trimmed source line
    #[serde(default)]
    pub context: String,
}

/// A candidate data path from a source to a sink within one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    /// Content-derived identifier, stable across runs; never used for ordering
    pub id: String,
    pub source: Source,
    pub sink: Sink,
    /// Descriptive steps from source to sink
    pub path: Vec<String>,
    /// True when a recognized sanitizer appears between source and sink
    pub sanitized: bool,
    /// Distinct sanitizer matches, empty when unsanitized
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sanitizers: Vec<String>,
    pub risk: RiskLevel,
    pub description: String,
}

/// A binding that may hold a nil value and its guard status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NilSource {
    pub file: String,
    /// 1-based line of the binding site
    pub line: usize,
    pub variable: String,
    /// Category of the nil-producing construct (map_lookup, type_assertion, ...)
    pub origin: String,
    pub is_checked: bool,
    /// Line of the nil guard, when one was observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_line: Option<usize>,
    /// Line of the first unguarded use, when one was observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_line: Option<usize>,
    pub risk: RiskLevel,
}

/// Complete analysis results for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowAnalysis {
    pub language: String,
    pub sources: Vec<Source>,
    pub sinks: Vec<Sink>,
    pub flows: Vec<Flow>,
    pub nil_sources: Vec<NilSource>,
    pub statistics: Stats,
}

impl FlowAnalysis {
    /// An empty but valid analysis for the given language.
    #[must_use]
    pub fn empty(language: &str) -> Self {
        Self {
            language: language.to_string(),
            sources: Vec::new(),
            sinks: Vec::new(),
            flows: Vec::new(),
            nil_sources: Vec::new(),
            statistics: Stats::default(),
        }
    }
}

/// Summary statistics, always derived from the result lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_sources: usize,
    pub total_sinks: usize,
    pub total_flows: usize,
    pub unsanitized_flows: usize,
    pub critical_flows: usize,
    pub high_risk_flows: usize,
    pub nil_risks: usize,
    pub unchecked_nil_risks: usize,
}

impl Stats {
    /// Fold the result lists into summary counters.
    ///
    /// Stats are recomputed from the lists, never accumulated alongside
    /// them, so `total_flows == flows.len()` holds by construction.
    #[must_use]
    pub fn compute(
        sources: &[Source],
        sinks: &[Sink],
        flows: &[Flow],
        nil_sources: &[NilSource],
    ) -> Stats {
        let mut stats = Stats {
            total_sources: sources.len(),
            total_sinks: sinks.len(),
            total_flows: flows.len(),
            nil_risks: nil_sources.len(),
            ..Stats::default()
        };

        for flow in flows {
            if !flow.sanitized {
                stats.unsanitized_flows += 1;
            }
            match flow.risk {
                RiskLevel::Critical => stats.critical_flows += 1,
                RiskLevel::High => stats.high_risk_flows += 1,
                _ => {}
            }
        }

        for ns in nil_sources {
            if !ns.is_checked {
                stats.unchecked_nil_risks += 1;
            }
        }

        stats
    }
}

/// Capability interface implemented by every language analyzer.
///
/// Callers depend only on this trait, never on whether the analysis runs
/// in-process or is delegated to an external worker.
pub trait Analyzer {
    /// Target language identifier (e.g. "go", "python").
    fn language(&self) -> &str;

    /// Scan files for untrusted data sources.
    fn detect_sources(&self, files: &[String]) -> Result<Vec<Source>>;

    /// Scan files for sensitive data sinks.
    fn detect_sinks(&self, files: &[String]) -> Result<Vec<Sink>>;

    /// Trace data paths from sources to sinks.
    fn track_flows(&self, sources: &[Source], sinks: &[Sink], files: &[String])
        -> Result<Vec<Flow>>;

    /// Identify bindings that may be nil and are not guarded.
    fn detect_nil_sources(&self, files: &[String]) -> Result<Vec<NilSource>>;

    /// Run the complete analysis pipeline over the given files.
    fn analyze(&self, files: &[String]) -> Result<FlowAnalysis>;
}
