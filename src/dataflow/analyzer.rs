//! Native scanning engine for Go sources.
//!
//! `GoAnalyzer` runs the full pipeline in-process: pattern scans for
//! sources and sinks, same-file flow tracking with sanitization detection,
//! and the two-pass nil-source detector. The scanner is line-oriented:
//! lines whose trimmed form starts with `//` or `/*` are skipped, and
//! multi-line block comment state is not tracked, so code inside a block
//! comment body can still match.
//!
//! All scan state is per-file locals; the analyzer itself holds only the
//! immutable pattern catalogs and can be shared freely.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::warn;

use super::patterns::{self, SinkPattern, SourcePattern};
use super::types::{
    Analyzer, Flow, FlowAnalysis, NilSource, RiskLevel, Sink, Source, Stats,
};

/// Files larger than this are skipped rather than scanned.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

lazy_static! {
    static ref ASSIGN_RE: Regex =
        Regex::new(r"(\w+)\s*(?:,\s*(?:err|ok|_))?\s*:?=").expect("assignment regex");
    static ref PLAIN_ASSIGN_RE: Regex = Regex::new(r"^\s*(\w+)\s*=").expect("assignment regex");
    static ref CALL_RE: Regex = Regex::new(r"(\w+(?:\.\w+)*)\s*\(").expect("call regex");
}

/// In-process analyzer for Go source files.
pub struct GoAnalyzer {
    source_patterns: Vec<SourcePattern>,
    sink_patterns: Vec<SinkPattern>,
    sanitizer_regex: Regex,
    nil_patterns: Vec<Regex>,
}

impl GoAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            source_patterns: patterns::source_patterns(),
            sink_patterns: patterns::sink_patterns(),
            sanitizer_regex: patterns::sanitizer_regex(),
            nil_patterns: patterns::nil_patterns(),
        }
    }

    fn detect_sources_in_file(&self, file_path: &str) -> Result<Vec<Source>> {
        let lines = read_file_lines(file_path)?;
        let mut sources = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            if is_comment_line(line) {
                continue;
            }

            for sp in &self.source_patterns {
                if let Some(m) = sp.pattern.find(line) {
                    sources.push(Source {
                        kind: sp.kind,
                        file: file_path.to_string(),
                        line: idx + 1,
                        column: m.start() + 1,
                        variable: extract_variable(line),
                        pattern: sp.description.to_string(),
                        context: line.trim().to_string(),
                    });
                }
            }
        }

        Ok(sources)
    }

    fn detect_sinks_in_file(&self, file_path: &str) -> Result<Vec<Sink>> {
        let lines = read_file_lines(file_path)?;
        let mut sinks = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            if is_comment_line(line) {
                continue;
            }

            for sp in &self.sink_patterns {
                if let Some(m) = sp.pattern.find(line) {
                    sinks.push(Sink {
                        kind: sp.kind,
                        file: file_path.to_string(),
                        line: idx + 1,
                        column: m.start() + 1,
                        function: extract_function_name(line),
                        pattern: sp.description.to_string(),
                        context: line.trim().to_string(),
                    });
                }
            }
        }

        Ok(sinks)
    }

    /// Decide whether `source` reaches `sink` and build the flow record.
    ///
    /// Flows are same-file and strictly forward. The sink line must mention
    /// the source variable or a recognized derivative of it.
    fn analyze_flow(&self, source: &Source, sink: &Sink, lines: &[String]) -> Option<Flow> {
        if source.variable.is_empty() {
            return None;
        }
        if source.line >= sink.line {
            return None;
        }

        if sink.line > 0 && sink.line <= lines.len() {
            let sink_line = &lines[sink.line - 1];
            if !contains_variable_or_derivative(sink_line, &source.variable) {
                return None;
            }
        }

        let path = build_flow_path(source, sink);
        let (sanitized, sanitizers) = self.check_sanitization(source.line, sink.line, lines);
        let risk = RiskLevel::classify(source.kind, sink.kind, sanitized);

        Some(Flow {
            id: flow_id(source, sink),
            source: source.clone(),
            sink: sink.clone(),
            path,
            sanitized,
            sanitizers,
            risk,
            description: describe_flow(source, sink, sanitized),
        })
    }

    /// Collect distinct sanitizer matches between source and sink.
    ///
    /// The scanned index range covers the lines after the source line up to
    /// and including the sink line.
    fn check_sanitization(
        &self,
        source_line: usize,
        sink_line: usize,
        lines: &[String],
    ) -> (bool, Vec<String>) {
        let mut sanitizers: Vec<String> = Vec::new();

        for line in lines.iter().take(sink_line).skip(source_line) {
            for m in self.sanitizer_regex.find_iter(line) {
                let name = m.as_str().to_string();
                if !sanitizers.contains(&name) {
                    sanitizers.push(name);
                }
            }
        }

        (!sanitizers.is_empty(), sanitizers)
    }

    fn detect_nil_sources_in_file(&self, file_path: &str) -> Result<Vec<NilSource>> {
        let lines = read_file_lines(file_path)?;

        struct Candidate {
            nil: NilSource,
            // Comma-ok bindings are checked at the binding site and never
            // reported at all.
            suppressed: bool,
            resolved: bool,
            guard_re: Option<Regex>,
            usage_re: Option<Regex>,
        }

        // Pass 1: candidate discovery, one per variable name, in line order.
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (idx, line) in lines.iter().enumerate() {
            if is_comment_line(line) {
                continue;
            }

            for pattern in &self.nil_patterns {
                let Some(caps) = pattern.captures(line) else {
                    continue;
                };
                let Some(var) = caps.get(1).map(|m| m.as_str()) else {
                    continue;
                };
                if var.is_empty() || var == "_" || seen.contains(var) {
                    continue;
                }
                seen.insert(var.to_string());

                let comma_ok = line.contains(", ok") || line.contains(", _");
                // Variable names are \w+, so these always compile; a failed
                // compile just leaves the candidate unresolvable.
                let guard_re = Regex::new(&format!(
                    r"if\s+{var}\s*[!=]=\s*nil|if\s+nil\s*[!=]=\s*{var}|{var}\s*!=\s*nil\s*\{{"
                ))
                .ok();
                let usage_re = Regex::new(&format!(r"{var}\.|\*{var}|{var}\[")).ok();

                candidates.push(Candidate {
                    nil: NilSource {
                        file: file_path.to_string(),
                        line: idx + 1,
                        variable: var.to_string(),
                        origin: determine_nil_origin(line).to_string(),
                        is_checked: comma_ok,
                        check_line: None,
                        usage_line: None,
                        risk: RiskLevel::Medium,
                    },
                    suppressed: comma_ok,
                    resolved: comma_ok,
                    guard_re,
                    usage_re,
                });
            }
        }

        // Pass 2: guard/usage scan. The first resolving event after the
        // binding site is final: a guard marks the candidate checked, an
        // unguarded use escalates to High, and a later guard does not
        // downgrade an already-observed unguarded use.
        for (idx, line) in lines.iter().enumerate() {
            let line_number = idx + 1;

            for cand in candidates.iter_mut() {
                if cand.resolved || line_number <= cand.nil.line {
                    continue;
                }

                if let Some(guard) = &cand.guard_re {
                    if guard.is_match(line) {
                        cand.nil.is_checked = true;
                        cand.nil.check_line = Some(line_number);
                        cand.resolved = true;
                        continue;
                    }
                }

                if let Some(usage) = &cand.usage_re {
                    if usage.is_match(line) {
                        cand.nil.usage_line = Some(line_number);
                        cand.nil.risk = RiskLevel::High;
                        cand.resolved = true;
                    }
                }
            }
        }

        Ok(candidates
            .into_iter()
            .filter(|c| !c.suppressed)
            .map(|c| c.nil)
            .collect())
    }
}

impl Default for GoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for GoAnalyzer {
    fn language(&self) -> &str {
        "go"
    }

    fn detect_sources(&self, files: &[String]) -> Result<Vec<Source>> {
        let mut sources = Vec::new();
        for file_path in files.iter().filter(|f| is_go_file(f)) {
            match self.detect_sources_in_file(file_path) {
                Ok(found) => sources.extend(found),
                Err(err) => warn!("skipping {file_path}: {err:#}"),
            }
        }
        Ok(sources)
    }

    fn detect_sinks(&self, files: &[String]) -> Result<Vec<Sink>> {
        let mut sinks = Vec::new();
        for file_path in files.iter().filter(|f| is_go_file(f)) {
            match self.detect_sinks_in_file(file_path) {
                Ok(found) => sinks.extend(found),
                Err(err) => warn!("skipping {file_path}: {err:#}"),
            }
        }
        Ok(sinks)
    }

    fn track_flows(
        &self,
        sources: &[Source],
        sinks: &[Sink],
        files: &[String],
    ) -> Result<Vec<Flow>> {
        let mut flows = Vec::new();

        for file_path in files.iter().filter(|f| is_go_file(f)) {
            let lines = match read_file_lines(file_path) {
                Ok(lines) => lines,
                Err(err) => {
                    warn!("skipping {file_path}: {err:#}");
                    continue;
                }
            };

            for source in sources.iter().filter(|s| &s.file == file_path) {
                for sink in sinks.iter().filter(|s| &s.file == file_path) {
                    if let Some(flow) = self.analyze_flow(source, sink, &lines) {
                        flows.push(flow);
                    }
                }
            }
        }

        Ok(flows)
    }

    fn detect_nil_sources(&self, files: &[String]) -> Result<Vec<NilSource>> {
        let mut nil_sources = Vec::new();
        for file_path in files.iter().filter(|f| is_go_file(f)) {
            match self.detect_nil_sources_in_file(file_path) {
                Ok(found) => nil_sources.extend(found),
                Err(err) => warn!("skipping {file_path}: {err:#}"),
            }
        }
        Ok(nil_sources)
    }

    fn analyze(&self, files: &[String]) -> Result<FlowAnalysis> {
        let sources = self.detect_sources(files).context("detecting sources")?;
        let sinks = self.detect_sinks(files).context("detecting sinks")?;
        let flows = self
            .track_flows(&sources, &sinks, files)
            .context("tracking flows")?;
        let nil_sources = self
            .detect_nil_sources(files)
            .context("detecting nil sources")?;

        let statistics = Stats::compute(&sources, &sinks, &flows, &nil_sources);

        Ok(FlowAnalysis {
            language: self.language().to_string(),
            sources,
            sinks,
            flows,
            nil_sources,
            statistics,
        })
    }
}

/// True for Go source files, excluding test files.
#[must_use]
pub fn is_go_file(path: &str) -> bool {
    path.ends_with(".go") && !path.ends_with("_test.go")
}

fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//") || trimmed.starts_with("/*")
}

fn read_file_lines(path: &str) -> Result<Vec<String>> {
    let meta = fs::metadata(path).with_context(|| format!("stat {path}"))?;
    if meta.len() > MAX_FILE_SIZE {
        bail!("file too large: {} bytes (max {MAX_FILE_SIZE})", meta.len());
    }

    let content = fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    Ok(content.lines().map(str::to_string).collect())
}

/// Extract the variable bound on an assignment line, if any.
fn extract_variable(line: &str) -> String {
    for re in [&*ASSIGN_RE, &*PLAIN_ASSIGN_RE] {
        if let Some(caps) = re.captures(line) {
            if let Some(name) = caps.get(1).map(|m| m.as_str()) {
                if !matches!(name, "if" | "for" | "switch" | "_") {
                    return name.to_string();
                }
            }
        }
    }
    String::new()
}

/// Extract the (possibly dotted) callee from a call expression line.
fn extract_function_name(line: &str) -> String {
    CALL_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Content-derived flow identifier, stable across runs.
fn flow_id(source: &Source, sink: &Sink) -> String {
    let data = format!(
        "{}:{}:{}:{}",
        source.file, source.line, sink.file, sink.line
    );
    let digest = Sha256::digest(data.as_bytes());
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("flow_{hex}")
}

fn describe_flow(source: &Source, sink: &Sink, sanitized: bool) -> String {
    let mut desc = format!("Data from {} ({})", source.kind.as_str(), source.pattern);
    if !source.variable.is_empty() {
        desc.push_str(&format!(" in variable '{}'", source.variable));
    }
    desc.push_str(&format!(" flows to {} ({})", sink.kind.as_str(), sink.pattern));
    if sanitized {
        desc.push_str(" [sanitized]");
    } else {
        desc.push_str(" [unsanitized - potential vulnerability]");
    }
    desc
}

fn build_flow_path(source: &Source, sink: &Sink) -> Vec<String> {
    let mut path = Vec::with_capacity(3);

    path.push(format!(
        "{}:{} - Source: {}",
        base_name(&source.file),
        source.line,
        source.pattern
    ));
    if source.line + 1 < sink.line {
        path.push(format!("... {} lines ...", sink.line - source.line - 1));
    }
    path.push(format!(
        "{}:{} - Sink: {}",
        base_name(&sink.file),
        sink.line,
        sink.pattern
    ));

    path
}

fn base_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// True when the line mentions the variable or a common derivative of it.
fn contains_variable_or_derivative(line: &str, var_name: &str) -> bool {
    if line.contains(var_name) {
        return true;
    }

    let derivatives = [
        format!("{var_name}."),
        format!("{var_name}["),
        format!("*{var_name}"),
        format!("&{var_name}"),
        format!("{var_name}Str"),
        format!("{var_name}String"),
        format!("{var_name}Bytes"),
    ];
    derivatives.iter().any(|d| line.contains(d.as_str()))
}

/// Categorize the construct that may produce a nil value.
fn determine_nil_origin(line: &str) -> &'static str {
    if line.contains('[') {
        "map_lookup"
    } else if line.contains(".(") {
        "type_assertion"
    } else if line.contains("Query") {
        "database_query"
    } else if line.contains("Unmarshal") {
        "json_unmarshal"
    } else if line.contains("Find") || line.contains("Get") || line.contains("Lookup") {
        "lookup_operation"
    } else if line.contains("Value(") {
        "context_value"
    } else if line.contains("<-") {
        "channel_receive"
    } else {
        "unknown"
    }
}
