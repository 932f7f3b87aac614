//! Delegating analyzer backed by an external worker process.
//!
//! The worker owns the language-specific analysis and speaks a one-shot
//! protocol: it is invoked as `<tool> <language> <file>...` and must print
//! a single JSON `FlowAnalysis` document on stdout. The worker performs
//! integrated analysis only, so the per-operation trait methods re-run the
//! batch and project the requested list.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

use super::types::{Analyzer, Flow, FlowAnalysis, NilSource, Sink, Source};

/// Analyzer that shells out to an external analysis tool.
pub struct DelegateAnalyzer {
    language: String,
    tool: String,
}

impl DelegateAnalyzer {
    #[must_use]
    pub fn new(language: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            tool: tool.into(),
        }
    }

    /// Keep only files whose extension belongs to this analyzer's language.
    fn filter_files<'a>(&self, files: &'a [String]) -> Vec<&'a String> {
        files
            .iter()
            .filter(|file| {
                let ext = Path::new(file.as_str())
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_lowercase)
                    .unwrap_or_default();
                match self.language.as_str() {
                    "python" => ext == "py",
                    "typescript" => matches!(ext.as_str(), "ts" | "tsx" | "js" | "jsx"),
                    other => ext == other,
                }
            })
            .collect()
    }

    /// Run the worker over the filtered file set and parse its output.
    ///
    /// An empty filtered set short-circuits to an empty valid analysis
    /// without spawning anything.
    fn run_tool(&self, files: &[String]) -> Result<FlowAnalysis> {
        let filtered = self.filter_files(files);
        if filtered.is_empty() {
            return Ok(FlowAnalysis::empty(&self.language));
        }

        debug!(
            "delegating {} files to {} for {}",
            filtered.len(),
            self.tool,
            self.language
        );

        let output = Command::new(&self.tool)
            .arg(&self.language)
            .args(filtered)
            .output()
            .with_context(|| format!("running {}", self.tool))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                bail!("{} exited with {}", self.tool, output.status);
            }
            bail!("{} exited with {}: {stderr}", self.tool, output.status);
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parsing {} output", self.tool))
    }
}

impl Analyzer for DelegateAnalyzer {
    fn language(&self) -> &str {
        &self.language
    }

    fn detect_sources(&self, files: &[String]) -> Result<Vec<Source>> {
        let analysis = self.run_tool(files).context("detecting sources")?;
        Ok(analysis.sources)
    }

    fn detect_sinks(&self, files: &[String]) -> Result<Vec<Sink>> {
        let analysis = self.run_tool(files).context("detecting sinks")?;
        Ok(analysis.sinks)
    }

    // The worker determines sources and sinks itself, so the passed lists
    // are not forwarded.
    fn track_flows(
        &self,
        _sources: &[Source],
        _sinks: &[Sink],
        files: &[String],
    ) -> Result<Vec<Flow>> {
        let analysis = self.run_tool(files).context("tracking flows")?;
        Ok(analysis.flows)
    }

    fn detect_nil_sources(&self, files: &[String]) -> Result<Vec<NilSource>> {
        let analysis = self.run_tool(files).context("detecting nil sources")?;
        Ok(analysis.nil_sources)
    }

    fn analyze(&self, files: &[String]) -> Result<FlowAnalysis> {
        self.run_tool(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_files_python() {
        let analyzer = DelegateAnalyzer::new("python", "dataflow-py");
        let files = vec![
            "app/main.py".to_string(),
            "app/util.PY".to_string(),
            "app/main.go".to_string(),
            "README.md".to_string(),
        ];
        let filtered = analyzer.filter_files(&files);
        assert_eq!(filtered, vec!["app/main.py", "app/util.PY"]);
    }

    #[test]
    fn test_filter_files_typescript_covers_js() {
        let analyzer = DelegateAnalyzer::new("typescript", "dataflow-ts");
        let files = vec![
            "web/app.ts".to_string(),
            "web/view.tsx".to_string(),
            "web/legacy.js".to_string(),
            "web/widget.jsx".to_string(),
            "web/style.css".to_string(),
        ];
        assert_eq!(analyzer.filter_files(&files).len(), 4);
    }

    #[test]
    fn test_filter_files_unknown_language_uses_extension() {
        let analyzer = DelegateAnalyzer::new("rb", "dataflow-rb");
        let files = vec!["job.rb".to_string(), "job.py".to_string()];
        assert_eq!(analyzer.filter_files(&files), vec!["job.rb"]);
    }

    #[test]
    fn test_no_matching_files_returns_empty_analysis() {
        // The tool does not exist; it must not be spawned for an empty set.
        let analyzer = DelegateAnalyzer::new("python", "/nonexistent/tool");
        let files = vec!["main.go".to_string()];
        let analysis = analyzer.analyze(&files).unwrap();
        assert_eq!(analysis.language, "python");
        assert!(analysis.sources.is_empty());
        assert!(analysis.flows.is_empty());
    }

    #[test]
    fn test_missing_tool_is_an_error() {
        let analyzer = DelegateAnalyzer::new("python", "/nonexistent/tool");
        let files = vec!["main.py".to_string()];
        assert!(analyzer.analyze(&files).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_worker_round_trip() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script_path = dir.path().join("worker.sh");
        let payload = serde_json::json!({
            "language": "python",
            "sources": [{
                "type": "http_query",
                "file": "app.py",
                "line": 3,
                "column": 1,
                "variable": "user_id",
                "pattern": "Flask request args",
                "context": "user_id = request.args.get('id')"
            }],
            "sinks": [],
            "flows": [],
            "nil_sources": [],
            "statistics": {
                "total_sources": 1,
                "total_sinks": 0,
                "total_flows": 0,
                "unsanitized_flows": 0,
                "critical_flows": 0,
                "high_risk_flows": 0,
                "nil_risks": 0,
                "unchecked_nil_risks": 0
            }
        });
        let payload_path = dir.path().join("payload.json");
        std::fs::write(&payload_path, payload.to_string()).unwrap();
        let mut script = std::fs::File::create(&script_path).unwrap();
        writeln!(script, "#!/bin/sh").unwrap();
        writeln!(script, "cat {}", payload_path.display()).unwrap();
        drop(script);
        std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let analyzer =
            DelegateAnalyzer::new("python", script_path.to_string_lossy().into_owned());
        let files = vec!["app.py".to_string()];
        let analysis = analyzer.analyze(&files).unwrap();
        assert_eq!(analysis.language, "python");
        assert_eq!(analysis.sources.len(), 1);
        assert_eq!(analysis.sources[0].variable, "user_id");
        assert_eq!(analysis.statistics.total_sources, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_worker_failure_carries_stderr() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script_path = dir.path().join("worker.sh");
        let mut script = std::fs::File::create(&script_path).unwrap();
        writeln!(script, "#!/bin/sh").unwrap();
        writeln!(script, "echo 'parse failure in app.py' >&2").unwrap();
        writeln!(script, "exit 3").unwrap();
        drop(script);
        std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let analyzer =
            DelegateAnalyzer::new("python", script_path.to_string_lossy().into_owned());
        let files = vec!["app.py".to_string()];
        let err = analyzer.analyze(&files).unwrap_err();
        assert!(format!("{err:#}").contains("parse failure in app.py"));
    }
}
