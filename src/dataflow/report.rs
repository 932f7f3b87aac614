//! Markdown report generation over per-language analysis results.
//!
//! All analyzer-derived text (paths, variable names, code context) is
//! untrusted and passes through markdown escaping before it lands in the
//! report, so a hostile source file cannot inject markup or break out of
//! fenced code blocks.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};

use super::types::{Flow, FlowAnalysis, NilSource, RiskLevel, SinkKind, Stats};

/// Escape inline markdown metacharacters in analyzer-derived text.
fn escape_markdown_inline(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '`' | '*' | '_' | '[' | ']' | '(' | ')' | '#' | '|' => {
                out.push('\\');
                out.push(ch);
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Break triple-backtick runs so embedded code cannot close a fenced block.
fn escape_markdown_code_block(s: &str) -> String {
    s.replace("```", "` ` `")
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Context-specific remediation advice for a flow, keyed by its sink.
fn recommendation(flow: &Flow) -> &'static str {
    match flow.sink.kind {
        SinkKind::CommandExec => "Remove command execution or use strict allow list",
        SinkKind::Database => "Use parameterized queries or prepared statements",
        SinkKind::HttpResponse => "Escape output using html.EscapeString()",
        SinkKind::Template => "Ensure template engine auto-escapes",
        SinkKind::Redirect => "Validate redirect URLs against allow list",
        SinkKind::FileWrite => "Validate file paths and use filepath.Clean()",
        SinkKind::Logging => "Sanitize log output to prevent log injection",
    }
}

/// Render the complete security summary for a set of per-language results.
///
/// Output is deterministic for a given input: languages render in map
/// order and flows sort stably by risk priority, so ties keep their
/// encounter order.
#[must_use]
pub fn generate_security_summary(analyses: &BTreeMap<String, FlowAnalysis>) -> String {
    let mut out = String::new();

    let mut total = Stats::default();
    let mut all_flows: Vec<&Flow> = Vec::new();
    let mut all_nil_sources: Vec<&NilSource> = Vec::new();

    for analysis in analyses.values() {
        total.total_sources += analysis.statistics.total_sources;
        total.total_sinks += analysis.statistics.total_sinks;
        total.total_flows += analysis.statistics.total_flows;
        total.unsanitized_flows += analysis.statistics.unsanitized_flows;
        total.critical_flows += analysis.statistics.critical_flows;
        total.high_risk_flows += analysis.statistics.high_risk_flows;
        total.nil_risks += analysis.statistics.nil_risks;
        total.unchecked_nil_risks += analysis.statistics.unchecked_nil_risks;
        all_flows.extend(analysis.flows.iter());
        all_nil_sources.extend(analysis.nil_sources.iter());
    }

    all_flows.sort_by_key(|flow| flow.risk.priority());

    out.push_str("# Security Data Flow Analysis\n\n");
    out.push_str(&format!(
        "**Generated:** {}\n\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    ));

    out.push_str("## Executive Summary\n\n");
    out.push_str("| Metric | Value |\n");
    out.push_str("|--------|-------|\n");
    out.push_str(&format!("| Languages Analyzed | {} |\n", analyses.len()));
    out.push_str(&format!("| Total Sources | {} |\n", total.total_sources));
    out.push_str(&format!("| Total Sinks | {} |\n", total.total_sinks));
    out.push_str(&format!("| Total Flows | {} |\n", total.total_flows));
    out.push_str(&format!("| Unsanitized Flows | {} |\n", total.unsanitized_flows));
    out.push_str(&format!("| Critical Risk Flows | {} |\n", total.critical_flows));
    out.push_str(&format!("| High Risk Flows | {} |\n", total.high_risk_flows));
    out.push_str(&format!("| Nil/Null Risks | {} |\n", total.nil_risks));
    out.push('\n');

    out.push_str("## Risk Assessment\n\n");

    if total.critical_flows > 0 {
        out.push_str(&format!(
            "### :rotating_light: CRITICAL ({} issues)\n\n",
            total.critical_flows
        ));
        out.push_str("Critical security vulnerabilities detected that require immediate attention.\n\n");
    }
    if total.high_risk_flows > 0 {
        out.push_str(&format!("### :warning: HIGH ({} issues)\n\n", total.high_risk_flows));
        out.push_str("High-risk security issues that should be addressed promptly.\n\n");
    }
    if total.unchecked_nil_risks > 0 {
        out.push_str(&format!(
            "### :exclamation: NIL SAFETY ({} issues)\n\n",
            total.unchecked_nil_risks
        ));
        out.push_str("Unchecked nil/null values that may cause runtime panics or crashes.\n\n");
    }
    if total.critical_flows == 0 && total.high_risk_flows == 0 && total.unchecked_nil_risks == 0 {
        out.push_str("No critical, high-risk, or unchecked nil safety issues detected.\n\n");
    }

    if total.critical_flows > 0 || total.high_risk_flows > 0 {
        out.push_str("## Critical & High Risk Flows\n\n");

        let mut flow_num = 0;
        for flow in &all_flows {
            if !matches!(flow.risk, RiskLevel::Critical | RiskLevel::High) {
                continue;
            }
            flow_num += 1;

            let icon = if flow.risk == RiskLevel::Critical {
                ":rotating_light:"
            } else {
                ":warning:"
            };

            out.push_str(&format!(
                "### {icon} Flow {flow_num}: {}\n\n",
                escape_markdown_inline(&flow.description)
            ));
            out.push_str(&format!("**Risk Level:** {}\n\n", flow.risk.display_name()));
            out.push_str(&format!(
                "**Source:** `{}:{}` (Type: {})\n\n",
                escape_markdown_inline(&flow.source.file),
                flow.source.line,
                escape_markdown_inline(flow.source.kind.as_str())
            ));
            out.push_str(&format!(
                "**Sink:** `{}:{}` (Function: {})\n\n",
                escape_markdown_inline(&flow.sink.file),
                flow.sink.line,
                escape_markdown_inline(&flow.sink.function)
            ));

            if flow.sanitized {
                out.push_str(&format!(
                    "**Sanitized:** Yes (Sanitizers: {})\n\n",
                    escape_markdown_inline(&flow.sanitizers.join(", "))
                ));
            } else {
                out.push_str("**Sanitized:** No\n\n");
            }

            if !flow.source.context.is_empty() {
                out.push_str("**Source Context:**\n```\n");
                out.push_str(&escape_markdown_code_block(&flow.source.context));
                out.push_str("\n```\n\n");
            }
            if !flow.sink.context.is_empty() {
                out.push_str("**Sink Context:**\n```\n");
                out.push_str(&escape_markdown_code_block(&flow.sink.context));
                out.push_str("\n```\n\n");
            }

            out.push_str(&format!("**Recommendation:** {}\n\n", recommendation(flow)));
            out.push_str("---\n\n");
        }
    }

    if !all_nil_sources.is_empty() {
        out.push_str("## Nil/Null Safety Issues\n\n");
        out.push_str("| File | Line | Variable | Origin | Checked | Risk |\n");
        out.push_str("|------|------|----------|--------|---------|------|\n");
        for ns in &all_nil_sources {
            let checked = if ns.is_checked { "Yes" } else { "No" };
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                escape_markdown_inline(&ns.file),
                ns.line,
                escape_markdown_inline(&ns.variable),
                escape_markdown_inline(&ns.origin),
                checked,
                ns.risk.display_name()
            ));
        }
        out.push('\n');
    }

    if !analyses.is_empty() {
        out.push_str("## Language Breakdown\n\n");
        for (language, analysis) in analyses {
            out.push_str(&format!("### {}\n\n", capitalize_first(language)));
            out.push_str("| Metric | Value |\n");
            out.push_str("|--------|-------|\n");
            out.push_str(&format!("| Sources | {} |\n", analysis.statistics.total_sources));
            out.push_str(&format!("| Sinks | {} |\n", analysis.statistics.total_sinks));
            out.push_str(&format!("| Flows | {} |\n", analysis.statistics.total_flows));
            out.push_str(&format!(
                "| Unsanitized | {} |\n",
                analysis.statistics.unsanitized_flows
            ));
            out.push_str(&format!("| Critical | {} |\n", analysis.statistics.critical_flows));
            out.push_str(&format!("| High | {} |\n", analysis.statistics.high_risk_flows));
            out.push_str(&format!("| Nil Risks | {} |\n", analysis.statistics.nil_risks));
            out.push('\n');
        }
    }

    out.push_str("## General Recommendations\n\n");
    out.push_str("1. **Input Validation**: Always validate and sanitize user input at the entry point.\n");
    out.push_str("2. **Parameterized Queries**: Use prepared statements or parameterized queries for all database operations.\n");
    out.push_str("3. **Output Encoding**: Encode output appropriately for the context (HTML, URL, JavaScript).\n");
    out.push_str("4. **Nil Checks**: Always check for nil/null before dereferencing pointers or optional values.\n");
    out.push_str("5. **Principle of Least Privilege**: Avoid command execution; if required, use strict allow lists.\n");
    out.push_str("6. **Security Testing**: Integrate security scanning into CI/CD pipelines for continuous monitoring.\n");

    out
}
