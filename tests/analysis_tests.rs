use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;

use flowscan::dataflow::{
    generate_security_summary, Analyzer, FlowAnalysis, GoAnalyzer, RiskLevel,
};

fn write_fixture(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

fn analyze(dir: &TempDir, name: &str, content: &str) -> Result<FlowAnalysis> {
    let file = write_fixture(dir, name, content);
    GoAnalyzer::new().analyze(&[file])
}

#[test]
fn query_parameter_into_sql_exec_is_critical() -> Result<()> {
    let dir = TempDir::new()?;
    let analysis = analyze(
        &dir,
        "handler.go",
        r#"package main

func handler(w http.ResponseWriter, r *http.Request) {
	query := r.URL.Query()
	id := query.Get("id")
	rows := loadRows()
	db.Exec("SELECT * WHERE id=" + id)
	_ = rows
}
"#,
    )?;

    let critical: Vec<_> = analysis
        .flows
        .iter()
        .filter(|f| f.risk == RiskLevel::Critical)
        .collect();
    assert!(!critical.is_empty());
    let flow = critical
        .iter()
        .find(|f| f.source.variable == "id")
        .expect("flow from the query parameter");
    assert!(!flow.sanitized);
    assert!(flow.sanitizers.is_empty());
    assert!(flow.id.starts_with("flow_"));
    Ok(())
}

#[test]
fn sanitizer_between_source_and_sink_yields_low_risk() -> Result<()> {
    let dir = TempDir::new()?;
    let analysis = analyze(
        &dir,
        "handler.go",
        r#"package main

func handler(w http.ResponseWriter, r *http.Request) {
	query := r.URL.Query()
	id := query.Get("id")
	idNum, err := strconv.Atoi(id)
	db.Exec("SELECT * WHERE id=" + id)
	_ = idNum
	_ = err
}
"#,
    )?;

    let flow = analysis
        .flows
        .iter()
        .find(|f| f.source.variable == "id")
        .expect("flow from the query parameter");
    assert!(flow.sanitized);
    assert_eq!(flow.risk, RiskLevel::Low);
    assert!(flow.sanitizers.iter().any(|s| s.contains("strconv.Atoi")));
    Ok(())
}

#[test]
fn unguarded_unused_map_lookup_is_medium() -> Result<()> {
    let dir = TempDir::new()?;
    let analysis = analyze(
        &dir,
        "cache.go",
        "package main\n\nfunc f(m map[string]*Entry) {\n\tval := m[\"key\"]\n\t_ = val\n}\n",
    )?;

    assert_eq!(analysis.nil_sources.len(), 1);
    let ns = &analysis.nil_sources[0];
    assert_eq!(ns.variable, "val");
    assert!(!ns.is_checked);
    assert!(ns.usage_line.is_none());
    assert_eq!(ns.risk, RiskLevel::Medium);
    assert_eq!(analysis.statistics.unchecked_nil_risks, 1);
    Ok(())
}

#[test]
fn guarded_map_lookup_is_excluded_from_unguarded_view() -> Result<()> {
    let dir = TempDir::new()?;
    let analysis = analyze(
        &dir,
        "cache.go",
        r#"package main

func f(m map[string]*Entry) string {
	val := m["key"]
	if val != nil {
		return val.Name
	}
	return ""
}
"#,
    )?;

    assert_eq!(analysis.nil_sources.len(), 1);
    let ns = &analysis.nil_sources[0];
    assert!(ns.is_checked);
    assert_eq!(ns.check_line, Some(5));
    assert_eq!(analysis.statistics.unchecked_nil_risks, 0);

    let mut results = BTreeMap::new();
    results.insert("go".to_string(), analysis);
    let report = generate_security_summary(&results);
    assert!(!report.contains("NIL SAFETY"));
    Ok(())
}

#[test]
fn dereference_before_guard_is_high() -> Result<()> {
    let dir = TempDir::new()?;
    let analysis = analyze(
        &dir,
        "cache.go",
        r#"package main

func f(m map[string]*Entry) string {
	val := m["key"]
	return val.Field
}
"#,
    )?;

    assert_eq!(analysis.nil_sources.len(), 1);
    let ns = &analysis.nil_sources[0];
    assert!(!ns.is_checked);
    assert_eq!(ns.usage_line, Some(5));
    assert_eq!(ns.risk, RiskLevel::High);
    Ok(())
}

#[test]
fn comma_ok_lookup_never_appears_in_results() -> Result<()> {
    let dir = TempDir::new()?;
    let analysis = analyze(
        &dir,
        "cache.go",
        r#"package main

func f(m map[string]*Entry) string {
	val, ok := m["key"]
	if !ok {
		return ""
	}
	return val.Name
}
"#,
    )?;

    assert!(analysis.nil_sources.is_empty());
    assert_eq!(analysis.statistics.nil_risks, 0);
    Ok(())
}

#[test]
fn clean_batch_report_states_no_issues() -> Result<()> {
    let dir = TempDir::new()?;
    let analysis = analyze(
        &dir,
        "worker.go",
        "package main\n\nfunc run() {\n\tmsg := \"hello\"\n\tlog.Println(msg)\n}\n",
    )?;
    assert_eq!(analysis.statistics.critical_flows, 0);
    assert_eq!(analysis.statistics.high_risk_flows, 0);
    assert_eq!(analysis.statistics.unchecked_nil_risks, 0);

    let mut results = BTreeMap::new();
    results.insert("go".to_string(), analysis);
    let report = generate_security_summary(&results);
    assert!(report.contains("No critical, high-risk, or unchecked nil safety issues detected."));
    assert!(!report.contains("## Critical & High Risk Flows"));
    Ok(())
}

#[test]
fn analysis_is_deterministic_across_runs() -> Result<()> {
    let dir = TempDir::new()?;
    let file = write_fixture(
        &dir,
        "handler.go",
        r#"package main

func handler(w http.ResponseWriter, r *http.Request) {
	id := r.URL.Query().Get("id")
	name := r.FormValue("name")
	token := r.Header.Get("X-Token")
	db.Exec("UPDATE users SET name='" + name + "' WHERE id=" + id)
	w.Write([]byte(token))
	log.Printf("updated %s %s", id, name)
}
"#,
    );
    let files = vec![file];
    let analyzer = GoAnalyzer::new();

    let first = analyzer.analyze(&files)?;
    let second = analyzer.analyze(&files)?;

    let ids: Vec<_> = first.flows.iter().map(|f| f.id.as_str()).collect();
    let ids2: Vec<_> = second.flows.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, ids2);
    let risks: Vec<_> = first.flows.iter().map(|f| f.risk).collect();
    let risks2: Vec<_> = second.flows.iter().map(|f| f.risk).collect();
    assert_eq!(risks, risks2);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn flows_are_forward_only_and_same_file() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_fixture(
        &dir,
        "input.go",
        r#"package main

func read(r *http.Request) string {
	db.Exec("SELECT 1 WHERE x=" + id)
	id := r.URL.Query().Get("id")
	return id
}
"#,
    );
    let store = write_fixture(
        &dir,
        "store.go",
        "package main\n\nfunc store(id string) {\n\tdb.Exec(\"INSERT INTO t VALUES (\" + id + \")\")\n}\n",
    );
    let files = vec![input, store];
    let analysis = GoAnalyzer::new().analyze(&files)?;

    for flow in &analysis.flows {
        assert!(flow.source.line < flow.sink.line);
        assert_eq!(flow.source.file, flow.sink.file);
    }
    Ok(())
}

#[test]
fn stats_are_always_derived_from_the_lists() -> Result<()> {
    let dir = TempDir::new()?;
    let analysis = analyze(
        &dir,
        "handler.go",
        r#"package main

func handler(w http.ResponseWriter, r *http.Request) {
	id := r.URL.Query().Get("id")
	cmd := r.FormValue("cmd")
	exec.Command("sh", "-c", cmd)
	w.Write([]byte(id))
	entry := cache[id]
	log.Println(entry.Name)
}
"#,
    )?;

    let stats = &analysis.statistics;
    assert_eq!(stats.total_sources, analysis.sources.len());
    assert_eq!(stats.total_sinks, analysis.sinks.len());
    assert_eq!(stats.total_flows, analysis.flows.len());
    assert_eq!(stats.nil_risks, analysis.nil_sources.len());
    assert_eq!(
        stats.critical_flows,
        analysis
            .flows
            .iter()
            .filter(|f| f.risk == RiskLevel::Critical)
            .count()
    );
    assert_eq!(
        stats.unsanitized_flows,
        analysis.flows.iter().filter(|f| !f.sanitized).count()
    );
    assert_eq!(
        stats.unchecked_nil_risks,
        analysis.nil_sources.iter().filter(|n| !n.is_checked).count()
    );
    Ok(())
}

#[test]
fn test_files_are_ignored() -> Result<()> {
    let dir = TempDir::new()?;
    let test_file = write_fixture(
        &dir,
        "handler_test.go",
        "package main\n\nfunc testHelper(r *http.Request) {\n\tid := r.URL.Query().Get(\"id\")\n\tdb.Exec(\"x\" + id)\n}\n",
    );
    let analysis = GoAnalyzer::new().analyze(&[test_file])?;
    assert!(analysis.sources.is_empty());
    assert!(analysis.sinks.is_empty());
    assert!(analysis.flows.is_empty());
    Ok(())
}

#[cfg(unix)]
#[test]
fn delegate_results_join_the_native_report() -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    use flowscan::dataflow::DelegateAnalyzer;

    let dir = TempDir::new()?;
    let go_file = write_fixture(
        &dir,
        "handler.go",
        "package main\n\nfunc run() {\n\tmsg := \"ok\"\n\tlog.Println(msg)\n}\n",
    );
    let py_file = write_fixture(&dir, "app.py", "user_id = request.args.get('id')\n");

    let payload = serde_json::json!({
        "language": "python",
        "sources": [],
        "sinks": [],
        "flows": [],
        "nil_sources": [{
            "file": "app.py",
            "line": 1,
            "variable": "user_id",
            "origin": "lookup_operation",
            "is_checked": false,
            "usage_line": 2,
            "risk": "high"
        }],
        "statistics": {
            "total_sources": 0,
            "total_sinks": 0,
            "total_flows": 0,
            "unsanitized_flows": 0,
            "critical_flows": 0,
            "high_risk_flows": 0,
            "nil_risks": 1,
            "unchecked_nil_risks": 1
        }
    });
    let payload_path = dir.path().join("payload.json");
    fs::write(&payload_path, payload.to_string())?;
    let worker_path = dir.path().join("worker.sh");
    let mut worker = fs::File::create(&worker_path)?;
    writeln!(worker, "#!/bin/sh")?;
    writeln!(worker, "cat {}", payload_path.display())?;
    drop(worker);
    fs::set_permissions(&worker_path, fs::Permissions::from_mode(0o755))?;

    let files = vec![go_file, py_file];
    let mut results = BTreeMap::new();

    let native = GoAnalyzer::new();
    results.insert(native.language().to_string(), native.analyze(&files)?);

    let delegate = DelegateAnalyzer::new(
        "python",
        worker_path.to_string_lossy().into_owned(),
    );
    results.insert(delegate.language().to_string(), delegate.analyze(&files)?);

    let report = generate_security_summary(&results);
    assert!(report.contains("| Languages Analyzed | 2 |"));
    assert!(report.contains(":exclamation: NIL SAFETY (1 issues)"));
    assert!(report.contains("| app.py | 1 | user\\_id | lookup\\_operation | No | High |"));
    assert!(report.contains("### Go"));
    assert!(report.contains("### Python"));
    Ok(())
}

#[test]
fn missing_files_do_not_abort_the_batch() -> Result<()> {
    let dir = TempDir::new()?;
    let ok = write_fixture(
        &dir,
        "handler.go",
        "package main\n\nfunc f(r *http.Request) {\n\tid := r.URL.Query().Get(\"id\")\n\t_ = id\n}\n",
    );
    let missing = dir
        .path()
        .join("does_not_exist.go")
        .to_string_lossy()
        .into_owned();

    let analysis = GoAnalyzer::new().analyze(&[missing, ok])?;
    assert_eq!(analysis.sources.len(), 1);
    assert!(Path::new(&analysis.sources[0].file).ends_with("handler.go"));
    Ok(())
}
