use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use flowscan::dataflow::{
    generate_security_summary, Analyzer, DelegateAnalyzer, FlowAnalysis, GoAnalyzer,
};

#[derive(Parser, Debug)]
#[command(name = "flowscan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Security-focused data flow analysis")]
#[command(long_about = "Analyzes source code to detect:\n\
  - Untrusted data sources (HTTP inputs, env vars, files)\n\
  - Sensitive data sinks (database, exec, response)\n\
  - Unsanitized data flows between sources and sinks\n\
  - Nil/null safety issues")]
struct Args {
    /// Source files to analyze
    #[arg(required = true)]
    files: Vec<String>,

    /// Register a delegating analyzer, e.g. --delegate python=dataflow-py
    #[arg(long, value_name = "LANG=TOOL")]
    delegate: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "markdown")]
    format: Format,

    /// Write the report to this path instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging (to stderr)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Markdown,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting tracing subscriber")?;

    run(args)
}

fn run(args: Args) -> Result<()> {
    let mut analyzers: Vec<Box<dyn Analyzer>> = vec![Box::new(GoAnalyzer::new())];
    for spec in &args.delegate {
        let Some((language, tool)) = spec.split_once('=') else {
            bail!("invalid --delegate value '{spec}', expected LANG=TOOL");
        };
        if language.is_empty() || tool.is_empty() {
            bail!("invalid --delegate value '{spec}', expected LANG=TOOL");
        }
        analyzers.push(Box::new(DelegateAnalyzer::new(language, tool)));
    }

    info!(
        "analyzing {} files across {} languages",
        args.files.len(),
        analyzers.len()
    );

    let mut results: BTreeMap<String, FlowAnalysis> = BTreeMap::new();
    for analyzer in &analyzers {
        let language = analyzer.language().to_string();
        match analyzer.analyze(&args.files) {
            Ok(analysis) => {
                info!(
                    "{language}: {} sources, {} sinks, {} flows",
                    analysis.statistics.total_sources,
                    analysis.statistics.total_sinks,
                    analysis.statistics.total_flows
                );
                results.insert(language, analysis);
            }
            Err(err) => {
                warn!("analysis failed for {language}: {err:#}");
            }
        }
    }

    let rendered = match args.format {
        Format::Markdown => generate_security_summary(&results),
        Format::Json => {
            serde_json::to_string_pretty(&results).context("serializing results")? + "\n"
        }
    };

    match &args.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{rendered}"),
    }

    Ok(())
}
