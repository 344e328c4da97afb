use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spvexec::asm::{self, ModuleVersion};
use spvexec::{ExecutionContext, Harness, HarnessConfig, RunReport, Verdict};
use spvexec_cli::{CaseFilter, Manifest};

#[derive(Debug, Parser)]
#[command(name = "spvexec")]
#[command(about = "Run SPIR-V assembly conformance cases on a wgpu device")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every case in a JSON manifest.
    Run {
        /// Manifest path. Relative `source` paths resolve against its directory.
        #[arg(long)]
        manifest: PathBuf,

        /// Write a JSON run report to this path.
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,

        /// Only run cases whose name contains one of these terms (comma separated). Merged with
        /// `SPVEXEC_FILTER`.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Assemble one file into a SPIR-V binary.
    Assemble {
        input: PathBuf,

        /// Module version written to the header.
        #[arg(long, default_value = "1.0")]
        version: ModuleVersion,

        /// Output path (defaults to the input with a `.spv` extension).
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Print the capabilities of the selected device.
    Caps,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            manifest,
            report,
            filter,
        } => {
            let failed = run(&manifest, report.as_deref(), filter.as_deref())?;
            if failed {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Assemble {
            input,
            version,
            output,
        } => assemble(&input, version, output),
        Commands::Caps => caps(),
    }
}

fn open_context() -> Result<Arc<ExecutionContext>> {
    let context = ExecutionContext::new_blocking(HarnessConfig::from_env())
        .context("create execution context")?;
    Ok(Arc::new(context))
}

/// Returns whether any case failed.
fn run(manifest_path: &Path, report_path: Option<&Path>, filter: Option<&str>) -> Result<bool> {
    let mut case_filter = CaseFilter::parse(filter.unwrap_or_default());
    if let Ok(env_filter) = std::env::var("SPVEXEC_FILTER") {
        case_filter = case_filter.merge(CaseFilter::parse(&env_filter));
    }

    let manifest = Manifest::load(manifest_path)?;
    let base_dir = manifest_path.parent().unwrap_or(Path::new("."));
    let specs = manifest.to_specs(base_dir, &case_filter)?;
    if specs.is_empty() {
        eprintln!("no cases selected");
    }

    let context = open_context()?;
    let mut report = RunReport::for_adapter(context.adapter_info());
    let harness = Harness::with_context(Arc::clone(&context));

    for spec in &specs {
        let outcome = harness.run_detailed(spec);
        let tag = match &outcome.verdict {
            Verdict::Pass => "PASS",
            Verdict::Fail(_) => "FAIL",
            Verdict::QualityWarning(_) => "WARN",
            Verdict::Skipped(_) => "SKIP",
        };
        match outcome.verdict.message() {
            Some(message) => println!("{tag} {}: {message}", outcome.name),
            None => println!("{tag} {}", outcome.name),
        }
        for line in &outcome.diagnostics {
            println!("    {line}");
        }
        report.record(&outcome);
    }

    let stats = harness.assembler().stats();
    tracing::debug!(
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.entries,
        "assembly cache"
    );

    report.print_summary();
    if let Some(path) = report_path {
        report
            .write_json(path)
            .with_context(|| format!("write report {}", path.display()))?;
    }
    Ok(report.has_failures())
}

fn assemble(input: &Path, version: ModuleVersion, output: Option<PathBuf>) -> Result<()> {
    let source =
        fs::read_to_string(input).with_context(|| format!("read {}", input.display()))?;
    let module = asm::assemble(&source, version)
        .with_context(|| format!("assemble {}", input.display()))?;

    let output = output.unwrap_or_else(|| input.with_extension("spv"));
    fs::write(&output, module.to_bytes())
        .with_context(|| format!("write {}", output.display()))?;

    println!(
        "{}: {} words, bound {}, SPIR-V {}",
        output.display(),
        module.words().len(),
        module.bound(),
        module.version()
    );
    for entry in module.entry_points() {
        println!("  entry point {:?}", entry.name);
    }
    Ok(())
}

fn caps() -> Result<()> {
    let context = open_context()?;
    let info = context.adapter_info();
    let caps = context.caps();

    println!("adapter: {} ({:?}, {:?})", info.name, info.backend, info.device_type);
    let features: Vec<&str> = caps.features.iter_names().map(|(name, _)| name).collect();
    println!("features: {}", features.join(", "));
    println!(
        "extensions: {}",
        caps.extensions.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    println!("max SPIR-V version: {}", caps.max_module_version);
    println!("max bind groups: {}", caps.max_bind_groups);
    println!("max push constant size: {}", caps.max_push_constant_size);
    Ok(())
}
