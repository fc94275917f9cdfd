mod cli;
mod error;
mod output;
mod probe;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;
use futures::{StreamExt, stream};
use mimalloc::MiMalloc;
use splice_engine::{Analyzer, ProjectConfig};
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::{Args, ClockMode};
use crate::error::{AppError, Result};
use crate::output::{BatchSummary, FileOutcome, report_path, write_report};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _guard = match init_logging(args.verbose, args.quiet, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    match run(args).await {
        Ok(summary) if summary.all_failed() => process::exit(1),
        Ok(_) => {}
        Err(e) => {
            error!("Application error: {}", e);
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<BatchSummary> {
    let config = ProjectConfig::load(&args.config)?;
    for finding in &config.findings {
        warn!(key = %finding.key, kind = ?finding.kind, "Configuration finding");
    }

    let mut analyzer = Analyzer::new(Arc::new(config));
    if !args.no_media {
        analyzer = analyzer
            .with_probe(Arc::new(probe::Ffprobe::default()))
            .with_media_info(Arc::new(probe::MediaInfoTool::default()));
    }
    if args.clock == ClockMode::Tsp {
        analyzer = analyzer.with_clock(Arc::new(probe::Tsp::default()));
    }

    let inputs = collect_inputs(&args.inputs)?;
    info!(
        files = inputs.len(),
        jobs = args.jobs,
        clock = %args.clock,
        media = !args.no_media,
        "Starting batch"
    );

    let output_dir = Arc::new(args.output_dir);
    let outcomes: Vec<FileOutcome> = stream::iter(inputs)
        .map(|input| {
            let analyzer = analyzer.clone();
            let output_dir = Arc::clone(&output_dir);
            async move {
                let task_input = input.clone();
                let joined = tokio::task::spawn_blocking(move || {
                    process_file(&analyzer, &task_input, &output_dir)
                })
                .await;
                match joined {
                    Ok(outcome) => outcome,
                    Err(e) => FileOutcome::failure(&input, AppError::from(e)),
                }
            }
        })
        .buffer_unordered(usize::from(args.jobs))
        .collect()
        .await;

    let summary = BatchSummary::new(outcomes);
    print!("{}", summary.render(args.json)?);
    Ok(summary)
}

fn process_file(analyzer: &Analyzer, input: &Path, output_dir: &Path) -> FileOutcome {
    let result = analyzer
        .analyze_path(input)
        .map_err(AppError::from)
        .and_then(|report| {
            let path = report_path(output_dir, input);
            write_report(&path, &report)?;
            Ok((path, report))
        });
    match result {
        Ok((path, report)) => {
            info!(input = %input.display(), report = %path.display(), "Report written");
            FileOutcome::success(input, &path, &report)
        }
        Err(e) => {
            error!(input = %input.display(), error = %e, "Analysis failed");
            FileOutcome::failure(input, e)
        }
    }
}

fn is_capture(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ts"))
}

/// Expand directories to the `.ts` files directly inside them.
fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs = BTreeSet::new();
    for path in paths {
        if path.is_dir() {
            for entry in std::fs::read_dir(path)? {
                let entry = entry?.path();
                if entry.is_file() && is_capture(&entry) {
                    inputs.insert(entry);
                }
            }
        } else {
            inputs.insert(path.clone());
        }
    }
    if inputs.is_empty() {
        return Err(AppError::InvalidInput("no .ts files found".to_string()));
    }
    Ok(inputs.into_iter().collect())
}

fn init_logging(verbose: bool, quiet: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| AppError::Logging(format!("invalid log file `{}`", path.display())))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collect_inputs_scans_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.ts"), b"").unwrap();
        fs::write(dir.path().join("a.TS"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        let explicit = dir.path().join("b.ts");

        let inputs = collect_inputs(&[dir.path().to_path_buf(), explicit]).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.TS", "b.ts"]);
    }

    #[test]
    fn test_empty_directory_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_inputs(&[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("noise.ts");
        fs::write(&input, vec![0u8; 2048]).unwrap();
        let analyzer = Analyzer::new(Arc::new(ProjectConfig::default()));
        let outcome = process_file(&analyzer, &input, dir.path());
        assert_eq!(outcome.status, output::Status::Skipped);
        assert!(!dir.path().join("noise.report.json").exists());
    }
}
