//! CLI tool for cleaning a JSON layout file
//!
//! Usage:
//!   cargo run --release --bin clean_layout -- <layout.json> [options]
//!
//! Options:
//!   --server <path>     Run the jobs in a slcleaner-server child process
//!   --workers <n>       Worker threads (0 = one per core)
//!   --output <file>     Write the cleaned layers as JSON
//!   --polygons          Publish polygons instead of rows
//!   --packed            Transfer rows base64-packed (server mode)
//!   --summary           Only print the per-layer summary line

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use slcleaner::engine::{Dispatcher, DispatcherConfig, JobId, JobPayload, JobResult, OutputFormat};
use slcleaner::layout::{load_layout, plan_jobs, write_cleaned, CleanedLayer};
use slcleaner::{logging, CleanerProcess};

const RESULT_WAIT: Duration = Duration::from_secs(600);

struct Options {
    layout: PathBuf,
    server: Option<PathBuf>,
    workers: usize,
    output: Option<PathBuf>,
    format: OutputFormat,
    packed: bool,
    summary_only: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init("slcleaner=warn");

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <layout.json> [options]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --server <path>     Run the jobs in a slcleaner-server child process");
        eprintln!("  --workers <n>       Worker threads (0 = one per core)");
        eprintln!("  --output <file>     Write the cleaned layers as JSON");
        eprintln!("  --polygons          Publish polygons instead of rows");
        eprintln!("  --packed            Transfer rows base64-packed (server mode)");
        eprintln!("  --summary           Only print the per-layer summary line");
        return Ok(());
    }
    let options = parse_args(&args)?;

    eprintln!("Loading: {}", options.layout.display());
    let start = Instant::now();
    let layout = load_layout(&options.layout)?;
    let plan = plan_jobs(&layout, options.format);
    eprintln!(
        "Layout loaded in {:.2}ms: {} layers, {} skipped",
        start.elapsed().as_secs_f64() * 1000.0,
        layout.layers.len(),
        plan.skipped.len() + plan.duplicates.len()
    );
    for id in &plan.skipped {
        println!("{}: skipped (bounding box smaller than min_width)", id);
    }
    for id in &plan.duplicates {
        println!("{}: skipped (repeated layer entry, first one is used)", id);
    }

    let start = Instant::now();
    let order: Vec<JobId> = plan.jobs.iter().map(|j| j.id).collect();
    let mut results = match &options.server {
        Some(server) => run_in_server(server, &options, plan.jobs)?,
        None => run_in_process(&options, plan.jobs)?,
    };
    eprintln!("Cleaned in {:.2}ms", start.elapsed().as_secs_f64() * 1000.0);
    eprintln!();

    let mut cleaned = Vec::with_capacity(order.len());
    for id in order {
        let Some(result) = results.remove(&id) else { continue };
        print_result(&result, options.summary_only);
        cleaned.push(CleanedLayer {
            layer: id.layer,
            datatype: id.datatype,
            payload: result.payload,
            stats: result.stats,
        });
    }

    if let Some(path) = &options.output {
        write_cleaned(path, &cleaned)?;
        eprintln!("Wrote {} layers to {}", cleaned.len(), path.display());
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options {
        layout: PathBuf::from(&args[1]),
        server: None,
        workers: 0,
        output: None,
        format: OutputFormat::Rows,
        packed: false,
        summary_only: false,
    };

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--server" => {
                i += 1;
                options.server = Some(PathBuf::from(args.get(i).context("--server needs a path")?));
            }
            "--workers" => {
                i += 1;
                let value = args.get(i).context("--workers needs a number")?;
                options.workers = value.parse().with_context(|| format!("invalid worker count {value:?}"))?;
            }
            "--output" => {
                i += 1;
                options.output = Some(PathBuf::from(args.get(i).context("--output needs a path")?));
            }
            "--polygons" => options.format = OutputFormat::Polygons,
            "--packed" => options.packed = true,
            "--summary" => options.summary_only = true,
            other => bail!("unknown option {other}"),
        }
        i += 1;
    }
    Ok(options)
}

/// Jobs finishing out of order are collected as they come in
fn run_in_process(options: &Options, jobs: Vec<slcleaner::JobSpec>) -> Result<HashMap<JobId, JobResult>> {
    let dispatcher = Dispatcher::new(DispatcherConfig::default().with_workers(options.workers))?;
    let total = jobs.len();
    for job in jobs {
        dispatcher.submit(job)?;
    }

    let mut results = HashMap::with_capacity(total);
    let mut finished = 0;
    while finished < total {
        let Some(id) = dispatcher.next_finished(RESULT_WAIT) else {
            bail!("{} of {} jobs did not finish", total - finished, total);
        };
        finished += 1;
        match dispatcher.take_result_timeout(id, Duration::ZERO) {
            Ok(result) => {
                results.insert(id, result);
            }
            Err(e) => eprintln!("{}: {}", id, e),
        }
    }
    Ok(results)
}

fn run_in_server(
    server: &Path,
    options: &Options,
    jobs: Vec<slcleaner::JobSpec>,
) -> Result<HashMap<JobId, JobResult>> {
    let mut process = CleanerProcess::spawn(server, Some(options.workers))?;
    let ids: Vec<JobId> = jobs.iter().map(|j| j.id).collect();
    for job in &jobs {
        process.submit(job)?;
    }
    drop(jobs);

    let mut results = HashMap::with_capacity(ids.len());
    for id in ids {
        match process.wait_for_result(id, RESULT_WAIT, options.packed) {
            Ok(mut result) => {
                if let JobPayload::PackedRows(_) = result.payload {
                    let rows = result.clone().into_rows()?;
                    result.payload = JobPayload::Rows(rows);
                }
                results.insert(id, result);
            }
            Err(e) => eprintln!("{}: {:#}", id, e),
        }
    }

    if let Some(report) = process.shutdown(Duration::from_secs(10), Duration::from_secs(5))? {
        if report.unretrieved > 0 {
            eprintln!("{} results were left on the server", report.unretrieved);
        }
    }
    Ok(results)
}

fn print_result(result: &JobResult, summary_only: bool) {
    let stats = &result.stats;
    let shapes = match &result.payload {
        JobPayload::Rows(rows) => format!("{} rows", rows.len()),
        JobPayload::PackedRows(_) => "packed rows".to_string(),
        JobPayload::Polygons(polygons) => format!("{} polygons", polygons.len()),
    };
    println!(
        "{}: {}, width fixes={}, space fixes={}, passes={}, {:.2}ms",
        result.id, shapes, stats.width_violations, stats.space_violations, stats.passes, result.elapsed_ms
    );
    if summary_only {
        return;
    }
    println!("  Edges: {} in, {} sealed, {} ignored", stats.edges_in, stats.edges_sealed, stats.edges_ignored);
    println!("  Rows with material: {}", stats.rows_with_material);
    println!("  Worker: {}", result.worker);
}
