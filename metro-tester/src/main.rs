mod logic;
mod scenario;
mod util;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use logic::{LogicTester, ScenarioResult, reports};
use metro_game::Catalog;
use scenario::{get_scenario, list_scenarios};
use util::{parse_seeds, split_csv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "metro-tester", version)]
#[command(about = "Automated campaign simulation for the Moscow Metro explorer engine")]
struct Args {
    /// Scenarios to run (comma-separated, `all` for every scenario)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated, decimal or 0x-prefixed hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Override the simulated player's answer accuracy (0.0 - 1.0)
    #[arg(long)]
    accuracy: Option<f64>,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Write the report to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut out = open_output(args.output.as_deref())?;

    if args.list_scenarios {
        write_scenario_list(&mut out)?;
        return out.flush().context("failed to flush scenario list");
    }

    println!("{}", "🚇 Metro Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());

    let started = Instant::now();
    let seeds = parse_seeds(&args.seeds)?;
    let results = run_logic_scenarios(&args, &expand_scenarios(&args.scenarios), &seeds);
    write_report(args.report, &results, started, &mut out)?;
    out.flush().context("failed to flush report")?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

/// Buffered stdout, or a freshly created file when `path` is given.
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let Some(path) = path else {
        return Ok(Box::new(BufWriter::new(stdout())));
    };
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn write_scenario_list(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(out, "  {key:25} - {description}")?;
    }
    Ok(())
}

/// Requested scenario names in order, `all` replaced by every known scenario
/// and repeats dropped.
fn expand_scenarios(requested: &str) -> Vec<String> {
    let names = split_csv(requested);
    let everything = names
        .iter()
        .any(|name| name == "all")
        .then(|| list_scenarios().into_iter().map(|(key, _)| key))
        .into_iter()
        .flatten();

    let mut expanded: Vec<String> = Vec::new();
    for name in names.into_iter().filter(|name| name != "all").chain(everything) {
        if !expanded.contains(&name) {
            expanded.push(name);
        }
    }
    expanded
}

fn run_logic_scenarios(args: &Args, scenarios: &[String], seeds: &[u64]) -> Vec<ScenarioResult> {
    println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let tester = LogicTester::new(Catalog::bundled(), args.verbose).with_accuracy(args.accuracy);
    scenarios
        .iter()
        .filter_map(|name| {
            let scenario = get_scenario(name);
            if scenario.is_none() {
                eprintln!("⚠️  Unknown scenario: {}", name.yellow());
            }
            scenario
        })
        .flat_map(|scenario| tester.run_scenario(&scenario, seeds, args.iterations))
        .collect()
}

fn write_report(
    format: ReportFormat,
    results: &[ScenarioResult],
    started: Instant,
    out: &mut dyn Write,
) -> Result<()> {
    match format {
        ReportFormat::Json => reports::generate_json_report(out, results),
        ReportFormat::Markdown if results.is_empty() => {
            writeln!(out, "# Metro Logic Test Results\n\n_No scenarios executed._")?;
            Ok(())
        }
        ReportFormat::Markdown => reports::generate_markdown_report(out, results),
        ReportFormat::Console => {
            if results.is_empty() {
                writeln!(out, "No logic scenarios executed.")?;
            } else {
                reports::generate_console_report(out, results, started.elapsed())?;
            }
            writeln!(out)?;
            writeln!(out, "🏁 Total time: {:?}", started.elapsed())?;
            Ok(())
        }
    }
}
