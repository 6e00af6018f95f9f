use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use covtree::batch::{merge_reports, ParallelParser, ParsedReport, ReportJob};
use covtree::config::{expand_pattern, Config};
use covtree::node::{Node, TestResult};
use covtree::parser::{ParserKind, ProcessingMode};
use covtree::value::Value;

#[derive(Parser)]
#[command(name = "covtree")]
#[command(about = "Normalize coverage and test-result reports into one tree")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: covtree.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and merge reports, then print the totals per metric
    Summary {
        /// Report files or glob patterns (uses [[reports]] from the config if empty)
        files: Vec<String>,

        /// Format of the given files
        #[arg(short, long)]
        format: Option<ParserKind>,

        /// fail-fast or ignore-errors
        #[arg(short, long)]
        mode: Option<ProcessingMode>,

        /// Prefix removed from report paths (repeatable)
        #[arg(long = "strip-prefix")]
        strip_prefixes: Vec<String>,

        /// Number of reports parsed concurrently
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Leave out reports that fail to parse instead of aborting
        #[arg(long)]
        skip_failures: bool,

        /// Print the merged tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the supported report formats
    Formats,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let base_dir = std::env::current_dir().context("Could not determine current directory")?;
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Could not load {}", path.display()))?,
        None => Config::load_or_default(&base_dir)?,
    };

    match cli.command {
        Commands::Summary {
            files,
            format,
            mode,
            strip_prefixes,
            jobs,
            skip_failures,
            json,
        } => {
            let mut settings = config.parser.clone();
            if let Some(mode) = mode {
                settings.mode = mode;
            }
            settings.strip_prefixes.extend(strip_prefixes);
            if let Some(jobs) = jobs {
                settings.jobs = jobs.max(1);
            }
            let config = Config {
                parser: settings,
                reports: config.reports,
            };

            let report_jobs = if files.is_empty() {
                config.report_jobs(&base_dir)?
            } else {
                let kind = format.context("--format is required when report files are given")?;
                collect_jobs(&base_dir, &files, kind)?
            };
            cmd_summary(&config, report_jobs, skip_failures, json)
        }
        Commands::Formats => {
            cmd_formats();
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(verbose > 1)
        .init();
}

fn collect_jobs(base_dir: &Path, files: &[String], kind: ParserKind) -> Result<Vec<ReportJob>> {
    let mut jobs = Vec::new();
    for file in files {
        if file.contains(['*', '?', '[']) {
            let matches = expand_pattern(base_dir, file)?;
            if matches.is_empty() {
                eprintln!("{} No files match {}", "⚠".yellow(), file);
            }
            jobs.extend(matches.into_iter().map(|path| ReportJob::new(path, kind)));
        } else {
            jobs.push(ReportJob::new(base_dir.join(file), kind));
        }
    }
    Ok(jobs)
}

fn cmd_summary(config: &Config, jobs: Vec<ReportJob>, skip_failures: bool, json: bool) -> Result<()> {
    if jobs.is_empty() {
        anyhow::bail!("No report files given. Pass files or add [[reports]] to covtree.toml");
    }
    let count = jobs.len();

    let reports = ParallelParser::new(config.parser.jobs, config.parser_options())
        .with_max_warnings(config.parser.max_warnings)
        .parse_all_blocking(jobs)?;

    print_warnings(&reports);
    let tree = merge_reports(reports, skip_failures)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print_summary(&tree, count)?;
    }

    Ok(())
}

fn print_warnings(reports: &[ParsedReport]) {
    for report in reports {
        if !report.warnings.has_errors() {
            continue;
        }
        eprintln!(
            "{} {}",
            "⚠".yellow(),
            format!("Warnings in {}:", report.path.display()).yellow()
        );
        for line in report.warnings.summary() {
            eprintln!("  {}", line.dimmed());
        }
    }
}

fn print_summary(tree: &Node, report_count: usize) -> Result<()> {
    println!();
    println!(
        "{} {} report(s)",
        "Summary of".bold(),
        report_count.to_string().cyan()
    );
    println!("{}", "─".repeat(40).dimmed());

    for value in tree.aggregate_values()? {
        let metric = format!("{:<20}", value.metric().to_string());
        match value {
            Value::Coverage(coverage) => {
                let line = match coverage.percentage() {
                    Some(percent) => {
                        let text = format!("{:>7.2}%", percent);
                        let text = if percent >= 80.0 {
                            text.green()
                        } else if percent >= 50.0 {
                            text.yellow()
                        } else {
                            text.red()
                        };
                        format!("{}  ({}/{})", text, coverage.covered(), coverage.total())
                    }
                    None => format!("{:>8}", "n/a").dimmed().to_string(),
                };
                println!("  {}{}", metric.bold(), line);
            }
            Value::Fraction(fraction) => {
                println!(
                    "  {}{:>8.2}  ({}/{})",
                    metric.bold(),
                    fraction.ratio(),
                    fraction.numerator(),
                    fraction.denominator()
                );
            }
            Value::TestCount(total) => {
                let tests = tree.all_test_cases();
                let failed = tests.iter().filter(|t| t.result == TestResult::Failed).count();
                let skipped = tests.iter().filter(|t| t.result == TestResult::Skipped).count();
                let failed = if failed > 0 {
                    format!("{} failed", failed).red()
                } else {
                    "0 failed".green()
                };
                println!(
                    "  {}{:>8}  ({}, {} skipped)",
                    metric.bold(),
                    total,
                    failed,
                    skipped
                );
            }
            Value::Complexity(n) | Value::LinesOfCode(n) => {
                println!("  {}{:>8}", metric.bold(), n);
            }
        }
    }

    Ok(())
}

fn cmd_formats() {
    println!("{}", "Supported formats:".bold());
    for kind in ParserKind::ALL {
        println!("  {} {}", "•".cyan(), kind);
    }
}
