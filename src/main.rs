//! vbat-sim entry point: CLI wiring and config-driven pipeline construction.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use chrono::NaiveDate;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vbat_sim::config::ValuationConfig;
use vbat_sim::io::export::{Report, export_series_csv, export_valuations_csv, write_report_json};
use vbat_sim::io::ledger::{load_battery_events, load_ledger};
use vbat_sim::sim::aggregate::{DateRange, FieldSelector, aggregate};
use vbat_sim::sim::summary::RunSummary;
use vbat_sim::sim::tariff::real_time_value_at;
use vbat_sim::sim::types::Granularity;
use vbat_sim::source::{EventSource, RecordedEvents, SyntheticSource};

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<PathBuf>,
    preset: Option<String>,
    seed_override: Option<u64>,
    ledger_path: Option<PathBuf>,
    events_path: Option<PathBuf>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    out: Option<PathBuf>,
    json: bool,
}

fn print_help() {
    eprintln!("vbat-sim: household virtual battery ledger and tariff valuation");
    eprintln!();
    eprintln!("Usage: vbat-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>     Load configuration from a TOML file");
    eprintln!("  --preset <name>     Use a built-in preset (hourly, daily, weekly, monthly)");
    eprintln!("  --seed <u64>        Override the synthetic source seed");
    eprintln!("  --events <path>     Read recorded events from a CSV sheet");
    eprintln!("  --ledger <path>     Value a monthly financial ledger CSV instead of events");
    eprintln!("  --from <date>       Range start for ledger totals (YYYY-MM-DD, inclusive)");
    eprintln!("  --to <date>         Range end for ledger totals (YYYY-MM-DD, inclusive)");
    eprintln!("  --out <path>        Write the series (or ledger valuations) to CSV");
    eprintln!("  --json              Print the full report as JSON");
    eprintln!("  --help              Show this help message");
    eprintln!();
    eprintln!("If no --config or --preset is given, the hourly preset is used.");
    eprintln!("Set RUST_LOG=debug for pipeline logging on stderr.");
}

fn fail(msg: &str) -> ! {
    eprintln!("error: {msg}");
    process::exit(1);
}

fn next_value<'a>(args: &'a [String], i: usize, flag: &str, what: &str) -> &'a str {
    args.get(i)
        .map(String::as_str)
        .unwrap_or_else(|| fail(&format!("{flag} requires {what}")))
}

fn parse_date(raw: &str, flag: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .unwrap_or_else(|_| fail(&format!("{flag} value \"{raw}\" is not a YYYY-MM-DD date")))
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        preset: None,
        seed_override: None,
        ledger_path: None,
        events_path: None,
        from: None,
        to: None,
        out: None,
        json: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                cli.config_path = Some(PathBuf::from(next_value(&args, i, "--config", "a path")));
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(next_value(&args, i, "--preset", "a name").to_string());
            }
            "--seed" => {
                i += 1;
                let raw = next_value(&args, i, "--seed", "a u64");
                match raw.parse::<u64>() {
                    Ok(s) => cli.seed_override = Some(s),
                    Err(_) => fail(&format!("--seed value \"{raw}\" is not a valid u64")),
                }
            }
            "--ledger" => {
                i += 1;
                cli.ledger_path = Some(PathBuf::from(next_value(&args, i, "--ledger", "a path")));
            }
            "--events" => {
                i += 1;
                cli.events_path = Some(PathBuf::from(next_value(&args, i, "--events", "a path")));
            }
            "--from" => {
                i += 1;
                cli.from = Some(parse_date(next_value(&args, i, "--from", "a date"), "--from"));
            }
            "--to" => {
                i += 1;
                cli.to = Some(parse_date(next_value(&args, i, "--to", "a date"), "--to"));
            }
            "--out" => {
                i += 1;
                cli.out = Some(PathBuf::from(next_value(&args, i, "--out", "a path")));
            }
            "--json" => {
                cli.json = true;
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    if cli.config_path.is_some() && cli.preset.is_some() {
        fail("--config and --preset are mutually exclusive; choose one source");
    }
    if cli.ledger_path.is_some() && cli.events_path.is_some() {
        fail("--ledger and --events are mutually exclusive; choose one input");
    }

    cli
}

/// Builds the range for ledger totals; a missing bound is open-ended.
fn build_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<DateRange, String> {
    let unbounded = DateRange::unbounded();
    DateRange::new(from.unwrap_or(unbounded.from()), to.unwrap_or(unbounded.to()))
        .map_err(|e| e.to_string())
}

/// Runs the event pipeline: accumulate, value by derived path, estimate savings.
fn run_events(cfg: &ValuationConfig, events_path: Option<&Path>) -> Result<Report, String> {
    let mut synthetic = None;
    let events = match events_path {
        Some(path) => {
            let loaded = load_battery_events(path).map_err(|e| e.to_string())?;
            RecordedEvents::new(loaded).events()
        }
        None => {
            let s = &cfg.source;
            let mut source =
                SyntheticSource::new(cfg.report.granularity, s.periods, s.start_date, s.seed);
            let events = source.events();
            info!(source = source.source_type(), events = events.len(), "generated events");
            synthetic = Some(source);
            events
        }
    };

    let accumulator = cfg.accumulator().map_err(|e| e.to_string())?;
    let points = accumulator.run(&events).map_err(|e| e.to_string())?;

    if let (Some(source), Some(latest)) = (&synthetic, points.last()) {
        if source.granularity == Granularity::Hourly {
            log_real_time_value(source, points.len() - 1, latest.stored_kwh);
        }
    }

    let valuator = cfg.valuator().map_err(|e| e.to_string())?;
    let (valuation_source, valuations) =
        valuator.value(None, &events).map_err(|e| e.to_string())?;
    let savings = valuator.savings(&points).map_err(|e| e.to_string())?;
    let summary = RunSummary::from_series(&events, &points);

    Ok(Report {
        points,
        valuation_source,
        valuations,
        savings: Some(savings),
        summary: Some(summary),
        totals: None,
    })
}

/// Logs the tariff band and value of the energy stored at the last hour.
fn log_real_time_value(source: &SyntheticSource, index: usize, stored_kwh: f64) {
    let at = source.period_start(index);
    let (rate, value) = real_time_value_at(stored_kwh, at);
    info!(
        at = %at,
        band = %rate.band,
        multiplier = rate.multiplier,
        value,
        "real-time value of stored energy"
    );
}

/// Runs the ledger pipeline: value rows, then total them over the range.
fn run_ledger(cfg: &ValuationConfig, path: &Path, range: &DateRange) -> Result<Report, String> {
    let rows = load_ledger(path).map_err(|e| e.to_string())?;
    let valuator = cfg.valuator().map_err(|e| e.to_string())?;
    let (valuation_source, valuations) =
        valuator.value(Some(&rows), &[]).map_err(|e| e.to_string())?;

    let fields: BTreeSet<FieldSelector> = FieldSelector::ALL.into_iter().collect();
    let totals = aggregate(&rows, range, &fields).map_err(|e| e.to_string())?;
    if totals.rows_matched == 0 && !rows.is_empty() {
        warn!(from = %range.from(), to = %range.to(), "no ledger rows fall inside the range");
    }

    Ok(Report {
        points: Vec::new(),
        valuation_source,
        valuations,
        savings: None,
        summary: None,
        totals: Some(totals),
    })
}

fn print_text(report: &Report) {
    for p in &report.points {
        println!("{p}");
    }
    if !report.points.is_empty() {
        println!();
    }

    println!("--- Financial Breakdown ({:?}) ---", report.valuation_source);
    for v in &report.valuations {
        println!(
            "{:>16} | loss={:>8.2}  gain={:>8.2}  fee={:>7.2}  total={:>8.2}",
            v.period_label, v.loss, v.gain, v.fee, v.total_gain
        );
    }

    if let Some(summary) = &report.summary {
        println!("\n{summary}");
    }
    if let Some(savings) = &report.savings {
        println!("Estimated savings:     {:.2}", savings.total_f64());
        println!("  (assumes every stored kWh was charged at the off-peak rate)");
    }
    if let Some(totals) = &report.totals {
        print!("\n{totals}");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = parse_args();

    // --config takes priority, then --preset, then the hourly default
    let mut cfg = if let Some(ref path) = cli.config_path {
        ValuationConfig::from_toml_file(path).unwrap_or_else(|e| fail(&e.to_string()))
    } else if let Some(ref name) = cli.preset {
        ValuationConfig::from_preset(name).unwrap_or_else(|e| fail(&e.to_string()))
    } else {
        ValuationConfig::hourly()
    };

    if let Some(seed) = cli.seed_override {
        cfg.source.seed = seed;
    }

    let errors = cfg.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let result = match cli.ledger_path {
        Some(ref path) => {
            build_range(cli.from, cli.to).and_then(|range| run_ledger(&cfg, path, &range))
        }
        None => run_events(&cfg, cli.events_path.as_deref()),
    };
    let report = result.unwrap_or_else(|e| fail(&e));

    if cli.json {
        if let Err(e) = write_report_json(&report, io::stdout().lock()) {
            fail(&format!("failed to write JSON: {e}"));
        }
        println!();
    } else {
        print_text(&report);
    }

    if let Some(ref path) = cli.out {
        let written = if report.points.is_empty() {
            export_valuations_csv(&report.valuations, path)
        } else {
            export_series_csv(&report.points, path)
        };
        if let Err(e) = written {
            fail(&format!("failed to write CSV: {e}"));
        }
        eprintln!("Report written to {}", path.display());
    }
}
