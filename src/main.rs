//! # Tide Analytics Command Line
//!
//! Generates a synthetic equilibrium tide for the last few days, runs the full
//! analysis pipeline over it and prints a text summary (or the whole report as
//! JSON with `--json`).
//!
//! ```text
//! tide-analytics [--json] [--config <path>] [--days <n>] [--horizon <hours>]
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (e.g. `RUST_LOG=tide_analytics_lib=debug`).

use anyhow::{bail, Context};
use chrono::{Duration, DurationRound, Utc};
use std::env;
use tide_analytics_lib::analysis::{AnalysisReport, TideAnalyzer};
use tide_analytics_lib::config::{Config, CONFIG_FILE};
use tide_analytics_lib::synthetic;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "usage: tide-analytics [--json] [--config <path>] [--days <n>] [--horizon <hours>]";

/// Noise added to the demo series, in meters
const DEMO_NOISE: f64 = 0.03;
const DEMO_SEED: u64 = 7;

/// Parsed command line options.
#[derive(Debug)]
struct Options {
    json: bool,
    config_path: String,
    days: u32,
    horizon_hours: Option<f64>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Options> {
    let mut options = Options {
        json: false,
        config_path: CONFIG_FILE.to_string(),
        days: 14,
        horizon_hours: None,
    };
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => options.json = true,
            "--config" => options.config_path = args.next().context("--config needs a path")?,
            "--days" => {
                let value = args.next().context("--days needs a value")?;
                options.days = value
                    .parse()
                    .with_context(|| format!("invalid --days value `{value}`"))?;
            }
            "--horizon" => {
                let value = args.next().context("--horizon needs a value")?;
                let hours = value
                    .parse()
                    .with_context(|| format!("invalid --horizon value `{value}`"))?;
                options.horizon_hours = Some(hours);
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => bail!("unknown argument `{other}`"),
        }
    }
    if options.days == 0 {
        bail!("--days must be at least 1");
    }
    Ok(options)
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args(env::args().skip(1))?;
    let mut config = Config::load_from_path(&options.config_path);
    if let Some(horizon) = options.horizon_hours {
        config.harmonic.horizon_hours = horizon;
        config.ml.forecast_steps = (horizon * 60.0 / config.ml.step_minutes).ceil() as usize;
    }

    // Hourly series ending at the last full hour
    let end = Utc::now()
        .duration_trunc(Duration::hours(1))
        .context("truncate current time")?;
    let count = options.days as usize * 24 + 1;
    let start = Duration::try_hours(count as i64 - 1)
        .and_then(|span| end.checked_sub_signed(span))
        .with_context(|| format!("--days {} reaches past the calendar", options.days))?;
    let mut series =
        synthetic::equilibrium(start, count, 60.0).context("generate synthetic series")?;
    synthetic::add_noise(&mut series, DEMO_NOISE, DEMO_SEED);
    info!(samples = series.len(), %start, %end, "synthetic series generated");

    let report = TideAnalyzer::new(config)
        .run(&series)
        .context("tide analysis failed")?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    let span = &report.span;
    println!(
        "Tide analysis {} → {} ({} samples)",
        span.start.format("%Y-%m-%d %H:%M"),
        span.end.format("%Y-%m-%d %H:%M"),
        span.samples
    );
    println!();

    let basic = &report.statistics.basic;
    println!(
        "Heights   mean {:.3} m  median {:.3} m  range {:.3} m",
        basic.mean, basic.median, basic.range
    );
    if let Some(cycles) = &report.statistics.cycles {
        println!(
            "Tides     {} highs (avg {:.3} m), {} lows (avg {:.3} m), mean range {:.3} m",
            cycles.high_count, cycles.avg_high, cycles.low_count, cycles.avg_low, cycles.avg_range
        );
    }
    println!(
        "Extremes  ≥ {:.3} m: {} samples, ≤ {:.3} m: {} samples",
        report.extremes.high_threshold,
        report.extremes.high_count,
        report.extremes.low_threshold,
        report.extremes.low_count
    );
    if let Some(spectrum) = &report.spectrum {
        let periods: Vec<String> = spectrum
            .dominant
            .iter()
            .take(3)
            .map(|p| match p.constituent {
                Some(kind) => format!("{:.2} h ({kind})", p.period_hours),
                None => format!("{:.2} h", p.period_hours),
            })
            .collect();
        println!("Periods   {}", periods.join(", "));
    }
    println!();

    match &report.harmonic {
        Some(harmonic) => {
            println!("Harmonic constituents (mean level {:.3} m)", harmonic.fit.mean_height);
            for c in &harmonic.fit.constituents {
                println!(
                    "  {:<3} {:>8.4} m  {:>7.2}°",
                    c.kind.name(),
                    c.amplitude,
                    c.phase.to_degrees()
                );
            }
            print_forecast_extent("Harmonic forecast", &harmonic.forecast);
        }
        None => println!("Harmonic forecast skipped"),
    }
    match &report.ml {
        Some(ml) => {
            println!(
                "ML model  rmse {:.4} m  r² {:.4} ({} train / {} test rows)",
                ml.metrics.rmse, ml.metrics.r2, ml.metrics.train_rows, ml.metrics.test_rows
            );
            let mut ranked: Vec<_> = ml.metrics.feature_importance.iter().collect();
            ranked.sort_by(|a, b| b.1.total_cmp(a.1));
            for (name, importance) in ranked.into_iter().take(5) {
                println!("  {name:<16} {importance:.3}");
            }
            print_forecast_extent("ML forecast", &ml.forecast);
        }
        None => println!("ML forecast skipped"),
    }
    println!();

    let summary = &report.anomalies.summary;
    println!("Anomalies {} ({:.1}%)", summary.total_count, summary.percentage);
    for point in report.anomalies.anomalies() {
        let z = point.z_score.map_or_else(|| "-".to_string(), |z| format!("{z:.2}"));
        println!(
            "  {}  {:.3} m  z {}  isolation {:.3}",
            point.timestamp.format("%Y-%m-%d %H:%M"),
            point.height,
            z,
            point.isolation_score
        );
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
}

fn print_forecast_extent(label: &str, points: &[tide_analytics_lib::ForecastPoint]) {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return;
    };
    let hi = points.iter().map(|p| p.predicted_height).fold(f64::NEG_INFINITY, f64::max);
    let lo = points.iter().map(|p| p.predicted_height).fold(f64::INFINITY, f64::min);
    println!(
        "{label}: {} points {} → {}, {:.3} m to {:.3} m",
        points.len(),
        first.timestamp.format("%m-%d %H:%M"),
        last.timestamp.format("%m-%d %H:%M"),
        lo,
        hi
    );
}
