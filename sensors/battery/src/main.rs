use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info, warn};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time;

use powerwatch_rs_analysis::{
    analyze_battery_health, average_discharge_rate, remaining_time, robust_average_discharge_rate,
};
use powerwatch_rs_battery::{Collector, JsonlStore, Retention, SysfsBattery, POWER_SUPPLY_ROOT};
use powerwatch_rs_core::{format, GlobalConfig, HistoryStore, SampleSource};

#[derive(Parser)]
#[command(name = "powerwatch-rs-battery")]
#[command(about = "Battery telemetry collector and health analyzer")]
#[command(version)]
struct Args {
    /// Battery name (e.g., BAT0, BAT1). If not specified, auto-detect first battery
    #[arg(short, long)]
    battery: Option<String>,

    /// Sample interval in milliseconds (overrides the config file)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Directory holding history.jsonl (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Collect one sample, print it and exit
    #[arg(short, long)]
    once: bool,

    /// Print the health analysis of the stored history as JSON and exit
    #[arg(short, long)]
    report: bool,

    /// Print a plain-text summary of the stored history and exit
    #[arg(short, long)]
    summary: bool,

    /// List available batteries and exit
    #[arg(short, long)]
    list: bool,

    /// Check sensor availability and exit
    #[arg(long)]
    check: bool,

    /// Generate example config file and exit
    #[arg(long)]
    generate_config: bool,
}

fn print_summary(config: &GlobalConfig, store: &JsonlStore) -> anyhow::Result<()> {
    let history = store.last(config.history_limit)?;
    let (Some(analysis), Some(latest)) = (analyze_battery_health(&history), history.last()) else {
        println!("No measurements recorded yet in {}", store.path().display());
        return Ok(());
    };

    let naive = average_discharge_rate(&history, config.rate_window);
    let robust = robust_average_discharge_rate(&history, config.rate_window);

    println!("{}", format::key_value("Samples", &history.len().to_string()));
    println!(
        "{}",
        format::key_value(
            "Charge",
            &format!(
                "{}% {} ({})",
                latest.percentage,
                format::create_gauge(f64::from(latest.percentage), 20),
                latest.state
            )
        )
    );
    println!("{}", format::key_value("Last sample", format::time_of_day(&latest.timestamp)));
    println!("{}", format::key_value("Naive rate", &format!("{:.0} mAh/h", naive)));
    println!(
        "{}",
        format::key_value(
            "Robust rate",
            &format!("{:.0} mAh/h ({} intervals)", robust.rate, robust.valid_intervals)
        )
    );
    if latest.state == "discharging" && robust.rate > 0.0 {
        println!(
            "{}",
            format::key_value(
                "Remaining",
                &format::duration_hm(remaining_time(latest.current_capacity, robust.rate))
            )
        );
    }
    println!("{}", format::key_value("Wear", &format!("{:.1}%", analysis.wear_percent)));
    println!("{}", format::key_value("Cycles", &analysis.cycle_count.to_string()));
    println!(
        "{}",
        format::key_value("Status", &format!("{} ({}/100)", analysis.status, analysis.score))
    );
    println!(
        "{}",
        format::key_value(
            "Degradation",
            &format!("{:.2}% per month", analysis.trend.degradation_rate)
        )
    );
    if let Some(days) = analysis.trend.projected_days {
        println!("{}", format::key_value("Days to 80%", &days.to_string()));
    }
    println!(
        "{}",
        format::key_value(
            "Condition",
            &format!("{} (rating {})", analysis.metrics.condition, analysis.metrics.health_rating)
        )
    );
    println!("{}", format::key_value("Charge sessions", &analysis.cycles.len().to_string()));

    if !analysis.anomalies.is_empty() {
        println!("\nAnomalies:");
        for anomaly in &analysis.anomalies {
            println!("  {}", anomaly);
        }
    }
    if !analysis.recommendations.is_empty() {
        println!("\nRecommendations:");
        for advice in &analysis.recommendations {
            println!("  - {}", advice);
        }
    }

    Ok(())
}

async fn run_collector(
    mut collector: Collector<SysfsBattery, JsonlStore>,
    base_interval: Duration,
) -> anyhow::Result<()> {
    let mut period = base_interval;
    let mut interval = time::interval(period);

    loop {
        interval.tick().await;

        match collector.collect() {
            Ok(sample) => {
                println!("{}", serde_json::to_string(&sample)?);
                io::stdout().flush()?;
            }
            Err(e) if e.is_recoverable() => {
                warn!("{} error while collecting: {}", e.category(), e);
                continue;
            }
            Err(e) => return Err(e).context("battery collection stopped"),
        }

        let next = collector.next_interval(base_interval);
        if next != period {
            info!("sample interval now {}s", next.as_secs());
            period = next;
            interval = time::interval_at(time::Instant::now() + period, period);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let args = Args::parse();

    // Handle config generation
    if args.generate_config {
        let Some(config_path) = GlobalConfig::default_config_path() else {
            bail!("Could not determine config directory");
        };
        GlobalConfig::save_example_config_to_file(&config_path)?;
        println!("Generated example config at: {}", config_path.display());
        return Ok(());
    }

    // Handle list command
    if args.list {
        let batteries = SysfsBattery::list_available_batteries(POWER_SUPPLY_ROOT)
            .context("Error listing batteries")?;
        if batteries.is_empty() {
            println!("No batteries found");
        } else {
            println!("Available batteries:");
            for battery in batteries {
                println!("  {}", battery);
            }
        }
        return Ok(());
    }

    // Load global configuration and apply command line overrides
    let mut config = GlobalConfig::load().context("Failed to load configuration")?;
    if let Some(battery) = args.battery {
        config.battery = Some(battery);
    }
    if let Some(interval) = args.interval {
        config.sample_interval = interval;
        config.detail_interval = config.detail_interval.max(interval);
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }
    config.validate().context("Invalid configuration")?;

    let data_dir = config
        .data_dir()
        .context("Could not determine data directory")?;
    let store = JsonlStore::open(&data_dir)
        .with_context(|| format!("Failed to open history in {}", data_dir.display()))?;

    if args.report {
        let history = store.last(config.history_limit)?;
        match analyze_battery_health(&history) {
            Some(analysis) => println!("{}", serde_json::to_string_pretty(&analysis)?),
            None => bail!("No measurements recorded yet in {}", store.path().display()),
        }
        return Ok(());
    }

    if args.summary {
        return print_summary(&config, &store);
    }

    // Create battery source
    let battery = match SysfsBattery::new(config.battery.clone()) {
        Ok(battery) => battery,
        Err(e) => {
            // If no specific battery was requested, show available options
            if config.battery.is_none() {
                if let Ok(batteries) = SysfsBattery::list_available_batteries(POWER_SUPPLY_ROOT) {
                    if !batteries.is_empty() {
                        eprintln!("Available batteries: {}", batteries.join(", "));
                        eprintln!("Try specifying a battery with --battery <name>");
                    }
                }
            }
            return Err(e).context("Error initializing battery source");
        }
    };

    if args.check {
        battery
            .check_availability()
            .context("Battery source is not available")?;
        println!("Battery source {} is available", battery.name());
        return Ok(());
    }

    let mut collector = Collector::new(
        battery,
        store,
        config.buffer_size,
        config.detail_interval_duration(),
        Retention::days(config.retention_days),
    );
    if let Err(e) = collector.load_buffer(config.buffer_size) {
        warn!("could not preload history: {}", e);
    }

    if args.once {
        let sample = collector.collect().context("Error reading battery")?;
        println!("{}", serde_json::to_string(&sample)?);
        return Ok(());
    }

    info!(
        "collecting from {} every {}s (details every {}s) into {}",
        collector.source().name(),
        config.sample_interval / 1000,
        config.detail_interval / 1000,
        data_dir.display()
    );

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        let _ = tx.send(());
    });

    tokio::select! {
        result = run_collector(collector, config.sample_interval_duration()) => result?,
        _ = &mut rx => info!("stopped by user"),
    }

    Ok(())
}
