//! E-Stop Event Logger CLI Application
//!
//! Command-line front end for the estop-event-core library. It adds:
//! - TOML configuration of the controller image, storage and signals
//! - The polling loop (change detection, communication events, daily snapshot)
//! - The background E-Stop edge monitor
//! - Event listing, statistics and log maintenance

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use estop_event_core::{
    EdgeMonitor, EventLogger, MonitorEvent, Priority, SignalStatus, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

mod config;

/// E-Stop Event Logger - Record and review controller signal events
#[derive(Parser, Debug)]
#[command(name = "estop-events")]
#[command(about = "Record and review E-Stop and IO signal events", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the controller, log changes and monitor the E-Stop
    Run {
        /// Stop after this many polling cycles (default: run forever)
        #[arg(long, value_name = "COUNT")]
        cycles: Option<u64>,
    },
    /// List the most recent events, newest first
    Events {
        /// Maximum number of events to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Only show events of this priority (normal, high, critical)
        #[arg(short, long)]
        priority: Option<Priority>,

        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show event statistics
    Stats {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Read all signals once and record today's system snapshot
    Snapshot,
    /// Delete every daily log file
    Clear,
    /// Check the configuration without touching the controller
    Validate,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("E-Stop Event Logger CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using event core library v{}", estop_event_core::VERSION);

    log::info!("Loading configuration from: {:?}", args.config);
    let config = config::load_config(&args.config)?;
    log::debug!("Configuration loaded successfully");

    match args.command {
        Command::Run { cycles } => run(&config, cycles),
        Command::Events { limit, priority, json } => list_events(&config, limit, priority, json),
        Command::Stats { json } => show_stats(&config, json),
        Command::Snapshot => snapshot(&config),
        Command::Clear => clear(&config),
        Command::Validate => validate(&config),
    }
}

/// Polling loop plus background E-Stop monitor
fn run(config: &config::AppConfig, cycles: Option<u64>) -> Result<()> {
    config.validate()?;

    let plc = Arc::new(config.supervisor()?);
    let signal_map = plc.signal_map();
    let clock = Arc::new(SystemClock);
    let logger = EventLogger::with_clock(&config.storage, clock.clone());

    let removed = logger.apply_retention();
    if removed > 0 {
        log::info!("Pruned {} daily files outside the retention window", removed);
    }

    let monitor = EdgeMonitor::with_store(
        plc.clone(),
        config.estop.clone(),
        Arc::clone(logger.store()),
        clock,
    );
    monitor.on_triggered(|event: &MonitorEvent| {
        println!("🚨 {} at {}", event.description, event.timestamp.format("%H:%M:%S"));
    });
    monitor.on_status_changed(|event: &MonitorEvent| {
        log::info!("{}", event.description);
    });
    let check = monitor.self_test();
    match &check.error {
        Some(error) => log::warn!("E-Stop self-test failed: {}", error),
        None => log::info!("E-Stop self-test passed, signal is {}", if check.current_state == Some(true) { "ON" } else { "OFF" }),
    }
    if !monitor.start_monitoring() {
        log::warn!("E-Stop monitor not started, will keep polling signals");
    }

    println!("═══════════════════════════════════════════════");
    println!("  E-Stop Event Logger - {} signals", config.signals.len());
    println!("═══════════════════════════════════════════════\n");

    let mut cycle = 0u64;
    let mut day = logger.store().today();
    while cycles.map_or(true, |n| cycle < n) {
        cycle += 1;

        let readings = plc.read_all();
        logger.log_communication_event(plc.is_connected());

        let detection = logger.check_and_log_changes(&readings, &signal_map);
        for error in &detection.errors {
            log::error!("{}", error);
        }
        for event in &detection.events {
            let record = logger.format_event_for_display(event);
            println!(
                "{} [{:>8}] {:<24} {}",
                record.formatted_time, record.priority.as_str(), record.io_name, record.change_description
            );
        }

        if readings.iter().any(|r| r.status == SignalStatus::Online) {
            logger.log_system_snapshot(&readings);
        }

        let today = logger.store().today();
        if today != day {
            day = today;
            logger.apply_retention();
        }

        if cycles.map_or(true, |n| cycle < n) {
            thread::sleep(config.polling.interval());
        }
    }

    monitor.stop_monitoring();
    println!("\n{}", monitor.summary());
    Ok(())
}

fn list_events(config: &config::AppConfig, limit: usize, priority: Option<Priority>, json: bool) -> Result<()> {
    let logger = EventLogger::new(&config.storage);
    let events = match priority {
        Some(priority) => logger.get_events_by_priority(priority, limit),
        None => logger.get_recent_events(limit),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("No events recorded");
        return Ok(());
    }

    for event in &events {
        let record = logger.format_event_for_display(event);
        println!(
            "{} {} [{:>8}] {:<24} {:<28} ({})",
            record.formatted_date,
            record.formatted_time,
            record.priority.as_str(),
            record.io_name,
            record.change_description,
            record.time_ago
        );
    }
    Ok(())
}

fn show_stats(config: &config::AppConfig, json: bool) -> Result<()> {
    let logger = EventLogger::new(&config.storage);
    let stats = logger.get_event_statistics();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("📊 Event Statistics:");
    println!("  Total events:    {}", stats.total_events);
    println!("  Critical:        {}", stats.critical_events);
    println!("  High priority:   {}", stats.high_priority_events);
    println!("  Today:           {}", stats.events_today);
    match &stats.latest_event {
        Some(event) => {
            let record = logger.format_event_for_display(event);
            println!("  Latest:          {} {} ({})", record.io_name, record.change_description, record.time_ago);
        }
        None => println!("  Latest:          none"),
    }
    Ok(())
}

fn snapshot(config: &config::AppConfig) -> Result<()> {
    let plc = config.supervisor()?;
    let logger = EventLogger::new(&config.storage);

    let readings = plc.read_all();
    if !plc.is_connected() {
        anyhow::bail!("PLC not reachable, snapshot not recorded");
    }

    let recorded = logger.log_system_snapshot(&readings);
    match recorded.first() {
        Some(event) => println!("✓ {}", logger.format_event_for_display(event).change_description),
        None => println!("Snapshot already recorded today"),
    }
    Ok(())
}

fn clear(config: &config::AppConfig) -> Result<()> {
    let logger = EventLogger::new(&config.storage);
    let removed = logger.clear();
    println!("✓ Removed {} daily log files from {:?}", removed, config.storage.log_dir);
    Ok(())
}

fn validate(config: &config::AppConfig) -> Result<()> {
    config.validate().context("Configuration is invalid")?;
    println!("✓ Configuration valid: {} signals, E-Stop signal '{}'", config.signals.len(), config.estop.signal);
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
