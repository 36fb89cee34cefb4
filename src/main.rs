//! EVO Performance Monitor - Main Entry Point

mod api;
mod logic;
pub mod constants;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use clap::{Parser, Subcommand};
use serde::Serialize;

use api::commands;
use logic::autostart::{TransitionReport, TransitionStatus};
use logic::config::MonitorConfig;
use logic::context::AppContext;
use logic::suggestions::SuggestionRecord;

/// Autostart manager and process risk monitor
#[derive(Parser)]
#[command(name = "evo-monitor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true, env = "EVO_MONITOR_CONFIG")]
    config: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List autostart entries
    List,

    /// Disable an autostart entry (identity or name)
    Disable { entry: String },

    /// Re-enable a disabled autostart entry
    Enable { entry: String },

    /// Delete an autostart entry (registry values are backed up first)
    Delete { entry: String },

    /// Terminate the running processes of an autostart entry
    Kill { entry: String },

    /// Heaviest processes right now
    Processes {
        #[arg(long, short = 'n')]
        limit: Option<u32>,
    },

    /// Machine-wide load, battery and fullscreen state
    Status,

    /// Score entries, services and processes and print suggestions
    Scan,

    /// Poll telemetry until Ctrl+C, scanning every N polls
    Monitor {
        #[arg(long, default_value_t = 6)]
        scan_every: u32,
    },

    /// Show the allow list, or add / remove a name
    Whitelist {
        name: Option<String>,
        #[arg(long)]
        remove: bool,
    },

    /// Show the deny list, or add / remove a name
    Blacklist {
        name: Option<String>,
        #[arg(long)]
        remove: bool,
    },

    /// Write the tab-delimited process report
    Export,

    /// Act on the top suggestion for a subject (or dismiss it with --ignore)
    Execute {
        subject: String,
        #[arg(long)]
        ignore: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match MonitorConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    log::info!("Starting {} v{}", constants::APP_NAME, constants::APP_VERSION);
    let ctx = Arc::new(AppContext::new(config));

    match run(cli.command, cli.json, ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, json: bool, ctx: Arc<AppContext>) -> Result<(), String> {
    match command {
        Commands::List => {
            let entries = commands::list_startup_entries(&ctx)?;
            if json {
                return print_json(&entries);
            }
            println!("{:<10} {:<28} {:<26} COMMAND", "STATE", "NAME", "BACKEND");
            for e in entries {
                println!("{:<10} {:<28} {:<26} {}", e.state, e.name, e.backend, e.command);
            }
        }
        Commands::Disable { entry } => print_report(commands::disable_startup_entry(&ctx, &entry)?, json)?,
        Commands::Enable { entry } => print_report(commands::enable_startup_entry(&ctx, &entry)?, json)?,
        Commands::Delete { entry } => print_report(commands::delete_startup_entry(&ctx, &entry)?, json)?,
        Commands::Kill { entry } => {
            let killed = commands::kill_entry_processes(&ctx, &entry)?;
            if json {
                return print_json(&killed);
            }
            println!("Terminated {} process(es): {:?}", killed.len(), killed);
        }
        Commands::Processes { limit } => {
            // Rates need two samples
            ctx.refresh_telemetry();
            tokio::time::sleep(Duration::from_secs(1)).await;
            ctx.refresh_telemetry();

            let rows = commands::get_running_processes(&ctx, limit)?;
            if json {
                return print_json(&rows);
            }
            println!("{:>7} {:<28} {:>6} {:>6} {:>9} {:>9} {:>7}", "PID", "NAME", "CPU%", "MEM%", "MEM_MB", "DISK_KB/s", "LOAD");
            for p in rows {
                println!(
                    "{:>7} {:<28} {:>6.1} {:>6.1} {:>9.1} {:>9.1} {:>7.1}",
                    p.pid, p.name, p.cpu_percent, p.memory_percent, p.memory_mb, p.disk_kb_per_sec, p.load_index
                );
            }
        }
        Commands::Status => {
            let status = commands::get_system_status(&ctx)?;
            print_json(&status)?;
        }
        Commands::Scan => {
            let records = logic::scan::scan_in_background(Arc::clone(&ctx)).await.map_err(|e| e.to_string())?;
            print_suggestions(&records, json)?;
        }
        Commands::Monitor { scan_every } => monitor(ctx, scan_every.max(1)).await?,
        Commands::Whitelist { name, remove } => edit_list(&ctx, name, remove, true, json)?,
        Commands::Blacklist { name, remove } => edit_list(&ctx, name, remove, false, json)?,
        Commands::Export => println!("Report written to {}", commands::export_report(&ctx)?),
        Commands::Execute { subject, ignore } => {
            let records = commands::scan_suggestions(&ctx)?;
            let needle = subject.to_lowercase();
            let record = records
                .iter()
                .find(|r| r.name.to_lowercase() == needle)
                .ok_or_else(|| format!("No suggestion for '{}'", subject))?;

            if ignore {
                commands::ignore_suggestion(&ctx, record)?;
                println!("Ignored '{}'; it is now on the allow list", record.name);
            } else {
                let result = commands::accept_suggestion(&ctx, record)?;
                println!("{} ({} ms)", result.message, result.duration_ms);
            }
        }
    }
    Ok(())
}

async fn monitor(ctx: Arc<AppContext>, scan_every: u32) -> Result<(), String> {
    let poller = logic::scan::spawn_telemetry_loop(Arc::clone(&ctx));
    let mut ticker = tokio::time::interval(Duration::from_secs(ctx.config.sampler.refresh_secs.max(1)));
    let mut ticks = 0u32;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                ticks += 1;
                let snapshot = ctx.latest_snapshot();
                println!(
                    "[{}] CPU {:.1}% | RAM {:.1}% | {} processes",
                    snapshot.taken_at.format("%H:%M:%S"),
                    snapshot.load.cpu_percent,
                    snapshot.load.memory_percent,
                    snapshot.samples.len()
                );

                if ticks % scan_every == 0 {
                    match logic::scan::scan_in_background(Arc::clone(&ctx)).await {
                        Ok(records) => {
                            for r in records.iter().filter(|r| r.is_actionable()) {
                                println!("  ! [{}] {} - {}", r.score, r.name, r.suggestion);
                            }
                        }
                        Err(e) => log::warn!("Scan skipped: {}", e),
                    }
                }
            }
        }
    }

    poller.abort();
    log::info!("Monitor stopped");
    Ok(())
}

fn edit_list(ctx: &AppContext, name: Option<String>, remove: bool, allow: bool, json: bool) -> Result<(), String> {
    if let Some(name) = name {
        let changed = if remove {
            commands::remove_from_lists(ctx, &name)?
        } else if allow {
            commands::add_to_whitelist(ctx, &name)?
        } else {
            commands::add_to_blacklist(ctx, &name)?
        };
        println!("{}", if changed { "Updated" } else { "No change" });
        return Ok(());
    }

    let lists = commands::get_preference_lists(ctx)?;
    let names = if allow { lists.whitelist } else { lists.blacklist };
    if json {
        return print_json(&names);
    }
    for n in names {
        println!("{}", n);
    }
    Ok(())
}

fn print_report(report: TransitionReport, json: bool) -> Result<(), String> {
    if json {
        return print_json(&report);
    }
    println!("{:?}: {}", report.status, report.detail);
    if report.status == TransitionStatus::Failed {
        return Err(format!("{} of {} failed", report.target.as_str(), report.identity));
    }
    Ok(())
}

fn print_suggestions(records: &[SuggestionRecord], json: bool) -> Result<(), String> {
    if json {
        return print_json(&records);
    }
    println!("{:>5} {:<7} {:<12} {:<28} SUGGESTION", "SCORE", "PRIO", "CATEGORY", "NAME");
    for r in records {
        println!(
            "{:>5} {:<7} {:<12} {:<28} {}",
            r.score,
            r.priority.as_str(),
            r.category.as_str(),
            r.name,
            r.suggestion
        );
        println!("      {}", r.description);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}
