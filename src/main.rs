use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use triagr::clock::ManualClock;
use triagr::config::SchedulerConfig;
use triagr::domain::{SchedulerEvent, TaskDetails};
use triagr::scheduler::{LaneClassifier, PriorityScheduler, SchedulerReport};

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("triagr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("triagr.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: SchedulerConfig) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::CheckConfig => handle_check_config(&config),
        Commands::Classify { priority } => handle_classify(*priority, &config),
        Commands::Simulate {
            tasks,
            ticks,
            tick_ms,
            run_ticks,
        } => handle_simulate(tasks, *ticks, *tick_ms, *run_ticks, config, cli.is_verbose()),
    }
}

fn handle_check_config(config: &SchedulerConfig) -> Result<()> {
    config.validate().context("Configuration is invalid")?;
    println!("{}", "Configuration OK".green().bold());

    println!("\n{}", "Priority tiers:".cyan());
    let mut tiers: Vec<(&String, &i64)> = config.priority_levels.iter().collect();
    tiers.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (category, priority) in tiers {
        println!("  {:<16} {}", category, priority);
    }

    println!("\n{}", "Lanes:".cyan());
    for lane in LaneClassifier::new(&config.lanes).lanes() {
        let max = lane.range.max.map(|m| m.to_string()).unwrap_or_else(|| "inf".to_string());
        println!("  {:<16} [{}, {}]", lane.name, lane.range.min, max);
    }

    println!("\n{} {}", "Max concurrent:".cyan(), config.max_concurrent);
    println!("{} {}ms", "Tick interval:".cyan(), config.tick_interval_ms);
    Ok(())
}

fn handle_classify(priority: i64, config: &SchedulerConfig) -> Result<()> {
    let lanes = LaneClassifier::new(&config.lanes);
    println!("{} -> {}", priority, lanes.classify(priority).green());
    Ok(())
}

fn load_tasks(path: &Path) -> Result<Vec<TaskDetails>> {
    let content = fs::read_to_string(path).context(format!("Failed to read tasks file {}", path.display()))?;
    let tasks: Vec<TaskDetails> = serde_yaml::from_str(&content).context("Failed to parse tasks file")?;
    Ok(tasks)
}

fn handle_simulate(
    tasks_path: &Path,
    ticks: u32,
    tick_ms: u64,
    run_ticks: u32,
    config: SchedulerConfig,
    verbose: bool,
) -> Result<()> {
    let tasks = load_tasks(tasks_path)?;
    let start = tasks
        .iter()
        .map(|t| t.created_at)
        .max()
        .unwrap_or_else(triagr::id::now);
    let clock = ManualClock::new(start);

    let mut scheduler = PriorityScheduler::new(config)
        .context("Failed to create scheduler")?
        .with_clock(Arc::new(clock.clone()));
    let mut events = scheduler.subscribe();

    println!("{} {} tasks from {}", "Loading".cyan(), tasks.len(), tasks_path.display());
    for details in tasks {
        let task = scheduler.add_task(details)?;
        if verbose {
            println!("  {:<20} priority {:>5}  lane {}", task.id, task.priority, task.lane);
        }
    }

    let step = chrono::Duration::milliseconds(i64::try_from(tick_ms).unwrap_or(i64::MAX));
    let mut started_on: HashMap<String, u32> = HashMap::new();

    for tick in 1..=ticks {
        clock.advance(step);

        let due: Vec<String> = started_on
            .iter()
            .filter(|(_, started)| tick - **started >= run_ticks)
            .map(|(id, _)| id.clone())
            .collect();
        for id in due {
            started_on.remove(&id);
            scheduler.complete_task(&id, serde_json::json!({ "tick": tick }));
        }

        scheduler.tick();

        // Preempted tasks take any slots the tick left free
        let preempted: Vec<String> = scheduler.preempted_tasks().iter().map(|t| t.id.clone()).collect();
        for id in preempted {
            if scheduler.available_slots() == 0 {
                break;
            }
            if let Err(e) = scheduler.resume_preempted_task(&id) {
                log::warn!("Failed to resume {}: {}", id, e);
            }
        }

        while let Ok(event) = events.try_recv() {
            match &event {
                SchedulerEvent::TaskStarted { task_id, .. } | SchedulerEvent::TaskResumed { task_id, .. } => {
                    started_on.insert(task_id.clone(), tick);
                }
                SchedulerEvent::TaskPreempted { task_id } => {
                    started_on.remove(task_id);
                }
                _ => {}
            }
            print_event(tick, &event, verbose);
        }
    }

    print_report(&scheduler.generate_report());
    Ok(())
}

fn print_event(tick: u32, event: &SchedulerEvent, verbose: bool) {
    let prefix = format!("[tick {:>3}]", tick).dimmed();
    match event {
        SchedulerEvent::TaskStarted {
            task_id,
            priority,
            wait_time_ms,
        } => println!("{} {} {} (priority {}, waited {}ms)", prefix, "start".green(), task_id, priority, wait_time_ms),
        SchedulerEvent::TaskCompleted {
            task_id, duration_ms, ..
        } => println!("{} {} {} ({}ms)", prefix, "done".blue(), task_id, duration_ms),
        SchedulerEvent::TaskPreempted { task_id } => println!("{} {} {}", prefix, "preempt".red(), task_id),
        SchedulerEvent::TaskResumed { task_id, .. } => println!("{} {} {}", prefix, "resume".yellow(), task_id),
        SchedulerEvent::TaskFailed { task_id, error, .. } => {
            println!("{} {} {}: {}", prefix, "fail".red(), task_id, error)
        }
        SchedulerEvent::PriorityChanged { task_id, priority } if verbose => {
            println!("{} {} {} -> {}", prefix, "priority".cyan(), task_id, priority)
        }
        _ => {}
    }
}

fn print_report(report: &SchedulerReport) {
    let a = &report.analytics;
    println!("\n{}", "Report".bold());
    println!("  ticks: {}  started: {}  completed: {}  failed: {}", a.ticks, a.tasks_started, a.tasks_completed, a.tasks_failed);
    println!(
        "  preemptions: {}  escalations: {}  starvation preventions: {}",
        a.preemptions, a.escalations, a.starvation_preventions
    );
    if let Some(wait) = report.average_wait_ms {
        println!("  average wait: {:.0}ms", wait);
    }

    println!("\n{}", "Queue".bold());
    println!(
        "  running {}/{}  queued {}",
        report.queue.running,
        report.queue.max_concurrent,
        report.queue.queued.len()
    );
    for (lane, count) in &report.queue.by_lane {
        println!("  {:<12} {}", lane, count);
    }

    if !report.recommendations.is_empty() {
        println!("\n{}", "Recommendations".yellow().bold());
        for rec in &report.recommendations {
            println!("  - {}", rec.message);
        }
    }
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = SchedulerConfig::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, config).context("Application failed")?;

    Ok(())
}
