use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use shiftclock::records::{self, format_duration, format_hm};
use shiftclock::{Clock, Config, ManualClock, MemoryStore, ShiftTracker, Store, SystemClock, TimeSummary};

#[derive(Parser, Debug)]
#[command(name = "shiftclock")]
#[command(about = "Summarize shift records from a document store export")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/shiftclock/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Summarize a member's current record
  Summarize {
    /// JSON export of the store
    file: PathBuf,
    #[arg(long)]
    org: String,
    #[arg(long)]
    member: String,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
    /// Evaluate at this epoch-millisecond instead of now
    #[arg(long)]
    now: Option<i64>,
  },
  /// Re-read the file periodically and print refreshed summaries
  Watch {
    file: PathBuf,
    #[arg(long)]
    org: String,
    #[arg(long)]
    member: String,
    /// Seconds between refreshes
    #[arg(long, default_value_t = 5)]
    every: u64,
  },
  /// Export completed time records as CSV
  Export {
    file: PathBuf,
    #[arg(long)]
    org: String,
  },
  /// Delete completed records older than the given number of weeks
  Purge {
    file: PathBuf,
    #[arg(long)]
    org: String,
    #[arg(long, default_value_t = 2)]
    weeks: u32,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = shiftclock::logging::init(&config.log)?;

  match args.command {
    Command::Summarize {
      file,
      org,
      member,
      json,
      now,
    } => {
      let store = Arc::new(MemoryStore::from_file(&file)?);
      let path = ShiftTracker::<MemoryStore>::events_path(&org, &member);
      let summary = match now {
        Some(ms) => {
          ShiftTracker::with_clock(store, path, &config, ManualClock::at_millis(ms))?
            .summary()
            .await?
        }
        None => ShiftTracker::new(store, path, &config)?.summary().await?,
      };
      print_summary(&summary, json)?;
    }
    Command::Watch {
      file,
      org,
      member,
      every,
    } => watch(&file, &org, &member, every, &config).await?,
    Command::Export { file, org } => {
      let store = MemoryStore::from_file(&file)?;
      let records = store.read(&records_path(&org)).await?;
      let users = store.read("users").await?;

      let rows = records::build_timesheet(
        records.value().unwrap_or(&Value::Null),
        users.value().unwrap_or(&Value::Null),
      )?;
      print!("{}", records::to_csv(&rows));
    }
    Command::Purge { file, org, weeks } => {
      let store = MemoryStore::from_file(&file)?;
      let removed = records::purge_expired(&store, &records_path(&org), SystemClock.now_millis(), weeks);

      if removed > 0 {
        let root = store.get("").into_value().unwrap_or(Value::Null);
        let contents = serde_json::to_string_pretty(&root)
          .map_err(|e| eyre!("Failed to serialize store: {}", e))?;
        std::fs::write(&file, contents)
          .map_err(|e| eyre!("Failed to write {}: {}", file.display(), e))?;
      }
      println!("Removed {} records", removed);
    }
  }

  Ok(())
}

async fn watch(file: &Path, org: &str, member: &str, every: u64, config: &Config) -> Result<()> {
  let store = Arc::new(MemoryStore::from_file(file)?);
  let path = ShiftTracker::<MemoryStore>::events_path(org, member);
  let tracker = ShiftTracker::new(Arc::clone(&store), path, config)?;

  let mut ticker = tokio::time::interval(Duration::from_secs(every.max(1)));
  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => break,
      _ = ticker.tick() => {
        match MemoryStore::from_file(file) {
          Ok(fresh) => store.write("", fresh.get("").into_value().unwrap_or(Value::Null)),
          Err(e) => warn!("Keeping previous contents: {}", e),
        }

        match tracker.refresh().await {
          Ok(Some(summary)) => print_summary(&summary, false)?,
          Ok(None) => println!("Refresh throttled, try again shortly"),
          Err(e) => warn!("Refresh failed: {}", e),
        }
      }
    }
  }

  Ok(())
}

fn records_path(org: &str) -> String {
  format!("orgs/{}/timeRecords", org)
}

fn print_summary(summary: &TimeSummary, json: bool) -> Result<()> {
  if json {
    let out = serde_json::to_string_pretty(summary)
      .map_err(|e| eyre!("Failed to serialize summary: {}", e))?;
    println!("{}", out);
    return Ok(());
  }

  let Some(origin) = summary.origin else {
    println!("No events recorded");
    return Ok(());
  };

  let since = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(origin)
    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    .unwrap_or_else(|| origin.to_string());

  println!("Job:          {}", summary.job.as_deref().unwrap_or("-"));
  println!("Since:        {}", since);
  println!(
    "Time worked:  {} ({})",
    format_duration(summary.time_worked),
    format_hm(summary.time_worked)
  );
  println!(
    "Break time:   {} ({})",
    format_duration(summary.break_time),
    format_hm(summary.break_time)
  );
  if summary.on_break {
    println!("On break for: {}", format_duration(summary.on_break_for));
  }

  Ok(())
}
