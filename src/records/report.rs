//! Timesheet export and retention for completed time records.
//!
//! Completed records live under `{org}/timeRecords`, keyed by the
//! clock-out timestamp:
//!
//! ```json
//! { "1700000000000": { "submitter": "uid", "events": { "...": { "type": "clockin", "job": "x" } } } }
//! ```
//!
//! User profiles live under `users/{uid}` with `displayName` and `email`.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::format::format_hm;
use super::reducer::reduce;
use super::types::Timeline;
use crate::cache::MemoryStore;

const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

const HEADERS: [&str; 9] = [
  "Employee",
  "E-Mail",
  "Job",
  "Date",
  "Clocked In",
  "Clocked Out",
  "Time Worked",
  "Time On Break",
  "Combined Time",
];

#[derive(Debug, Deserialize)]
struct StoredRecord {
  submitter: String,
  #[serde(default)]
  events: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
  pub display_name: String,
  pub email: String,
}

/// One completed shift, ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimesheetRow {
  pub employee: String,
  pub email: String,
  pub job: Option<String>,
  pub clocked_in: DateTime<Utc>,
  pub clocked_out: DateTime<Utc>,
  /// Milliseconds
  pub time_worked: i64,
  /// Milliseconds
  pub break_time: i64,
}

impl TimesheetRow {
  fn csv_line(&self) -> String {
    let fields = [
      self.employee.clone(),
      self.email.clone(),
      self.job.clone().unwrap_or_default(),
      self.clocked_in.format("%Y-%m-%d").to_string(),
      self.clocked_in.format("%H:%M:%S").to_string(),
      self.clocked_out.format("%H:%M:%S").to_string(),
      format_hm(self.time_worked),
      format_hm(self.break_time),
      format_hm(self.time_worked + self.break_time),
    ];
    fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",")
  }
}

/// Build one row per record that has events, in clock-out order.
///
/// `records` is the `timeRecords` object and `users` the `users` object.
/// Records whose submitter has no profile are exported with blank name and
/// e-mail.
pub fn build_timesheet(records: &Value, users: &Value) -> Result<Vec<TimesheetRow>> {
  let Some(records) = records.as_object() else {
    return Ok(Vec::new());
  };

  let mut rows = Vec::new();
  for (key, raw) in records {
    let clocked_out_ms: i64 = key
      .parse()
      .map_err(|_| eyre!("Invalid record key '{}'", key))?;
    let record: StoredRecord = serde_json::from_value(raw.clone())
      .map_err(|e| eyre!("Invalid record {}: {}", key, e))?;

    let timeline = Timeline::from_value(&record.events)?;
    if timeline.is_empty() {
      debug!("Skipping record {} without events", key);
      continue;
    }

    let summary = reduce(&timeline, clocked_out_ms);
    let profile = match users.get(&record.submitter) {
      Some(raw) => serde_json::from_value::<UserProfile>(raw.clone())
        .map_err(|e| eyre!("Invalid profile for {}: {}", record.submitter, e))?,
      None => {
        warn!("No profile for submitter {}", record.submitter);
        UserProfile::default()
      }
    };

    let origin_ms = summary.origin.unwrap_or(clocked_out_ms);
    rows.push(TimesheetRow {
      employee: profile.display_name,
      email: profile.email,
      job: summary.job,
      clocked_in: timestamp(origin_ms)?,
      clocked_out: timestamp(clocked_out_ms)?,
      time_worked: summary.time_worked,
      break_time: summary.break_time,
    });
  }

  rows.sort_by_key(|row| row.clocked_out);
  Ok(rows)
}

/// Render rows as CSV with a header line.
pub fn to_csv(rows: &[TimesheetRow]) -> String {
  let mut csv = HEADERS.join(",");
  csv.push('\n');
  for row in rows {
    csv.push_str(&row.csv_line());
    csv.push('\n');
  }
  csv
}

/// Keys of records that were closed before `threshold_ms`.
pub fn expired_record_keys(records: &Value, threshold_ms: i64) -> Vec<String> {
  let Some(records) = records.as_object() else {
    return Vec::new();
  };

  records
    .keys()
    .filter(|key| key.parse::<i64>().is_ok_and(|at| at < threshold_ms))
    .cloned()
    .collect()
}

/// Delete records older than `weeks` weeks from the `timeRecords` object at
/// `path`. Returns how many were removed.
pub fn purge_expired(store: &MemoryStore, path: &str, now_ms: i64, weeks: u32) -> usize {
  let threshold = now_ms - WEEK_MS * i64::from(weeks);
  let records = store.get(path).into_value().unwrap_or(Value::Null);
  let expired = expired_record_keys(&records, threshold);

  if !expired.is_empty() {
    let deletions: Map<String, Value> = expired.iter().map(|k| (k.clone(), Value::Null)).collect();
    store.update(path, deletions);
    debug!("Purged {} records older than {} weeks", expired.len(), weeks);
  }

  expired.len()
}

fn timestamp(ms: i64) -> Result<DateTime<Utc>> {
  DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| eyre!("Timestamp {} out of range", ms))
}

fn csv_field(value: &str) -> String {
  if value.contains([',', '"', '\n']) {
    format!("\"{}\"", value.replace('"', "\"\""))
  } else {
    value.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn records() -> Value {
    json!({
      "300000": {
        "submitter": "u1",
        "events": {
          "0": {"type": "clockin", "job": "Kitchen"},
          "100000": {"type": "break", "job": "Kitchen"},
          "200000": {"type": "endbreak", "job": "Kitchen"},
          "300000": {"type": "clockout", "job": "Kitchen"}
        }
      },
      "50000": {"submitter": "u2"}
    })
  }

  fn users() -> Value {
    json!({"u1": {"displayName": "Ada Lovelace", "email": "ada@example.com"}})
  }

  #[test]
  fn test_build_timesheet_skips_records_without_events() {
    let rows = build_timesheet(&records(), &users()).unwrap();
    assert_eq!(rows.len(), 1);

    let row = &rows[0];
    assert_eq!(row.employee, "Ada Lovelace");
    assert_eq!(row.job.as_deref(), Some("Kitchen"));
    assert_eq!(row.time_worked, 200_000);
    assert_eq!(row.break_time, 100_000);
    assert_eq!(row.clocked_in.timestamp_millis(), 0);
  }

  #[test]
  fn test_csv_output() {
    let rows = build_timesheet(&records(), &users()).unwrap();
    let csv = to_csv(&rows);
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines[0], HEADERS.join(","));
    assert_eq!(
      lines[1],
      "Ada Lovelace,ada@example.com,Kitchen,1970-01-01,00:00:00,00:05:00,00h:03m,00h:01m,00h:05m"
    );
  }

  #[test]
  fn test_csv_field_quoting() {
    assert_eq!(csv_field("plain"), "plain");
    assert_eq!(csv_field("Lovelace, Ada"), "\"Lovelace, Ada\"");
    assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
  }

  #[test]
  fn test_missing_profile_exports_blank_identity() {
    let rows = build_timesheet(&records(), &json!({})).unwrap();
    assert_eq!(rows[0].employee, "");
    assert_eq!(rows[0].email, "");
  }

  #[test]
  fn test_invalid_record_key_is_an_error() {
    let err = build_timesheet(&json!({"later": {"submitter": "u1"}}), &users()).unwrap_err();
    assert!(err.to_string().contains("later"));
  }

  #[test]
  fn test_expired_record_keys() {
    let mut keys = expired_record_keys(&records(), 100_000);
    keys.sort();
    assert_eq!(keys, vec!["50000".to_string()]);
    assert!(expired_record_keys(&Value::Null, 100_000).is_empty());
  }

  #[test]
  fn test_purge_expired_removes_old_records() {
    let store = MemoryStore::from_value(json!({"acme": {"timeRecords": records()}}));
    let now = 50_000 + WEEK_MS * 2 + 1;

    assert_eq!(purge_expired(&store, "acme/timeRecords", now, 2), 1);
    assert!(!store.get("acme/timeRecords/50000").exists());
    assert!(store.get("acme/timeRecords/300000").exists());
  }

  #[test]
  fn test_purge_keeps_recent_records() {
    let store = MemoryStore::from_value(json!({"acme": {"timeRecords": records()}}));
    assert_eq!(purge_expired(&store, "acme/timeRecords", 300_000, 2), 0);
    assert!(store.get("acme/timeRecords/300000").exists());
  }
}
