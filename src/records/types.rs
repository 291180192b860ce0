//! Clock events and the summary computed from them.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What happened at a point on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
  #[serde(rename = "clockin")]
  ClockIn,
  #[serde(rename = "clockout")]
  ClockOut,
  #[serde(rename = "break")]
  BreakStart,
  #[serde(rename = "endbreak")]
  BreakEnd,
}

/// A single clock event, keyed by its millisecond timestamp in a [`Timeline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockEvent {
  #[serde(rename = "type")]
  pub kind: EventKind,
  pub job: String,
}

impl ClockEvent {
  pub fn new(kind: EventKind, job: impl Into<String>) -> Self {
    Self {
      kind,
      job: job.into(),
    }
  }
}

/// Clock events ordered by numeric timestamp (epoch milliseconds).
///
/// Serializes as the store's JSON shape: an object keyed by the
/// string-encoded timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
  events: BTreeMap<i64, ClockEvent>,
}

impl Timeline {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse the store's event object, rejecting non-integer or out-of-range
  /// keys, keys that collide once parsed, and unknown event types.
  pub fn from_value(value: &Value) -> Result<Self> {
    let object = match value {
      Value::Null => return Ok(Self::new()),
      Value::Object(object) => object,
      other => return Err(eyre!("Expected an object of events, got {}", other)),
    };

    let mut timeline = Self::new();
    for (key, raw) in object {
      let timestamp: i64 = key
        .trim()
        .parse()
        .map_err(|_| eyre!("Invalid event timestamp '{}'", key))?;
      if DateTime::<Utc>::from_timestamp_millis(timestamp).is_none() {
        return Err(eyre!("Event timestamp '{}' out of range", key));
      }
      let event: ClockEvent = serde_json::from_value(raw.clone())
        .map_err(|e| eyre!("Invalid event at {}: {}", key, e))?;
      if timeline.insert(timestamp, event).is_some() {
        return Err(eyre!("Duplicate event timestamp '{}' ({})", key, timestamp));
      }
    }

    Ok(timeline)
  }

  pub fn from_json(json: &str) -> Result<Self> {
    let value: Value =
      serde_json::from_str(json).map_err(|e| eyre!("Failed to parse events: {}", e))?;
    Self::from_value(&value)
  }

  /// Add or replace the event at `timestamp`.
  pub fn insert(&mut self, timestamp: i64, event: ClockEvent) -> Option<ClockEvent> {
    self.events.insert(timestamp, event)
  }

  pub fn len(&self) -> usize {
    self.events.len()
  }

  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }

  /// Events in ascending timestamp order.
  pub fn iter(&self) -> impl Iterator<Item = (i64, &ClockEvent)> + '_ {
    self.events.iter().map(|(k, v)| (*k, v))
  }

  pub fn first(&self) -> Option<(i64, &ClockEvent)> {
    self.events.first_key_value().map(|(k, v)| (*k, v))
  }

  pub fn last(&self) -> Option<(i64, &ClockEvent)> {
    self.events.last_key_value().map(|(k, v)| (*k, v))
  }
}

impl FromIterator<(i64, ClockEvent)> for Timeline {
  fn from_iter<I: IntoIterator<Item = (i64, ClockEvent)>>(iter: I) -> Self {
    Self {
      events: iter.into_iter().collect(),
    }
  }
}

/// Aggregate work and break time for a timeline. Durations are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSummary {
  pub break_time: i64,
  pub time_worked: i64,
  pub job: Option<String>,
  /// Timestamp of the latest clock-in, or of the first event if there is none.
  pub origin: Option<i64>,
  pub on_break: bool,
  pub on_break_for: i64,
}
