//! Human-readable renderings of millisecond durations.

const SECOND: u64 = 1_000;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Largest whole unit in the duration, e.g. `"1 Hour"`, `"2 Hours"`.
pub fn format_duration(ms: i64) -> String {
  let sign = if ms < 0 { "-" } else { "" };
  let ms = ms.unsigned_abs();

  let (count, unit) = if ms >= DAY {
    (ms / DAY, "Day")
  } else if ms >= HOUR {
    (ms / HOUR, "Hour")
  } else if ms >= MINUTE {
    (ms / MINUTE, "Minute")
  } else {
    (ms / SECOND, "Second")
  };

  let plural = if count == 1 { "" } else { "s" };
  format!("{}{} {}{}", sign, count, unit, plural)
}

/// Hours and minutes within a day, zero padded: `"08h:05m"`.
pub fn format_hm(ms: i64) -> String {
  let sign = if ms < 0 { "-" } else { "" };
  let ms = ms.unsigned_abs();

  let hours = (ms % DAY) / HOUR;
  let minutes = (ms % HOUR) / MINUTE;
  format!("{}{:02}h:{:02}m", sign, hours, minutes)
}
