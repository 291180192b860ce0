//! Clock-event records: parsing, reduction into summaries, formatting and
//! timesheet export.

mod format;
mod reducer;
mod report;
mod types;

pub use format::{format_duration, format_hm};
pub use reducer::{reduce, reduce_at};
pub use report::{
  build_timesheet, expired_record_keys, purge_expired, to_csv, TimesheetRow, UserProfile,
};
pub use types::{ClockEvent, EventKind, TimeSummary, Timeline};
