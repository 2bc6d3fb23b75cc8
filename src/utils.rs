/// Utility functions for time formatting
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Wire format for report timestamps, e.g. `2024-03-10T10:15:00Z`
const REPORT_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Human-readable format for log lines
const LOG_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day].[month].[year] - [hour]:[minute]:[second]");

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    dt.format(LOG_TIME_FORMAT).unwrap_or_else(|_| dt.to_string())
}

/// Format a timestamp for the report body
///
/// The instant is converted to UTC calendar fields first, so the trailing
/// `Z` is always truthful regardless of the offset the value carries.
pub fn format_report_time(dt: &OffsetDateTime) -> Result<String, time::error::Format> {
    dt.to_offset(UtcOffset::UTC).format(REPORT_TIME_FORMAT)
}
