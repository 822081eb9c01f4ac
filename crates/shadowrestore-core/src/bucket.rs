use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::TimeBucket;

/// Combines a calendar date with a bucket's fixed hour.
///
/// The date is tried against `formats` in order; the first that parses wins.
pub fn target_time<S: AsRef<str>>(
    date: &str,
    bucket: TimeBucket,
    formats: &[S],
) -> Result<NaiveDateTime> {
    let input = date.trim();
    let day = formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt.as_ref()).ok())
        .ok_or_else(|| Error::DateParse {
            input: date.to_string(),
        })?;

    let target = day
        .and_hms_opt(bucket.hour(), 0, 0)
        .ok_or_else(|| Error::Custom(format!("Invalid hour for bucket {}", bucket)))?;
    debug!(%date, %bucket, %target, "Resolved target time.");
    Ok(target)
}
