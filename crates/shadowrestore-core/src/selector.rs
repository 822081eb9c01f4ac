use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::models::SnapshotRecord;

/// Parses listed creation times into records measured against `target`.
///
/// Entries no format understands are logged and dropped. Repeated creation
/// times keep the first entry seen.
pub fn build_records<S: AsRef<str>>(
    raw_times: &[String],
    target: NaiveDateTime,
    formats: &[S],
) -> Vec<SnapshotRecord> {
    let mut records: Vec<SnapshotRecord> = Vec::with_capacity(raw_times.len());

    for raw in raw_times {
        let text = raw.trim();
        let Some(created) = parse_timestamp(text, formats) else {
            warn!(raw = %text, "Could not parse snapshot creation time, skipping.");
            continue;
        };
        if records.iter().any(|r| r.created == created) {
            debug!(raw = %text, "Duplicate snapshot time, keeping the first entry.");
            continue;
        }
        let gap = target.signed_duration_since(created);
        records.push(SnapshotRecord {
            raw: text.to_string(),
            created,
            hours_from_target: gap.num_seconds() as f64 / 3600.0,
        });
    }

    records
}

pub fn parse_timestamp<S: AsRef<str>>(text: &str, formats: &[S]) -> Option<NaiveDateTime> {
    formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt.as_ref()).ok())
}

/// The snapshot closest to, but not after, the target.
pub fn nearest_before(records: &[SnapshotRecord]) -> Option<&SnapshotRecord> {
    records
        .iter()
        .filter(|r| r.hours_from_target >= 0.0)
        // min_by keeps the first of equal elements
        .min_by(|a, b| a.hours_from_target.total_cmp(&b.hours_from_target))
}
