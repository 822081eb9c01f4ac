//! Turns a snapshot's local creation time into the `@GMT-` namespace token.
//!
//! The listing tool reports local wall-clock time. Snapshots taken before a
//! DST rule change were recorded one hour ahead of what the namespace
//! expects, so a [`DstPolicy`] shifts them back before UTC conversion.

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};

use crate::config::{DstSettings, ZoneSetting};
use crate::error::{Error, Result};

pub const TOKEN_FORMAT: &str = "%Y.%m.%d-%H.%M.%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstPolicy {
    None,
    /// Times strictly before `before` are moved back by `shift_hours`.
    Cutover {
        before: NaiveDateTime,
        shift_hours: i64,
    },
}

impl DstPolicy {
    pub fn apply(&self, local: NaiveDateTime) -> Result<NaiveDateTime> {
        match *self {
            DstPolicy::None => Ok(local),
            DstPolicy::Cutover {
                before,
                shift_hours,
            } if local < before => Duration::try_hours(shift_hours)
                .and_then(|shift| local.checked_sub_signed(shift))
                .ok_or(Error::DstShiftOutOfRange(shift_hours)),
            DstPolicy::Cutover { .. } => Ok(local),
        }
    }
}

impl From<&DstSettings> for DstPolicy {
    fn from(settings: &DstSettings) -> Self {
        if settings.enabled {
            DstPolicy::Cutover {
                before: settings.cutover,
                shift_hours: settings.shift_hours,
            }
        } else {
            DstPolicy::None
        }
    }
}

impl ZoneSetting {
    pub fn to_utc(&self, local: NaiveDateTime) -> Result<DateTime<Utc>> {
        match self {
            ZoneSetting::Local => local_to_utc(&Local, local),
            ZoneSetting::Fixed(offset) => local_to_utc(offset, local),
        }
    }
}

/// Interprets a wall-clock time in `tz`.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times
/// skipped when clocks go forward use the offset in effect before the
/// transition, so `02:30` on a spring-forward night in UTC-5 becomes `07:30Z`.
pub fn local_to_utc<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Result<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.with_timezone(&Utc)),
        LocalResult::None => {
            let offset = local
                .checked_sub_signed(Duration::days(1))
                .and_then(|day_before| tz.offset_from_local_datetime(&day_before).earliest())
                .ok_or(Error::InvalidLocalTime(local))?
                .fix();
            local
                .checked_sub_signed(Duration::seconds(i64::from(offset.local_minus_utc())))
                .map(|naive| Utc.from_utc_datetime(&naive))
                .ok_or(Error::InvalidLocalTime(local))
        }
    }
}

/// Formats a creation time as `yyyy.MM.dd-HH.mm.ss` in UTC.
pub fn snapshot_token(
    created: NaiveDateTime,
    policy: &DstPolicy,
    zone: &ZoneSetting,
) -> Result<String> {
    let corrected = policy.apply(created)?;
    let utc = zone.to_utc(corrected)?;
    Ok(utc.format(TOKEN_FORMAT).to_string())
}
