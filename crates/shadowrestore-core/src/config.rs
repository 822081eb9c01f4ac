use crate::error::{Error, Result};
use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How snapshots are listed on the remote host.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ListingSettings {
    /// Program to run locally; it is expected to reach the remote host itself.
    pub program: String,
    /// Arguments; every `{host}` is replaced by the system name.
    pub args: Vec<String>,
    /// Lines containing this text (case-insensitive) carry a creation time.
    pub marker: String,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            program: "powershell".to_string(),
            args: vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                "Invoke-Command -ComputerName {host} -ScriptBlock { vssadmin list shadows }"
                    .to_string(),
            ],
            marker: "creation time".to_string(),
        }
    }
}

/// Correction for snapshots recorded in local time across a DST rule change.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DstSettings {
    pub enabled: bool,
    /// Snapshots created strictly before this local time get shifted.
    pub cutover: NaiveDateTime,
    pub shift_hours: i64,
}

impl Default for DstSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cutover: NaiveDate::from_ymd_opt(2019, 3, 10)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            shift_hours: 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SnapshotSettings {
    /// chrono formats tried in order against each listed creation time.
    pub timestamp_formats: Vec<String>,
    /// Zone the listing tool reports in: `local` or a fixed offset like `+01:00`.
    pub timezone: String,
    pub dst: DstSettings,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            timestamp_formats: vec![
                "%m/%d/%Y %I:%M:%S %p".to_string(),
                "%m/%d/%Y %H:%M:%S".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
            ],
            timezone: "local".to_string(),
            dst: DstSettings::default(),
        }
    }
}

/// The zone snapshot timestamps are interpreted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSetting {
    Local,
    Fixed(FixedOffset),
}

impl SnapshotSettings {
    pub fn zone(&self) -> Result<ZoneSetting> {
        let value = self.timezone.trim();
        if value.eq_ignore_ascii_case("local") {
            return Ok(ZoneSetting::Local);
        }
        if value.eq_ignore_ascii_case("utc") {
            return Ok(ZoneSetting::Fixed(FixedOffset::east_opt(0).ok_or_else(|| {
                Error::Custom("UTC offset out of range".to_string())
            })?));
        }
        value
            .parse::<FixedOffset>()
            .map(ZoneSetting::Fixed)
            .map_err(|e| Error::Custom(format!("Invalid timezone '{}': {}", value, e)))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PathSettings {
    /// Local directory where `\\host\share` trees are mounted as `<root>/host/share`.
    pub unc_root: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MailSettings {
    /// SMTP relay host.
    pub relay: String,
    pub port: u16,
    /// From address.
    pub sender: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            relay: String::new(),
            port: 25,
            sender: String::new(),
            username: None,
            password: None,
        }
    }
}

impl MailSettings {
    /// Fails on the first required field left blank.
    pub fn validate(&self) -> Result<()> {
        if self.relay.trim().is_empty() {
            return Err(Error::MailNotConfigured("mail.relay"));
        }
        if self.sender.trim().is_empty() {
            return Err(Error::MailNotConfigured("mail.sender"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// chrono formats accepted for the requested calendar date.
    pub date_formats: Vec<String>,

    /// Directory for daily log files. Console only when unset.
    pub log_dir: Option<PathBuf>,

    pub listing: ListingSettings,

    pub snapshots: SnapshotSettings,

    pub paths: PathSettings,

    pub mail: MailSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            date_formats: vec![
                "%Y-%m-%d".to_string(),
                "%m/%d/%Y".to_string(),
                "%d.%m.%Y".to_string(),
            ],
            log_dir: None,
            listing: ListingSettings::default(),
            snapshots: SnapshotSettings::default(),
            paths: PathSettings::default(),
            mail: MailSettings::default(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "shadowrestore").ok_or(Error::HomeDirNotFound)?;
        Ok(dirs.config_dir().join("settings.toml"))
    }

    /// Loads the default config file (if any) layered under `SHADOWRESTORE_*` env vars.
    pub fn new() -> Result<Self> {
        Self::load(&Self::config_path()?, false)
    }

    /// Loads an explicit config file, which must exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load(path, true)
    }

    fn load(path: &Path, required: bool) -> Result<Self> {
        let config_builder = config::Config::builder()
            .add_source(config::File::from(path).required(required))
            .add_source(
                config::Environment::with_prefix("SHADOWRESTORE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        let settings: Settings = config_builder.try_deserialize().map_err(Error::Config)?;
        settings.snapshots.zone()?;
        Ok(settings)
    }
}
