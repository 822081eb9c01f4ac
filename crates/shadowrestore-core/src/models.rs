use std::fmt;
use std::path::PathBuf;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Coarse daily checkpoint standing in for the exact backup run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Morning,
    Noon,
    Evening,
}

impl TimeBucket {
    pub fn hour(self) -> u32 {
        match self {
            TimeBucket::Morning => 8,
            TimeBucket::Noon => 13,
            TimeBucket::Evening => 18,
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimeBucket::Morning => "morning",
            TimeBucket::Noon => "noon",
            TimeBucket::Evening => "evening",
        };
        f.write_str(label)
    }
}

/// How the snapshot namespace is reached on the remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressingMode {
    /// Administrative drive share, e.g. `D$`.
    Drive(char),
    /// Named share.
    Share(String),
}

impl AddressingMode {
    /// Builds the mode from the two optional caller inputs. Exactly one must be set.
    pub fn from_options(drive: Option<&str>, share: Option<&str>) -> Result<Self> {
        match (drive, share) {
            (Some(drive), None) => Self::drive(drive),
            (None, Some(share)) => Self::share(share),
            (Some(_), Some(_)) => Err(Error::InvalidAddressing(
                "a drive and a share were both given; pick one".to_string(),
            )),
            (None, None) => Err(Error::InvalidAddressing(
                "either a drive letter or a share name is required".to_string(),
            )),
        }
    }

    /// Accepts `D`, `D:` or `D$`.
    pub fn drive(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_end_matches([':', '$']);
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) if letter.is_ascii_alphabetic() => {
                Ok(AddressingMode::Drive(letter.to_ascii_uppercase()))
            }
            _ => Err(Error::InvalidAddressing(format!(
                "'{}' is not a drive letter",
                input
            ))),
        }
    }

    pub fn share(input: &str) -> Result<Self> {
        let name = input.trim().trim_matches('\\');
        if name.is_empty() || name.contains(['\\', '/']) {
            return Err(Error::InvalidAddressing(format!(
                "'{}' is not a share name",
                input
            )));
        }
        Ok(AddressingMode::Share(name.to_string()))
    }

    /// Share mode copies whole trees unless told otherwise; drive mode does not.
    pub fn recursive_by_default(&self) -> bool {
        matches!(self, AddressingMode::Share(_))
    }
}

/// Everything the caller supplies for one restore.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub date: String,
    pub bucket: TimeBucket,
    pub system: String,
    pub addressing: AddressingMode,
    pub relative_path: String,
    pub file: Option<String>,
    pub destination: PathBuf,
    /// Overrides the addressing mode's default when set.
    pub recursive: Option<bool>,
    pub notify: Option<String>,
    pub dry_run: bool,
}

impl RestoreRequest {
    pub fn recursive(&self) -> bool {
        self.recursive
            .unwrap_or_else(|| self.addressing.recursive_by_default())
    }
}

/// A snapshot creation time as listed by the remote host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Text exactly as the listing tool printed it.
    pub raw: String,
    pub created: NaiveDateTime,
    /// `target - created`, in hours. Negative means the snapshot is after the target.
    pub hours_from_target: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    FileNotInSnapshot { name: String },
    RecursiveNotRequested,
    NoRecipient,
    NothingRestored,
    DryRun,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FileNotInSnapshot { name } => {
                write!(f, "'{}' does not exist in the snapshot", name)
            }
            SkipReason::RecursiveNotRequested => {
                f.write_str("no file was named and recursive copy is off")
            }
            SkipReason::NoRecipient => f.write_str("no recipient was given"),
            SkipReason::NothingRestored => f.write_str("nothing was restored"),
            SkipReason::DryRun => f.write_str("dry run"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CopyOutcome {
    Copied { files: usize, bytes: u64 },
    NotFound { path: PathBuf },
    Skipped(SkipReason),
}

impl CopyOutcome {
    pub fn restored_anything(&self) -> bool {
        matches!(self, CopyOutcome::Copied { files, .. } if *files > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotifyOutcome {
    Sent { recipient: String },
    Failed { recipient: String, error: String },
    Skipped(SkipReason),
}

/// Result of one restore run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    pub target: NaiveDateTime,
    pub snapshot: SnapshotRecord,
    pub token: String,
    pub source_path: String,
    pub copy: CopyOutcome,
    pub notification: NotifyOutcome,
}

impl RestoreReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One line of `list` output: the record plus the token it resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListedSnapshot {
    #[serde(flatten)]
    pub record: SnapshotRecord,
    /// `None` when the creation time could not be turned into a token.
    pub token: Option<String>,
    pub selected: bool,
}
