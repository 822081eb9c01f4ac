use std::process::Command;
use tracing::{debug, instrument, trace};

use crate::config::ListingSettings;
use crate::error::{Error, Result};

/// Anything that can report the snapshot creation times of a host.
pub trait SnapshotSource {
    /// Raw creation-time strings in the order the host reports them.
    fn list_creation_times(&self, host: &str) -> Result<Vec<String>>;
}

/// Runs a local program (PowerShell remoting, ssh, ...) that prints the
/// remote host's shadow copy listing on stdout.
#[derive(Debug, Clone)]
pub struct CommandSnapshotSource {
    program: String,
    args: Vec<String>,
    marker: String,
}

impl CommandSnapshotSource {
    pub fn new(settings: &ListingSettings) -> Self {
        Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
            marker: settings.marker.clone(),
        }
    }

    fn args_for(&self, host: &str) -> Vec<String> {
        self.args.iter().map(|a| a.replace("{host}", host)).collect()
    }
}

impl SnapshotSource for CommandSnapshotSource {
    #[instrument(skip(self), fields(program = %self.program))]
    fn list_creation_times(&self, host: &str) -> Result<Vec<String>> {
        let args = self.args_for(host);
        trace!(?args, "Executing listing command");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| Error::RemoteCall {
                host: host.to_string(),
                message: format!("failed to execute {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::RemoteCall {
                host: host.to_string(),
                message,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let times = extract_creation_times(&stdout, &self.marker);
        debug!(count = times.len(), "Listing returned snapshot times.");
        Ok(times)
    }
}

/// Picks the text following `marker` on every line that contains it.
///
/// Matching ignores ASCII case, and a `:` right after the marker is dropped,
/// so `Contained 1 shadow copies at creation time: 3/7/2019 6:00:12 PM`
/// yields `3/7/2019 6:00:12 PM`.
pub fn extract_creation_times(listing: &str, marker: &str) -> Vec<String> {
    let needle = marker.to_ascii_lowercase();
    listing
        .lines()
        .filter_map(|line| {
            let start = line.to_ascii_lowercase().find(&needle)?;
            let rest = line[start + needle.len()..].trim_start();
            let value = rest.strip_prefix(':').unwrap_or(rest).trim();
            (!value.is_empty()).then(|| value.to_string())
        })
        .collect()
}
