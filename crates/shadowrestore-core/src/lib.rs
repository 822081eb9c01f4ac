pub mod bucket;
pub mod config;
pub mod copy;
pub mod dst;
pub mod error;
pub mod listing;
pub mod models;
pub mod notify;
pub mod selector;
pub mod unc;

// Publicly re-export the main types for a clean external API.
pub use config::Settings;
pub use error::{Error, Result};
pub use listing::{CommandSnapshotSource, SnapshotSource};
pub use models::{
    AddressingMode, CopyOutcome, ListedSnapshot, NotifyOutcome, RestoreReport, RestoreRequest,
    SkipReason, SnapshotRecord, TimeBucket,
};
pub use notify::{Mailer, Notification, SmtpMailer};

use chrono::{Local, NaiveDateTime};
use copy::CopyRequest;
use dst::DstPolicy;
use tracing::{info, instrument, span, warn, Level};
use unc::SnapshotPath;

/// Finds the right snapshot on a host and restores data out of it.
pub struct Restorer {
    settings: Settings,
    source: Box<dyn SnapshotSource>,
    mailer: Option<Box<dyn Mailer>>,
}

impl Restorer {
    pub fn new(settings: Settings, source: Box<dyn SnapshotSource>) -> Self {
        Self {
            settings,
            source,
            mailer: None,
        }
    }

    /// Restorer that lists snapshots with the configured command.
    pub fn from_settings(settings: Settings) -> Self {
        let source = CommandSnapshotSource::new(&settings.listing);
        Self::new(settings, Box::new(source))
    }

    pub fn with_mailer(mut self, mailer: Box<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[instrument(skip_all, name = "restore_process", fields(system = %request.system, dry_run = %request.dry_run))]
    pub fn run_restore(&self, request: &RestoreRequest) -> Result<RestoreReport> {
        if request.notify.is_some() && self.mailer.is_none() && !request.dry_run {
            return Err(Error::MailerMissing);
        }

        let target = bucket::target_time(&request.date, request.bucket, &self.settings.date_formats)?;
        info!(%target, "Starting restore process...");

        let records = self.snapshot_records(&request.system, target)?;
        info!(snapshot_count = records.len(), "Snapshot listing complete.");
        let snapshot = selector::nearest_before(&records)
            .cloned()
            .ok_or(Error::NoSnapshotBefore { target })?;
        info!(created = %snapshot.created, hours_from_target = snapshot.hours_from_target, "Selected snapshot.");

        let token = self.token_for(snapshot.created)?;
        let snapshot_path =
            SnapshotPath::build(&request.system, &request.addressing, &token, &request.relative_path);
        let local_path = snapshot_path.resolve(self.settings.paths.unc_root.as_deref());
        info!(path = %snapshot_path, "Resolved snapshot path.");

        let copy = {
            let copy_span = span!(Level::INFO, "copy", destination = %request.destination.display());
            let _enter = copy_span.enter();
            copy::restore_into(
                &local_path,
                &request.destination,
                CopyRequest {
                    file: request.file.as_deref(),
                    recursive: request.recursive(),
                    dry_run: request.dry_run,
                },
            )?
        };

        let notification = self.notify(request, &snapshot, &copy)?;

        info!("Restore process finished.");
        Ok(RestoreReport {
            target,
            snapshot,
            token,
            source_path: snapshot_path.as_str().to_string(),
            copy,
            notification,
        })
    }

    /// Every snapshot on `host`, oldest first.
    ///
    /// With a target, gaps are measured from it and the snapshot a restore
    /// would use is marked; without one they are measured from now. A
    /// snapshot whose token cannot be resolved is listed without one.
    #[instrument(skip(self))]
    pub fn list_snapshots(&self, host: &str, target: Option<NaiveDateTime>) -> Result<Vec<ListedSnapshot>> {
        let reference = target.unwrap_or_else(|| Local::now().naive_local());
        let mut records = self.snapshot_records(host, reference)?;
        records.sort_by_key(|r| r.created);

        let selected = match target {
            Some(_) => selector::nearest_before(&records).map(|r| r.created),
            None => None,
        };

        Ok(records
            .into_iter()
            .map(|record| {
                let token = match self.token_for(record.created) {
                    Ok(token) => Some(token),
                    Err(e) => {
                        warn!(raw = %record.raw, error = %e, "Could not resolve snapshot token.");
                        None
                    }
                };
                ListedSnapshot {
                    token,
                    selected: selected == Some(record.created),
                    record,
                }
            })
            .collect())
    }

    pub fn target_time(&self, date: &str, bucket: TimeBucket) -> Result<NaiveDateTime> {
        bucket::target_time(date, bucket, &self.settings.date_formats)
    }

    fn snapshot_records(&self, host: &str, target: NaiveDateTime) -> Result<Vec<SnapshotRecord>> {
        let raw_times = self.source.list_creation_times(host)?;
        Ok(selector::build_records(
            &raw_times,
            target,
            &self.settings.snapshots.timestamp_formats,
        ))
    }

    fn token_for(&self, created: NaiveDateTime) -> Result<String> {
        let policy = DstPolicy::from(&self.settings.snapshots.dst);
        let zone = self.settings.snapshots.zone()?;
        dst::snapshot_token(created, &policy, &zone)
    }

    fn notify(
        &self,
        request: &RestoreRequest,
        snapshot: &SnapshotRecord,
        copy: &CopyOutcome,
    ) -> Result<NotifyOutcome> {
        let Some(recipient) = request.notify.as_deref() else {
            return Ok(NotifyOutcome::Skipped(SkipReason::NoRecipient));
        };
        if request.dry_run {
            return Ok(NotifyOutcome::Skipped(SkipReason::DryRun));
        }
        if !copy.restored_anything() {
            warn!(%recipient, "Nothing was restored, not sending a notification.");
            return Ok(NotifyOutcome::Skipped(SkipReason::NothingRestored));
        }
        let Some(mailer) = self.mailer.as_deref() else {
            return Err(Error::MailerMissing);
        };

        let notification = Notification::restore_completed(
            recipient,
            &request.system,
            &snapshot.raw,
            &request.destination,
        );
        match mailer.send(&notification) {
            Ok(()) => Ok(NotifyOutcome::Sent {
                recipient: recipient.to_string(),
            }),
            Err(e) => {
                // Data is already restored at this point.
                warn!(%recipient, error = %e, "E-mail notification failed.");
                Ok(NotifyOutcome::Failed {
                    recipient: recipient.to_string(),
                    error: e.to_string(),
                })
            }
        }
    }
}
