#![allow(dead_code)]

use shadowrestore_core::{Error, Mailer, Notification, Result, Settings, SnapshotSource};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::tempdir;

/// Creation times as `vssadmin` prints them. With a `+00:00` zone and the
/// default 2019 cutover the middle one resolves to `@GMT-2019.03.07-18.00.00`.
pub const LISTED_TIMES: [&str; 3] = [
    "3/6/2019 7:00:00 PM",
    "3/7/2019 7:00:00 PM",
    "3/12/2019 6:00:00 PM",
];

pub const SNAPSHOT_TOKEN: &str = "2019.03.07-18.00.00";

/// Serves a fixed listing.
pub struct FakeSource {
    pub times: Vec<String>,
}

impl FakeSource {
    pub fn boxed(times: &[&str]) -> Box<dyn SnapshotSource> {
        Box::new(Self {
            times: times.iter().map(|t| t.to_string()).collect(),
        })
    }
}

impl SnapshotSource for FakeSource {
    fn list_creation_times(&self, _host: &str) -> Result<Vec<String>> {
        Ok(self.times.clone())
    }
}

/// Behaves like an unreachable host.
pub struct UnreachableSource;

impl SnapshotSource for UnreachableSource {
    fn list_creation_times(&self, host: &str) -> Result<Vec<String>> {
        Err(Error::RemoteCall {
            host: host.to_string(),
            message: "The WinRM client cannot process the request".to_string(),
        })
    }
}

/// Keeps every notification instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub sent: Rc<RefCell<Vec<Notification>>>,
    pub fail: bool,
}

impl Mailer for RecordingMailer {
    fn send(&self, notification: &Notification) -> Result<()> {
        if self.fail {
            return Err(Error::Mail("relay refused connection".to_string()));
        }
        self.sent.borrow_mut().push(notification.clone());
        Ok(())
    }
}

/// Helper function to initialize the tracing subscriber for tests.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Sets up a mount root holding the `srv1` snapshot tree under both the
/// `share1` share and the `D$` drive share, plus settings pointing at it.
pub fn setup_test_env() -> (tempfile::TempDir, Settings) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let mount_root = temp_dir.path().join("mnt");

    for root in ["share1", "D$"] {
        let user_dir = mount_root
            .join("srv1")
            .join(root)
            .join(format!("@GMT-{}", SNAPSHOT_TOKEN))
            .join("Team")
            .join("User");
        write_snapshot_tree(&user_dir);
    }

    let mut settings = Settings::default();
    settings.paths.unc_root = Some(mount_root);
    settings.snapshots.timezone = "+00:00".to_string();

    (temp_dir, settings)
}

fn write_snapshot_tree(dir: &Path) {
    fs::create_dir_all(dir.join("drafts")).unwrap();
    fs::write(dir.join("report.docx"), "quarterly numbers").unwrap();
    fs::write(dir.join("notes.txt"), "remember the milk").unwrap();
    fs::write(dir.join("drafts").join("v1.txt"), "first draft").unwrap();
}

pub fn destination(temp_dir: &tempfile::TempDir) -> PathBuf {
    temp_dir.path().join("restored")
}

/// Names of every file below `dir`, relative and with `/` separators, sorted.
pub fn files_under(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = walkdir_files(dir)
        .into_iter()
        .map(|p| {
            p.strip_prefix(dir)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    names.sort();
    names
}

fn walkdir_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            out.extend(walkdir_files(&path));
        } else {
            out.push(path);
        }
    }
    out
}
