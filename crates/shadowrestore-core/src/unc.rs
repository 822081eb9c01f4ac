use std::fmt;
use std::path::{Path, PathBuf};

use crate::models::AddressingMode;

/// A location inside a host's `@GMT-` snapshot namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPath {
    unc: String,
}

impl SnapshotPath {
    /// `\\system\D$\@GMT-token\relative` or `\\system\share\@GMT-token\relative`.
    pub fn build(system: &str, addressing: &AddressingMode, token: &str, relative: &str) -> Self {
        let root = match addressing {
            AddressingMode::Drive(letter) => format!("{}$", letter),
            AddressingMode::Share(name) => name.clone(),
        };
        let mut unc = format!(r"\\{}\{}\@GMT-{}", system.trim_matches('\\'), root, token);

        let relative = relative.replace('/', "\\");
        let relative = relative.trim_matches('\\');
        if !relative.is_empty() {
            unc.push('\\');
            unc.push_str(relative);
        }
        Self { unc }
    }

    pub fn as_str(&self) -> &str {
        &self.unc
    }

    /// Where the path lives on this machine.
    ///
    /// With a mount root, `\\host\share\rest` maps to `<root>/host/share/rest`.
    pub fn resolve(&self, unc_root: Option<&Path>) -> PathBuf {
        match unc_root {
            Some(root) => self
                .unc
                .split('\\')
                .filter(|part| !part.is_empty())
                .fold(root.to_path_buf(), |acc, part| acc.join(part)),
            None => PathBuf::from(&self.unc),
        }
    }
}

impl fmt::Display for SnapshotPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unc)
    }
}
