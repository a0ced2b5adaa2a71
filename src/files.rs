// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Location of the two cooperating files inside a configuration directory.

use std::path::{Path, PathBuf};

/// File name of the general settings file.
pub const CONFIG_FILE: &str = "config";

/// File name of the credentials file.
pub const CREDENTIALS_FILE: &str = "credentials";

/// Suffix of backup copies.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Suffix of staged writes.
pub const STAGING_SUFFIX: &str = ".tmp";

/// Which of the two files a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `config`
    Config,
    /// `credentials`
    Credentials,
}

impl FileKind {
    /// Both kinds, in read order (credentials last so it wins collisions).
    pub const ALL: [FileKind; 2] = [FileKind::Config, FileKind::Credentials];

    /// On-disk file name.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Config => CONFIG_FILE,
            Self::Credentials => CREDENTIALS_FILE,
        }
    }
}

/// The `config` / `credentials` pair in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFiles {
    dir: PathBuf,
}

impl ConfigFiles {
    /// Files under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of one file.
    pub fn path(&self, kind: FileKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Existing files, config first.
    pub fn existing(&self) -> Vec<PathBuf> {
        FileKind::ALL
            .iter()
            .map(|kind| self.path(*kind))
            .filter(|p| p.is_file())
            .collect()
    }
}

/// `<path><suffix>` as a sibling path.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
