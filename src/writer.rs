// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Backup and write-back of the `config` / `credentials` pair.
//!
//! Before anything is rewritten, each existing file is copied byte for
//! byte to `<file>.bak` and synced. New content is written to
//! `<file>.tmp`, synced, then renamed over the original. Both side files
//! are created fresh with mode `0o600` before any byte is written.
//!
//! Attribute placement:
//!
//! | attribute                                   | `config` | `credentials` |
//! |---------------------------------------------|----------|---------------|
//! | `aws_access_key_id`, `aws_secret_access_key`, `aws_session_token` | no | yes |
//! | `role_arn`, `source_profile`                | yes      | if enabled    |
//! | everything else (sub-blocks included)       | yes      | no            |
//!
//! Comments are not preserved.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, RotatorError};
use crate::files::{BACKUP_SUFFIX, ConfigFiles, FileKind, STAGING_SUFFIX, with_suffix};
use crate::store::{
    ACCESS_KEY_ID, AttributeValue, CredentialStore, DEFAULT_PROFILE, ROLE_ARN, SECRET_ACCESS_KEY,
    SESSION_TOKEN, SOURCE_PROFILE,
};

/// Copy every file to `<file>.bak`, flushed to disk.
///
/// Returns the backup paths.
pub fn backup_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>> {
    let mut backups = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let backup = with_suffix(path, BACKUP_SUFFIX);

        let mut src = File::open(path).map_err(|e| RotatorError::io(path, e))?;
        let mut dst = create_private(&backup)?;
        std::io::copy(&mut src, &mut dst).map_err(|e| RotatorError::io(&backup, e))?;
        dst.sync_all().map_err(|e| RotatorError::io(&backup, e))?;
        copy_permissions(path, &backup)?;

        info!("Backed up {} to {}", path.display(), backup.display());
        backups.push(backup);
    }
    Ok(backups)
}

/// Options controlling placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Also write `role_arn` / `source_profile` to the credentials file.
    pub role_links_in_credentials: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            role_links_in_credentials: true,
        }
    }
}

/// Serializes a [`CredentialStore`] back to disk.
#[derive(Debug, Clone, Default)]
pub struct ConfigWriter {
    options: WriterOptions,
}

impl ConfigWriter {
    /// Create a writer.
    pub fn new(options: WriterOptions) -> Self {
        Self { options }
    }

    /// Rewrite both files in `files`.
    pub fn write(&self, store: &CredentialStore, files: &ConfigFiles) -> Result<()> {
        for kind in FileKind::ALL {
            let path = files.path(kind);
            let content = self.render(store, kind);
            write_atomic(&path, &content)?;
            info!("Wrote {}", path.display());
        }
        Ok(())
    }

    /// Render one file.
    pub fn render(&self, store: &CredentialStore, kind: FileKind) -> String {
        let mut out = String::new();

        for (name, record) in store.iter() {
            let attributes: Vec<_> = record
                .iter()
                .filter(|(key, _)| self.belongs_in(key, kind))
                .collect();

            if kind == FileKind::Credentials && attributes.is_empty() {
                continue;
            }

            if kind == FileKind::Config && name != DEFAULT_PROFILE {
                out.push_str(&format!("[profile {name}]\n"));
            } else {
                out.push_str(&format!("[{name}]\n"));
            }

            for (key, value) in attributes {
                match value {
                    AttributeValue::Scalar(v) => out.push_str(&format!("{key}={v}\n")),
                    AttributeValue::Block(block) => {
                        out.push_str(&format!("{key}=\n"));
                        for (sub_key, sub_value) in block {
                            out.push_str(&format!("\t{sub_key}={sub_value}\n"));
                        }
                    }
                }
            }
            out.push('\n');
        }

        out
    }

    fn belongs_in(&self, key: &str, kind: FileKind) -> bool {
        let credential = matches!(key, ACCESS_KEY_ID | SECRET_ACCESS_KEY | SESSION_TOKEN);
        let role_link = matches!(key, ROLE_ARN | SOURCE_PROFILE);
        match kind {
            FileKind::Config => !credential,
            FileKind::Credentials => {
                credential || (role_link && self.options.role_links_in_credentials)
            }
        }
    }
}

/// Write `content` to `<path>.tmp`, sync, and rename over `path`.
///
/// The staging file is removed again if any step fails.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let staging = with_suffix(path, STAGING_SUFFIX);
    debug!("Staging {}", staging.display());

    let result = stage_and_rename(path, &staging, content);
    if result.is_err() && staging.exists() {
        if let Err(e) = fs::remove_file(&staging) {
            warn!("Could not remove {}: {}", staging.display(), e);
        }
    }
    result
}

fn stage_and_rename(path: &Path, staging: &Path, content: &str) -> Result<()> {
    let mut file = create_private(staging)?;
    file.write_all(content.as_bytes())
        .map_err(|e| RotatorError::io(staging, e))?;
    file.sync_all().map_err(|e| RotatorError::io(staging, e))?;
    drop(file);

    // New files keep the private mode
    if path.exists() {
        copy_permissions(path, staging)?;
    }

    fs::rename(staging, path).map_err(|e| RotatorError::io(path, e))
}

/// Create `path` owner-only, replacing any leftover file of that name.
///
/// The mode only applies to newly created files, so a stale file is
/// removed first rather than reused.
fn create_private(path: &Path) -> Result<File> {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed stale {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(RotatorError::io(path, e)),
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).map_err(|e| RotatorError::io(path, e))
}

fn copy_permissions(from: &Path, to: &Path) -> Result<()> {
    let permissions = fs::metadata(from)
        .map_err(|e| RotatorError::io(from, e))?
        .permissions();
    fs::set_permissions(to, permissions).map_err(|e| RotatorError::io(to, e))
}
