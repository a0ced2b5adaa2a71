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

//! One complete rotation run.
//!
//! The run backs up the existing files, parses them into a merged store,
//! screens and rotates the selected profiles, then writes both files back.
//! A dry run stops after screening and touches nothing on disk.
//!
//! # Example
//!
//! ```no_run
//! use cred_rotator::config::SettingsLoader;
//! use cred_rotator::rotator::Rotator;
//!
//! # async fn example() -> cred_rotator::Result<()> {
//! let config = SettingsLoader::new().load()?;
//! let service = config.credential_service()?;
//!
//! let report = Rotator::new(config).run(&service).await?;
//! println!("{} profile(s) rotated", report.rotated_profiles().count());
//! # Ok(())
//! # }
//! ```

use tracing::{debug, error, info};

use crate::config::RotatorConfig;
use crate::error::{Result, RotatorError};
use crate::files::ConfigFiles;
use crate::parser::{ConfigParser, ParserOptions};
use crate::planner::{RotationPlanner, RotationReport};
use crate::service::CredentialService;
use crate::writer::{ConfigWriter, backup_files};

/// Runs backup, parse, planning and write-back for one configuration directory.
#[derive(Debug, Clone)]
pub struct Rotator {
    config: RotatorConfig,
    files: ConfigFiles,
}

impl Rotator {
    /// Create a rotator for the directory named in `config`.
    pub fn new(config: RotatorConfig) -> Self {
        let files = ConfigFiles::new(config.resolved_config_dir());
        Self { config, files }
    }

    /// Settings for this run.
    pub fn config(&self) -> &RotatorConfig {
        &self.config
    }

    /// The file pair being rotated.
    pub fn files(&self) -> &ConfigFiles {
        &self.files
    }

    /// Execute the run.
    ///
    /// Fails before any remote call if neither file exists. When a create or
    /// delete call fails, rotations that completed earlier in the run are
    /// still written before the error is returned. The `.bak` copies hold
    /// the original files either way.
    pub async fn run<S: CredentialService>(&self, service: &S) -> Result<RotationReport> {
        let sources = self.files.existing();
        if sources.is_empty() {
            return Err(RotatorError::config(format!(
                "No config or credentials file found in {}",
                self.files.dir().display()
            )));
        }
        debug!("Source files: {:?}", sources);

        if !self.config.dry_run {
            backup_files(&sources)?;
        }

        let parser = ConfigParser::new(ParserOptions {
            debug: self.config.debug,
        });
        let mut store = parser.parse_files(&sources)?;
        info!(
            "Loaded {} profile(s) from {}",
            store.len(),
            self.files.dir().display()
        );

        let writer = ConfigWriter::new(self.config.writer_options());
        let planner = RotationPlanner::new(service, self.config.planner_config());
        let report = match planner.run(&mut store, &self.config.selector()).await {
            Ok(report) => report,
            Err(e) => {
                // Old keys of completed groups are already deleted remotely;
                // their new pairs exist only in the store.
                if !e.completed_rotations().is_empty() {
                    info!(
                        "Saving rotations completed before the failure: {}",
                        e.completed_rotations().join(", ")
                    );
                    if let Err(write_err) = writer.write(&store, &self.files) {
                        error!("Failed to save completed rotations: {}", write_err);
                    }
                }
                return Err(e);
            }
        };

        if self.config.dry_run {
            return Ok(report);
        }

        writer.write(&store, &self.files)?;
        Ok(report)
    }
}
