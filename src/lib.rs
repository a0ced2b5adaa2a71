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

//! # cred-rotator
//!
//! Rotates AWS access keys stored in the shared `config` / `credentials`
//! files.
//!
//! Several profiles often alias the same access key. The rotator groups
//! profiles by key id, rotates each key exactly once, and writes the new
//! key pair to every profile in the group.
//!
//! ## Features
//!
//! - **Line-oriented parser** for both files, including nested sub-blocks
//! - **Once-per-key rotation** with fan-out to aliased profiles
//! - **Eligibility screening**: identity check, account allow-list, key
//!   count and minimum key age
//! - **Safe write-back**: verbatim `.bak` backup, staged write, atomic rename
//! - **Pluggable remote side** via the [`CredentialService`] trait, with an
//!   IAM/STS implementation built on the AWS SDK
//!
//! ## Quick Start
//!
//! ```no_run
//! use cred_rotator::{RotatorConfig, Rotator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RotatorConfig::builder()
//!         .profiles("dev,ci")
//!         .min_key_age_days(90.0)
//!         .build()?;
//!
//!     let service = config.credential_service()?;
//!     let report = Rotator::new(config).run(&service).await?;
//!
//!     for profile in report.rotated_profiles() {
//!         println!("Successfully rolled creds for {}", profile);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Working with the store directly
//!
//! ```
//! use cred_rotator::parser::ConfigParser;
//! use cred_rotator::grouper::KeyGroups;
//!
//! let store = ConfigParser::default().parse_str(
//!     "[dev]\naws_access_key_id=AKIA1\naws_secret_access_key=s\n\n\
//!      [ci]\naws_access_key_id=AKIA1\naws_secret_access_key=s\n",
//! );
//! let groups = KeyGroups::from_store(&store);
//! assert_eq!(groups.get("AKIA1").unwrap().profiles, vec!["ci", "dev"]);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod aws;
pub mod config;
pub mod error;
pub mod files;
pub mod grouper;
pub mod parser;
pub mod planner;
pub mod rotator;
pub mod service;
pub mod store;
pub mod writer;

// Re-export main types at crate root for convenience
pub use aws::{AwsCredentialService, AwsEndpoints};
pub use config::{RotatorConfig, RotatorConfigBuilder, SettingsLoader};
pub use error::{Result, RotationStage, RotatorError};
pub use planner::{ProfileSelector, RotationOutcome, RotationReport, SkipReason};
pub use rotator::Rotator;
pub use service::{CredentialService, Identity, IssuedKey, KeyDescriptor};
pub use store::{AttributeValue, CredentialStore, ProfileRecord};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name sent with SDK requests.
pub const APP_NAME: &str = "cred-rotator";
