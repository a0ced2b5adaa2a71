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

//! AWS Access Key Rotation Command-Line Tool
//!
//! Rotates the access keys referenced by the shared `config` and
//! `credentials` files. Profiles sharing a key are rotated once and all
//! receive the new key pair.
//!
//! # Usage
//!
//! ```text
//! cred-rotate [OPTIONS]
//!
//! Options:
//!   -p, --profile <NAMES>       Profile name, comma list, or "all" [default: default]
//!   -d, --config-dir <DIR>      Directory holding config and credentials [default: ~/.aws/]
//!   -a, --account-ids <IDS>     Only rotate profiles in these accounts (comma list)
//!   -k, --key-age <DAYS>        Only rotate keys at least this many days old
//!   -s, --settings <PATH>       Path to a settings file
//!       --dry-run               Screen profiles without rotating or writing
//!       --debug                 Enable debug output
//!   -q, --quiet                 Suppress non-error output
//!   -h, --help                  Print help
//!   -V, --version               Print version
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Rotate the default profile
//! cred-rotate
//!
//! # Rotate two profiles if their keys are at least 90 days old
//! cred-rotate --profile dev,ci --key-age 90
//!
//! # See which profiles would be rotated
//! cred-rotate --profile all --dry-run
//! ```

use clap::Parser;
use cred_rotator::config::{RotatorConfigBuilder, SettingsLoader};
use cred_rotator::planner::parse_account_ids;
use cred_rotator::{RotationReport, Rotator};
use std::path::PathBuf;
use std::process::ExitCode;

/// AWS Access Key Rotation Tool
#[derive(Parser)]
#[command(name = "cred-rotate")]
#[command(author = "U.S. Federal Government")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rotate AWS access keys across aliased profiles", long_about = None)]
struct Cli {
    /// Profile name, comma-separated list, or "all"
    #[arg(short, long, value_name = "NAMES")]
    profile: Option<String>,

    /// Directory holding the config and credentials files
    #[arg(short = 'd', long, value_name = "DIR")]
    config_dir: Option<String>,

    /// Comma-separated list of allowed account ids
    #[arg(short, long, value_name = "IDS")]
    account_ids: Option<String>,

    /// Minimum key age in days
    #[arg(short, long, value_name = "DAYS")]
    key_age: Option<f64>,

    /// Path to a settings file
    #[arg(short, long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Screen profiles without rotating or writing
    #[arg(long)]
    dry_run: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "debug")]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Create async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let quiet = cli.quiet;
    let result = runtime.block_on(run(cli));

    match result {
        Ok(report) => {
            if !quiet {
                print_report(&report);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> cred_rotator::Result<RotationReport> {
    let mut loader = SettingsLoader::new();
    if let Some(ref path) = cli.settings {
        loader = loader.with_path(path);
    }
    let mut builder = RotatorConfigBuilder::from_config(loader.load()?);

    if let Some(profile) = cli.profile {
        builder = builder.profiles(profile);
    }
    if let Some(dir) = cli.config_dir {
        builder = builder.config_dir(dir);
    }
    if let Some(ids) = cli.account_ids {
        builder = builder.account_ids(parse_account_ids(&ids));
    }
    if let Some(days) = cli.key_age {
        builder = builder.min_key_age_days(days);
    }
    if cli.dry_run {
        builder = builder.dry_run(true);
    }
    if cli.debug {
        builder = builder.debug(true);
    }
    let config = builder.build()?;

    let service = config.credential_service()?;
    Rotator::new(config).run(&service).await
}

fn print_report(report: &RotationReport) {
    for outcome in &report.outcomes {
        if outcome.rotated {
            println!("Successfully rolled creds for {}", outcome.profile);
            let aliases: Vec<&str> = outcome
                .updated_profiles
                .iter()
                .map(String::as_str)
                .filter(|p| *p != outcome.profile)
                .collect();
            if !aliases.is_empty() {
                println!("  also updated: {}", aliases.join(", "));
            }
        } else if let Some(reason) = report.skip_reason(&outcome.profile) {
            println!("Skipping {}: {}", outcome.profile, reason);
        } else if report.eligible.contains(&outcome.profile) {
            println!("Eligible for rotation: {}", outcome.profile);
        }
    }
}
