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

//! Eligibility screening and once-per-key rotation.
//!
//! A run makes two passes over the requested profiles:
//!
//! 1. **Screening** (no mutation): the profile must exist, its session must
//!    validate (and belong to an allowed account, if an allow-list is set),
//!    it must hold exactly one remote key, and that key must be at least
//!    `min_key_age_days` old.
//! 2. **Rotation**: for each eligible profile whose key group has not been
//!    rolled yet, the key is replaced once and the new pair is written to
//!    every profile of the group.
//!
//! Screening failures skip the profile. Create/delete failures abort the
//! run, since the remote side may then be half rotated. Groups rotated
//! before the failure stay applied to the store and are named in the error.
//!
//! # Example
//!
//! ```no_run
//! use cred_rotator::aws::{AwsCredentialService, AwsEndpoints};
//! use cred_rotator::files::ConfigFiles;
//! use cred_rotator::parser::ConfigParser;
//! use cred_rotator::planner::{PlannerConfig, ProfileSelector, RotationPlanner};
//!
//! # async fn example() -> cred_rotator::Result<()> {
//! let mut store = ConfigParser::default().parse_files(&["/home/me/.aws/credentials"])?;
//! let service =
//!     AwsCredentialService::new(AwsEndpoints::default(), ConfigFiles::new("/home/me/.aws"));
//! let planner = RotationPlanner::new(&service, PlannerConfig::default());
//!
//! let report = planner.run(&mut store, &ProfileSelector::parse("dev,ci")).await?;
//! for profile in report.rotated_profiles() {
//!     println!("rotated {profile}");
//! }
//! # Ok(())
//! # }
//! ```

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::{Result, RotationStage, RotatorError};
use crate::grouper::KeyGroups;
use crate::service::{CredentialService, KeyDescriptor};
use crate::store::CredentialStore;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Which profiles a run should consider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSelector {
    /// Every profile in the merged store.
    All,
    /// Explicit names, in request order.
    Names(Vec<String>),
}

impl ProfileSelector {
    /// Parse `all`, a single name, or a comma-separated list.
    pub fn parse(s: &str) -> Self {
        if s.trim() == "all" {
            return Self::All;
        }
        let mut names: Vec<String> = Vec::new();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        Self::Names(names)
    }

    /// Expand against a store.
    pub fn resolve(&self, store: &CredentialStore) -> Vec<String> {
        match self {
            Self::All => store.profile_names(),
            Self::Names(names) => names.clone(),
        }
    }
}

impl std::fmt::Display for ProfileSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Names(names) => write!(f, "{}", names.join(",")),
        }
    }
}

/// Split a comma-separated account allow-list.
pub fn parse_account_ids(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Planner settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannerConfig {
    /// Allowed accounts. Empty means any account.
    pub account_ids: Vec<String>,
    /// Minimum age of the current key, in days.
    pub min_key_age_days: f64,
    /// Dump store and group snapshots at debug level.
    pub debug: bool,
    /// Stop after screening.
    pub dry_run: bool,
}

/// Why a requested profile was not rotated.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Not present in any configuration file.
    UnknownProfile,
    /// No session could be established.
    SessionUnavailable(String),
    /// The identity check failed.
    IdentityInvalid(String),
    /// The identity belongs to an account outside the allow-list.
    AccountNotAllowed {
        /// Account reported by the identity check.
        account_id: String,
    },
    /// Remote keys could not be listed.
    KeyListingFailed(String),
    /// The user has no remote key.
    NoRemoteKey,
    /// The user has more than one remote key.
    MultipleRemoteKeys {
        /// Number of keys found.
        count: usize,
    },
    /// The current key is younger than the threshold.
    KeyTooYoung {
        /// Current key age in days.
        age_days: f64,
        /// Configured minimum.
        min_days: f64,
    },
    /// The profile's key is not tracked by any key group.
    NotInKeyGroup,
    /// The profile's key group was already rotated in this run.
    AlreadyRotated {
        /// Key id the profile held when the run started.
        access_key_id: String,
    },
    /// The remote keys changed between screening and rotation.
    RemoteStateChanged(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownProfile => write!(f, "profile not found in configuration"),
            Self::SessionUnavailable(e) => write!(f, "cannot open session: {e}"),
            Self::IdentityInvalid(e) => write!(f, "invalid session: {e}"),
            Self::AccountNotAllowed { account_id } => {
                write!(f, "account {account_id} is not in the allowed account list")
            }
            Self::KeyListingFailed(e) => write!(f, "cannot list access keys: {e}"),
            Self::NoRemoteKey => write!(f, "no access key exists for this user"),
            Self::MultipleRemoteKeys { count } => {
                write!(f, "{count} access keys exist for this user, expected 1")
            }
            Self::KeyTooYoung { age_days, min_days } => {
                write!(f, "key is {age_days:.1} days old, minimum age is {min_days} days")
            }
            Self::NotInKeyGroup => write!(f, "profile has no local access key"),
            Self::AlreadyRotated { access_key_id } => {
                write!(f, "key {access_key_id} was already rotated in this run")
            }
            Self::RemoteStateChanged(e) => write!(f, "remote keys changed: {e}"),
        }
    }
}

/// Per-profile record of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    /// Profile name.
    pub profile: String,
    /// Key id held when the run started (empty if none).
    pub previous_key_id: String,
    /// True if this profile triggered a rotation.
    pub rotated: bool,
    /// Key id issued by the rotation.
    pub new_key_id: Option<String>,
    /// Every profile that received the new pair.
    pub updated_profiles: Vec<String>,
}

/// Result of a planner run.
#[derive(Debug, Clone, Default)]
pub struct RotationReport {
    /// One entry per requested profile, in request order.
    pub outcomes: Vec<RotationOutcome>,
    /// Profiles that passed screening.
    pub eligible: Vec<String>,
    /// Rejected profiles with the reason.
    pub skipped: Vec<(String, SkipReason)>,
}

impl RotationReport {
    /// Profiles that triggered a rotation.
    pub fn rotated_profiles(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.rotated)
            .map(|o| o.profile.as_str())
    }

    /// Returns true if any key was rotated, i.e. the store changed.
    pub fn has_changes(&self) -> bool {
        self.outcomes.iter().any(|o| o.rotated)
    }

    /// Skip reason for a profile, if it was skipped.
    pub fn skip_reason(&self, profile: &str) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|(p, _)| p == profile)
            .map(|(_, r)| r)
    }

    fn skip(&mut self, profile: &str, reason: SkipReason) {
        warn!("Skipping {}: {}", profile, reason);
        self.skipped.push((profile.to_string(), reason));
    }

    fn outcome_mut(&mut self, profile: &str) -> Option<&mut RotationOutcome> {
        self.outcomes.iter_mut().find(|o| o.profile == profile)
    }
}

/// Drives screening and rotation against a [`CredentialService`].
pub struct RotationPlanner<'a, S: CredentialService> {
    service: &'a S,
    config: PlannerConfig,
}

impl<'a, S: CredentialService> RotationPlanner<'a, S> {
    /// Create a planner.
    pub fn new(service: &'a S, config: PlannerConfig) -> Self {
        Self { service, config }
    }

    /// Planner settings.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Screen and rotate the selected profiles, updating `store` in place.
    pub async fn run(
        &self,
        store: &mut CredentialStore,
        selector: &ProfileSelector,
    ) -> Result<RotationReport> {
        let requested = selector.resolve(store);
        let mut groups = KeyGroups::from_store(store);
        if self.config.debug {
            debug!("Credential store: {:?}", store);
            debug!("Key groups: {:?}", groups);
        }
        debug!("Profiles to rotate: {:?}", requested);

        let mut report = RotationReport::default();

        // Pass 1: screening.
        for name in &requested {
            let previous_key_id = store
                .profile(name)
                .and_then(|r| r.access_key_id())
                .unwrap_or_default()
                .to_string();
            report.outcomes.push(RotationOutcome {
                profile: name.clone(),
                previous_key_id,
                rotated: false,
                new_key_id: None,
                updated_profiles: Vec::new(),
            });

            match self.screen(store, name).await {
                Ok(()) => report.eligible.push(name.clone()),
                Err(reason) => report.skip(name, reason),
            }
        }
        debug!("Eligible profiles: {:?}", report.eligible);

        if self.config.dry_run {
            info!("Dry run: {} profile(s) eligible", report.eligible.len());
            return Ok(report);
        }

        // Pass 2: rotation. `completed` lists profiles whose new key is
        // already in the store, so a later failure can report them.
        let eligible = report.eligible.clone();
        let mut completed: Vec<String> = Vec::new();
        for name in &eligible {
            let previous = report
                .outcome_mut(name)
                .map(|o| o.previous_key_id.clone())
                .unwrap_or_default();

            if !store.contains(name) {
                report.skip(name, SkipReason::UnknownProfile);
                continue;
            }
            match groups.get(&previous) {
                Some(group) if group.contains(name) => {
                    if group.rolled {
                        report.skip(
                            name,
                            SkipReason::AlreadyRotated {
                                access_key_id: previous.clone(),
                            },
                        );
                        continue;
                    }
                }
                _ => {
                    report.skip(name, SkipReason::NotInKeyGroup);
                    continue;
                }
            }

            let session = match self.open_validated(store, name).await {
                Ok(session) => session,
                Err(reason) => {
                    report.skip(name, reason);
                    continue;
                }
            };

            let keys = match self.service.list_keys(&session).await {
                Ok(keys) => keys,
                Err(e) => {
                    report.skip(name, SkipReason::KeyListingFailed(e.to_string()));
                    continue;
                }
            };
            let old_key = match keys.as_slice() {
                [only] => only.id.clone(),
                other => {
                    report.skip(
                        name,
                        SkipReason::RemoteStateChanged(format!(
                            "{} access keys found at rotation time",
                            other.len()
                        )),
                    );
                    continue;
                }
            };

            info!("Rotating creds for profile {}", name);
            let issued = self.service.create_key(&session).await.map_err(|e| {
                RotatorError::rotation_failed(
                    name.as_str(),
                    RotationStage::Create,
                    format!("old key {old_key} is unchanged and still active: {e}"),
                    completed.clone(),
                )
            })?;

            let members = match groups.get_mut(&previous) {
                Some(group) => {
                    group.rolled = true;
                    group.profiles.clone()
                }
                None => Vec::new(),
            };

            self.service
                .delete_key(&session, &old_key)
                .await
                .map_err(|e| {
                    RotatorError::rotation_failed(
                        name.as_str(),
                        RotationStage::Delete,
                        format!(
                            "new key {} was issued but old key {} is still active; the new \
                             key is not saved to the files: {e}",
                            issued.access_key_id, old_key
                        ),
                        completed.clone(),
                    )
                })?;

            let mut updated = Vec::new();
            for member in &members {
                if let Some(record) = store.profile_mut(member) {
                    if record.access_key_id().is_some() {
                        debug!("Updating creds for profile {}", member);
                        record.set_key_pair(&issued.access_key_id, &issued.secret_access_key);
                        updated.push(member.clone());
                    }
                }
            }

            completed.extend(updated.iter().cloned());
            if let Some(outcome) = report.outcome_mut(name) {
                outcome.rotated = true;
                outcome.new_key_id = Some(issued.access_key_id.clone());
                outcome.updated_profiles = updated;
            }
            info!("Successfully rolled creds for {}", name);
        }

        Ok(report)
    }

    /// Pass 1 checks for a single profile.
    async fn screen(&self, store: &CredentialStore, name: &str) -> std::result::Result<(), SkipReason> {
        if !store.contains(name) {
            return Err(SkipReason::UnknownProfile);
        }

        let session = self.open_validated(store, name).await?;

        let keys = self
            .service
            .list_keys(&session)
            .await
            .map_err(|e| SkipReason::KeyListingFailed(e.to_string()))?;
        debug!("Remote keys for {}: {:?}", name, keys);

        check_keys(&keys, self.config.min_key_age_days, OffsetDateTime::now_utc())
    }

    /// Open a session and check the identity behind it.
    async fn open_validated(
        &self,
        store: &CredentialStore,
        name: &str,
    ) -> std::result::Result<S::Session, SkipReason> {
        let record = store.profile(name).ok_or(SkipReason::UnknownProfile)?;

        let session = self
            .service
            .open_session(name, record)
            .await
            .map_err(|e| SkipReason::SessionUnavailable(e.to_string()))?;

        let identity = self
            .service
            .validate_identity(&session)
            .await
            .map_err(|e| SkipReason::IdentityInvalid(e.to_string()))?;
        debug!("Session for {} belongs to {}", name, identity.arn);

        if !self.config.account_ids.is_empty()
            && !self.config.account_ids.contains(&identity.account_id)
        {
            return Err(SkipReason::AccountNotAllowed {
                account_id: identity.account_id,
            });
        }

        Ok(session)
    }
}

/// Key-count and key-age rules for screening.
pub fn check_keys(
    keys: &[KeyDescriptor],
    min_key_age_days: f64,
    now: OffsetDateTime,
) -> std::result::Result<(), SkipReason> {
    match keys {
        [] => Err(SkipReason::NoRemoteKey),
        [key] => {
            let age_days = key_age_days(key, now);
            if age_days < min_key_age_days {
                Err(SkipReason::KeyTooYoung {
                    age_days,
                    min_days: min_key_age_days,
                })
            } else {
                Ok(())
            }
        }
        many => Err(SkipReason::MultipleRemoteKeys { count: many.len() }),
    }
}

/// Age of a key in fractional days.
pub fn key_age_days(key: &KeyDescriptor, now: OffsetDateTime) -> f64 {
    (now - key.created).as_seconds_f64() / SECONDS_PER_DAY
}
