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

//! Grouping of profiles that share one access key.
//!
//! Several profiles may hold the same `aws_access_key_id`. They form one
//! [`KeyGroup`], which is rotated at most once per run; the new pair is
//! then written to every member.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::store::CredentialStore;

/// Profiles currently holding one access key id.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyGroup {
    /// The shared access key id.
    pub access_key_id: String,
    /// Secret from the last member seen.
    pub secret_access_key: String,
    /// Member profiles, in store order.
    pub profiles: Vec<String>,
    /// Set once the key has been rotated in this run.
    pub rolled: bool,
    /// Members disagreed on the secret.
    pub conflicting_secrets: bool,
}

impl std::fmt::Debug for KeyGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGroup")
            .field("access_key_id", &self.access_key_id)
            .field("profiles", &self.profiles)
            .field("rolled", &self.rolled)
            .field("conflicting_secrets", &self.conflicting_secrets)
            .finish()
    }
}

impl KeyGroup {
    /// Returns true if `profile` is a member.
    pub fn contains(&self, profile: &str) -> bool {
        self.profiles.iter().any(|p| p == profile)
    }
}

/// Key groups indexed by access key id.
#[derive(Debug, Clone, Default)]
pub struct KeyGroups {
    groups: HashMap<String, KeyGroup>,
}

impl KeyGroups {
    /// Build the groups from a store snapshot.
    ///
    /// Profiles without a non-empty `aws_access_key_id` are skipped.
    pub fn from_store(store: &CredentialStore) -> Self {
        let mut groups: HashMap<String, KeyGroup> = HashMap::new();

        for (name, record) in store.iter() {
            let Some(key_id) = record.access_key_id() else {
                continue;
            };
            let secret = record.secret_access_key().unwrap_or_default();

            let group = groups
                .entry(key_id.to_string())
                .or_insert_with(|| KeyGroup {
                    access_key_id: key_id.to_string(),
                    secret_access_key: secret.to_string(),
                    profiles: Vec::new(),
                    rolled: false,
                    conflicting_secrets: false,
                });

            if !group.profiles.is_empty() && group.secret_access_key != secret {
                warn!(
                    "Profiles {:?} and '{}' share key {} but disagree on its secret",
                    group.profiles, name, key_id
                );
                group.conflicting_secrets = true;
            }
            group.secret_access_key = secret.to_string();
            group.profiles.push(name.to_string());
        }

        debug!("Built {} key group(s)", groups.len());
        Self { groups }
    }

    /// Look up a group by key id.
    pub fn get(&self, access_key_id: &str) -> Option<&KeyGroup> {
        self.groups.get(access_key_id)
    }

    /// Mutable lookup by key id.
    pub fn get_mut(&mut self, access_key_id: &str) -> Option<&mut KeyGroup> {
        self.groups.get_mut(access_key_id)
    }

    /// Group holding the given profile, if any.
    pub fn group_of(&self, profile: &str) -> Option<&KeyGroup> {
        self.groups.values().find(|g| g.contains(profile))
    }

    /// Iterate over all groups.
    pub fn iter(&self) -> impl Iterator<Item = &KeyGroup> {
        self.groups.values()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if no profile holds a key.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
