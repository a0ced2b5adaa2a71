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

//! In-memory model of the merged `config` + `credentials` files.
//!
//! A [`CredentialStore`] maps profile names to [`ProfileRecord`]s. Each
//! record keeps its attributes in source order; an attribute is either a
//! scalar string or a nested sub-block (`s3=` followed by indented
//! `key=value` lines).

use std::collections::BTreeMap;

use indexmap::IndexMap;

/// Attribute holding the access key id.
pub const ACCESS_KEY_ID: &str = "aws_access_key_id";

/// Attribute holding the secret access key.
pub const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";

/// Attribute holding a temporary session token.
pub const SESSION_TOKEN: &str = "aws_session_token";

/// Attribute naming the role to assume.
pub const ROLE_ARN: &str = "role_arn";

/// Attribute naming the profile whose keys assume the role.
pub const SOURCE_PROFILE: &str = "source_profile";

/// The profile that never carries the `profile ` header prefix.
pub const DEFAULT_PROFILE: &str = "default";

/// Value of a single profile attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// `key=value`
    Scalar(String),
    /// `key=` followed by indented `subkey=value` lines.
    Block(IndexMap<String, String>),
}

impl AttributeValue {
    /// Returns the scalar value, or `None` for a sub-block.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::Block(_) => None,
        }
    }

    /// Returns the sub-block, or `None` for a scalar.
    pub fn as_block(&self) -> Option<&IndexMap<String, String>> {
        match self {
            Self::Scalar(_) => None,
            Self::Block(b) => Some(b),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::Scalar(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::Scalar(s)
    }
}

/// Attributes of one named profile.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProfileRecord {
    attributes: IndexMap<String, AttributeValue>,
}

impl std::fmt::Debug for ProfileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.attributes {
            if is_secret_attribute(key) {
                map.entry(key, &"<redacted>");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

impl ProfileRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an attribute.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Look up a scalar attribute.
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttributeValue::as_scalar)
    }

    /// Set an attribute, replacing any previous value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Remove an attribute.
    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.attributes.shift_remove(key)
    }

    /// Insert into a sub-block, creating it (or replacing a scalar) if needed.
    pub fn set_block_entry(
        &mut self,
        block: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        let entry = self
            .attributes
            .entry(block.to_string())
            .or_insert_with(|| AttributeValue::Block(IndexMap::new()));
        if let AttributeValue::Scalar(_) = entry {
            *entry = AttributeValue::Block(IndexMap::new());
        }
        if let AttributeValue::Block(map) = entry {
            map.insert(key.into(), value.into());
        }
    }

    /// Iterate over attributes in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if the record has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Non-empty access key id, if any.
    pub fn access_key_id(&self) -> Option<&str> {
        self.scalar(ACCESS_KEY_ID).filter(|s| !s.is_empty())
    }

    /// Secret access key, if any.
    pub fn secret_access_key(&self) -> Option<&str> {
        self.scalar(SECRET_ACCESS_KEY)
    }

    /// Session token, if any.
    pub fn session_token(&self) -> Option<&str> {
        self.scalar(SESSION_TOKEN).filter(|s| !s.is_empty())
    }

    /// Returns true for role-assumption profiles.
    pub fn is_role_profile(&self) -> bool {
        self.attributes.contains_key(ROLE_ARN) && self.attributes.contains_key(SOURCE_PROFILE)
    }

    /// Overwrite the key pair.
    pub fn set_key_pair(&mut self, access_key_id: &str, secret_access_key: &str) {
        self.set(ACCESS_KEY_ID, access_key_id);
        self.set(SECRET_ACCESS_KEY, secret_access_key);
    }
}

/// Returns true for attributes that must never be logged.
pub fn is_secret_attribute(key: &str) -> bool {
    key == SECRET_ACCESS_KEY || key == SESSION_TOKEN
}

/// Merged view of every profile across the configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    profiles: BTreeMap<String, ProfileRecord>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a profile.
    pub fn profile(&self, name: &str) -> Option<&ProfileRecord> {
        self.profiles.get(name)
    }

    /// Mutable profile lookup.
    pub fn profile_mut(&mut self, name: &str) -> Option<&mut ProfileRecord> {
        self.profiles.get_mut(name)
    }

    /// Get a profile, creating an empty one if absent. Re-opening an
    /// existing profile keeps its attributes.
    pub fn open_profile(&mut self, name: &str) -> &mut ProfileRecord {
        self.profiles.entry(name.to_string()).or_default()
    }

    /// Returns true if the profile exists.
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Profile names in sorted order.
    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Iterate over profiles in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProfileRecord)> {
        self.profiles.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Returns true if there are no profiles.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
