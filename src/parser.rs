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

//! Line-oriented reader for the shared `config` and `credentials` files.
//!
//! Each line is classified in a fixed priority order:
//!
//! 1. blank line: clears the current profile and sub-block
//! 2. `[name]` / `[profile name]`: opens (or re-opens) a profile
//! 3. `key=` with an alphanumeric key: opens a sub-block
//! 4. indented `subkey=value` while a sub-block is open: sub-block entry
//! 5. `#...`: comment, ignored
//! 6. anything else: `key=value` attribute, spaces stripped
//!
//! Nothing here is fatal except failing to read a file. Lines that cannot
//! be attached to a profile are dropped with a warning.
//!
//! Spaces are removed from both key and value of plain attributes. A value
//! that genuinely contains spaces comes back without them; the files have
//! always been normalized this way, so the behavior is kept.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, RotatorError};
use crate::store::{AttributeValue, CredentialStore};

/// Options controlling the parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// Trace every classified line at debug level.
    pub debug: bool,
}

/// Classification of one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Header(&'a str),
    BlockOpener(&'a str),
    BlockValue { key: String, value: &'a str },
    Comment,
    Attribute { key: String, value: String },
}

fn classify(line: &str, block_active: bool) -> Line<'_> {
    if line.trim().is_empty() {
        return Line::Blank;
    }

    let trimmed = line.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
        return Line::Header(profile_name(&trimmed[1..trimmed.len() - 1]));
    }

    if let Some(key) = line.strip_suffix('=') {
        if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Line::BlockOpener(key);
        }
    }

    if block_active && line.starts_with(char::is_whitespace) {
        if let Some((key, value)) = line.split_once('=') {
            return Line::BlockValue {
                key: key.replace('\t', ""),
                value,
            };
        }
    }

    if line.starts_with('#') {
        return Line::Comment;
    }

    let (key, value) = line.split_once('=').unwrap_or((line, ""));
    Line::Attribute {
        key: key.replace(' ', ""),
        value: value.replace(' ', ""),
    }
}

/// Strip a leading `profile ` token from a section name.
fn profile_name(section: &str) -> &str {
    let section = section.trim();
    section
        .strip_prefix("profile ")
        .map(str::trim)
        .unwrap_or(section)
}

/// Reader that merges one or more files into a [`CredentialStore`].
///
/// Files are applied in order; an attribute set by a later file replaces
/// the same attribute of the same profile from an earlier file.
#[derive(Debug, Clone, Default)]
pub struct ConfigParser {
    options: ParserOptions,
}

impl ConfigParser {
    /// Create a parser with the given options.
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Read and merge the given files, in order.
    pub fn parse_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<CredentialStore> {
        let mut store = CredentialStore::new();
        for path in paths {
            let path = path.as_ref();
            debug!("Reading {}", path.display());
            let content =
                std::fs::read_to_string(path).map_err(|e| RotatorError::io(path, e))?;
            self.parse_into(&mut store, &content);
        }
        Ok(store)
    }

    /// Parse a single document into a fresh store.
    pub fn parse_str(&self, content: &str) -> CredentialStore {
        let mut store = CredentialStore::new();
        self.parse_into(&mut store, content);
        store
    }

    /// Merge a document into an existing store.
    pub fn parse_into(&self, store: &mut CredentialStore, content: &str) {
        let mut profile: Option<String> = None;
        let mut block: Option<String> = None;

        for (index, raw) in content.lines().enumerate() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            let class = classify(line, block.is_some());
            if self.options.debug {
                debug!(line = index + 1, "{:?}", redact(&class));
            }

            match class {
                Line::Blank => {
                    profile = None;
                    block = None;
                }
                Line::Header(name) => {
                    store.open_profile(name);
                    profile = Some(name.to_string());
                    block = None;
                }
                Line::BlockOpener(key) => match profile.as_deref() {
                    Some(name) => {
                        store
                            .open_profile(name)
                            .set(key, AttributeValue::Block(Default::default()));
                        block = Some(key.to_string());
                    }
                    None => {
                        warn!(line = index + 1, "Sub-block '{}' outside any profile, ignored", key);
                        block = None;
                    }
                },
                Line::BlockValue { key, value } => {
                    if let (Some(name), Some(block_key)) = (profile.as_deref(), block.as_deref()) {
                        store.open_profile(name).set_block_entry(block_key, key, value);
                    }
                }
                Line::Comment => {}
                Line::Attribute { key, value } => {
                    block = None;
                    match profile.as_deref() {
                        Some(name) => store.open_profile(name).set(key, value),
                        None => {
                            warn!(
                                line = index + 1,
                                "Attribute '{}' outside any profile, ignored", key
                            );
                        }
                    }
                }
            }
        }
    }
}

fn redact<'a>(line: &'a Line<'a>) -> std::borrow::Cow<'a, Line<'a>> {
    match line {
        Line::Attribute { key, .. } if crate::store::is_secret_attribute(key) => {
            std::borrow::Cow::Owned(Line::Attribute {
                key: key.clone(),
                value: "<redacted>".to_string(),
            })
        }
        other => std::borrow::Cow::Borrowed(other),
    }
}
