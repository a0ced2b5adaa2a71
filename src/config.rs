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

//! Run settings for the credential rotator.
//!
//! Settings come from an optional TOML file, then command-line flags
//! override individual values.
//!
//! ```toml
//! config_dir = "~/.aws/"
//! profiles = "dev,ci"
//! account_ids = ["123456789012"]
//! min_key_age_days = 90
//! role_links_in_credentials = true
//!
//! [endpoints]
//! # iam and sts are optional overrides; the SDK resolves them otherwise
//! iam = "http://localhost:4566/"
//! sts = "http://localhost:4566/"
//! region = "us-east-1"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aws::{AwsCredentialService, AwsEndpoints};
use crate::error::{Result, RotatorError};
use crate::files::{ConfigFiles, expand_home};
use crate::planner::{PlannerConfig, ProfileSelector};
use crate::writer::WriterOptions;

/// Environment variable naming a settings file.
pub const CONFIG_ENV_VAR: &str = "CRED_ROTATOR_CONFIG";

/// Default configuration directory.
pub const DEFAULT_CONFIG_DIR: &str = "~/.aws/";

/// Settings for one rotation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotatorConfig {
    /// Directory holding `config` and `credentials`.
    #[serde(default = "default_config_dir")]
    pub config_dir: String,

    /// Profile selector: a name, a comma list, or `all`.
    #[serde(default = "default_profiles")]
    pub profiles: String,

    /// Allowed account ids. Empty allows any account.
    #[serde(default)]
    pub account_ids: Vec<String>,

    /// Only rotate keys at least this many days old.
    #[serde(default)]
    pub min_key_age_days: f64,

    /// Verbose tracing of parsing and planning.
    #[serde(default)]
    pub debug: bool,

    /// Screen only; do not rotate or write.
    #[serde(default)]
    pub dry_run: bool,

    /// Also write role linkage attributes to the credentials file.
    #[serde(default = "default_true")]
    pub role_links_in_credentials: bool,

    /// Remote endpoints.
    #[serde(default)]
    pub endpoints: EndpointSettings,
}

/// Endpoint overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSettings {
    /// IAM endpoint URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam: Option<String>,
    /// STS endpoint URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sts: Option<String>,
    /// Signing region.
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_config_dir() -> String {
    DEFAULT_CONFIG_DIR.to_string()
}

fn default_profiles() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            iam: None,
            sts: None,
            region: default_region(),
        }
    }
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            profiles: default_profiles(),
            account_ids: Vec::new(),
            min_key_age_days: 0.0,
            debug: false,
            dry_run: false,
            role_links_in_credentials: true,
            endpoints: EndpointSettings::default(),
        }
    }
}

impl RotatorConfig {
    /// Create a new settings builder.
    pub fn builder() -> RotatorConfigBuilder {
        RotatorConfigBuilder::default()
    }

    /// Parse settings from TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| RotatorError::config(format!("Invalid TOML: {e}")))
    }

    /// Serialize settings to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RotatorError::config(format!("TOML serialize: {e}")))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.min_key_age_days.is_finite() || self.min_key_age_days < 0.0 {
            return Err(RotatorError::config(format!(
                "min_key_age_days must be a non-negative number, got {}",
                self.min_key_age_days
            )));
        }
        if self.config_dir.trim().is_empty() {
            return Err(RotatorError::config("config_dir must not be empty"));
        }
        if self.profiles.split(',').all(|p| p.trim().is_empty()) {
            return Err(RotatorError::config("no profiles selected"));
        }
        self.aws_endpoints()?;
        Ok(())
    }

    /// Configuration directory with `~` expanded.
    pub fn resolved_config_dir(&self) -> PathBuf {
        expand_home(&self.config_dir)
    }

    /// Parsed profile selector.
    pub fn selector(&self) -> ProfileSelector {
        ProfileSelector::parse(&self.profiles)
    }

    /// Planner settings.
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            account_ids: self.account_ids.clone(),
            min_key_age_days: self.min_key_age_days,
            debug: self.debug,
            dry_run: self.dry_run,
        }
    }

    /// Writer settings.
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            role_links_in_credentials: self.role_links_in_credentials,
        }
    }

    /// Remote endpoints, with any override URL checked.
    pub fn aws_endpoints(&self) -> Result<AwsEndpoints> {
        let check = |name: &str, value: &Option<String>| -> Result<Option<String>> {
            match value {
                Some(value) => url::Url::parse(value)
                    .map(|_| Some(value.clone()))
                    .map_err(|e| {
                        RotatorError::config(format!("Invalid {name} endpoint '{value}': {e}"))
                    }),
                None => Ok(None),
            }
        };
        if self.endpoints.region.trim().is_empty() {
            return Err(RotatorError::config("endpoint region must not be empty"));
        }
        Ok(AwsEndpoints {
            iam: check("iam", &self.endpoints.iam)?,
            sts: check("sts", &self.endpoints.sts)?,
            region: self.endpoints.region.clone(),
        })
    }

    /// IAM/STS service resolving sessions from this run's files.
    pub fn credential_service(&self) -> Result<AwsCredentialService> {
        Ok(AwsCredentialService::new(
            self.aws_endpoints()?,
            ConfigFiles::new(self.resolved_config_dir()),
        ))
    }
}

/// Builder for [`RotatorConfig`].
#[derive(Debug, Default)]
pub struct RotatorConfigBuilder {
    config: RotatorConfig,
}

impl RotatorConfigBuilder {
    /// Start from existing settings (e.g. loaded from a file).
    pub fn from_config(config: RotatorConfig) -> Self {
        Self { config }
    }

    /// Set the configuration directory.
    pub fn config_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.config_dir = dir.into();
        self
    }

    /// Set the profile selector.
    pub fn profiles(mut self, profiles: impl Into<String>) -> Self {
        self.config.profiles = profiles.into();
        self
    }

    /// Set the account allow-list.
    pub fn account_ids(mut self, ids: Vec<String>) -> Self {
        self.config.account_ids = ids;
        self
    }

    /// Set the minimum key age, in days.
    pub fn min_key_age_days(mut self, days: f64) -> Self {
        self.config.min_key_age_days = days;
        self
    }

    /// Enable verbose tracing.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Screen only.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    /// Whether role linkage attributes also go to the credentials file.
    pub fn role_links_in_credentials(mut self, enabled: bool) -> Self {
        self.config.role_links_in_credentials = enabled;
        self
    }

    /// Point IAM and STS at one base URL.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.config.endpoints.iam = Some(url.clone());
        self.config.endpoints.sts = Some(url);
        self
    }

    /// Set the signing region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.endpoints.region = region.into();
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<RotatorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Settings file discovery.
///
/// # Search Order
///
/// 1. Explicit path (if set via `with_path()`); must exist
/// 2. Environment variable `CRED_ROTATOR_CONFIG`; must exist
/// 3. `<user config dir>/cred-rotator/config.toml`, if present
///
/// When nothing is found the built-in defaults are used.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    explicit_path: Option<PathBuf>,
    env_var_name: String,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    /// Create a loader with default discovery.
    pub fn new() -> Self {
        Self {
            explicit_path: None,
            env_var_name: CONFIG_ENV_VAR.to_string(),
        }
    }

    /// Use exactly this settings file.
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Override the environment variable name.
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var_name = name.into();
        self
    }

    /// Load settings, falling back to defaults when no file is found.
    pub fn load(&self) -> Result<RotatorConfig> {
        match self.find_settings_file()? {
            Some(path) => {
                tracing::debug!("Loading settings from {}", path.display());
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    RotatorError::config(format!("Failed to read {}: {e}", path.display()))
                })?;
                RotatorConfig::from_toml(&content)
            }
            None => Ok(RotatorConfig::default()),
        }
    }

    /// Locate the settings file, if any.
    pub fn find_settings_file(&self) -> Result<Option<PathBuf>> {
        if let Some(ref path) = self.explicit_path {
            if path.is_file() {
                return Ok(Some(path.clone()));
            }
            return Err(RotatorError::config(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }

        if let Ok(env_path) = std::env::var(&self.env_var_name) {
            let path = PathBuf::from(&env_path);
            if path.is_file() {
                return Ok(Some(path));
            }
            return Err(RotatorError::config(format!(
                "Settings file from {} not found: {}",
                self.env_var_name, env_path
            )));
        }

        Ok(Self::default_path().filter(|p| p.is_file()))
    }

    /// `<user config dir>/cred-rotator/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cred-rotator").join("config.toml"))
    }
}
