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

//! IAM / STS implementation of [`CredentialService`].
//! IAM / STS implementation of [`CredentialService`].

use async_trait::async_trait;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::{AppName, BehaviorVersion, Region};
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_iam::primitives::DateTime;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{Result, RotatorError};
use crate::files::{ConfigFiles, FileKind};
use crate::service::{CredentialService, Identity, IssuedKey, KeyDescriptor};
use crate::store::ProfileRecord;

/// Endpoint overrides and region for the remote calls.
///
/// `None` leaves endpoint resolution to the SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsEndpoints {
    /// IAM endpoint override.
    pub iam: Option<String>,
    /// STS endpoint override.
    pub sts: Option<String>,
    /// Signing region.
    pub region: String,
}

impl Default for AwsEndpoints {
    fn default() -> Self {
        Self {
            iam: None,
            sts: None,
            region: "us-east-1".to_string(),
        }
    }
}

impl AwsEndpoints {
    /// Point both services at a single base URL (useful for local mocks).
    pub fn single(base: impl Into<String>, region: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            iam: Some(base.clone()),
            sts: Some(base),
            region: region.into(),
        }
    }
}

/// IAM and STS clients bound to one profile's credentials.
#[derive(Debug, Clone)]
pub struct AwsSession {
    profile: String,
    iam: aws_sdk_iam::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsSession {
    /// Profile this session was opened for.
    pub fn profile(&self) -> &str {
        &self.profile
    }
}

/// Credential service backed by IAM and STS.
///
/// Each session gets its own SDK configuration whose credentials come from
/// the profile in the configured files. Static keys, session tokens and
/// `role_arn`/`source_profile` chains are all resolved by the SDK.
#[derive(Debug, Clone)]
pub struct AwsCredentialService {
    endpoints: AwsEndpoints,
    files: ConfigFiles,
}

impl AwsCredentialService {
    /// Create a service for the given endpoints, reading profiles from `files`.
    pub fn new(endpoints: AwsEndpoints, files: ConfigFiles) -> Self {
        Self { endpoints, files }
    }

    /// Configured endpoints.
    pub fn endpoints(&self) -> &AwsEndpoints {
        &self.endpoints
    }

    /// Files sessions are resolved from.
    pub fn files(&self) -> &ConfigFiles {
        &self.files
    }

    fn profile_files(&self) -> Option<ProfileFiles> {
        let mut builder = ProfileFiles::builder();
        let mut any = false;
        for kind in FileKind::ALL {
            let path = self.files.path(kind);
            if path.is_file() {
                let kind = match kind {
                    FileKind::Config => ProfileFileKind::Config,
                    FileKind::Credentials => ProfileFileKind::Credentials,
                };
                builder = builder.with_file(kind, path);
                any = true;
            }
        }
        any.then(|| builder.build())
    }
}

/// Map an SDK failure to a remote error, keeping the service error code.
fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> RotatorError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err
        .as_service_error()
        .and_then(|e| e.code())
        .map(str::to_string);
    match code {
        Some(code) => {
            let message = err
                .as_service_error()
                .and_then(|e| e.message())
                .unwrap_or_default()
                .to_string();
            RotatorError::remote(operation, code, message)
        }
        None => RotatorError::remote(
            operation,
            "Unavailable",
            DisplayErrorContext(&err).to_string(),
        ),
    }
}

fn to_datetime(operation: &str, value: &DateTime) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(value.secs()).map_err(|e| {
        RotatorError::invalid_response(operation, format!("bad timestamp {}: {e}", value.secs()))
    })
}

#[async_trait]
impl CredentialService for AwsCredentialService {
    type Session = AwsSession;

    async fn open_session(&self, profile: &str, _record: &ProfileRecord) -> Result<AwsSession> {
        let files = self.profile_files().ok_or_else(|| {
            RotatorError::session(
                profile,
                format!("no config or credentials file in {}", self.files.dir().display()),
            )
        })?;
        let provider = ProfileFileCredentialsProvider::builder()
            .profile_files(files)
            .profile_name(profile)
            .build();
        let app_name = AppName::new(crate::APP_NAME)
            .map_err(|e| RotatorError::config(format!("Invalid app name: {e}")))?;

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .app_name(app_name)
            .region(Region::new(self.endpoints.region.clone()))
            .credentials_provider(provider)
            .load()
            .await;

        let mut iam = aws_sdk_iam::config::Builder::from(&sdk_config);
        if let Some(url) = &self.endpoints.iam {
            iam = iam.endpoint_url(url);
        }
        let mut sts = aws_sdk_sts::config::Builder::from(&sdk_config);
        if let Some(url) = &self.endpoints.sts {
            sts = sts.endpoint_url(url);
        }

        debug!(
            "Opened session for profile {} in {}",
            profile, self.endpoints.region
        );
        Ok(AwsSession {
            profile: profile.to_string(),
            iam: aws_sdk_iam::Client::from_conf(iam.build()),
            sts: aws_sdk_sts::Client::from_conf(sts.build()),
        })
    }

    async fn validate_identity(&self, session: &AwsSession) -> Result<Identity> {
        const OP: &str = "GetCallerIdentity";
        let output = session
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| sdk_error(OP, e))?;
        let account_id = output
            .account()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| RotatorError::invalid_response(OP, "no account in response"))?;
        Ok(Identity {
            account_id: account_id.to_string(),
            arn: output.arn().unwrap_or_default().to_string(),
        })
    }

    async fn list_keys(&self, session: &AwsSession) -> Result<Vec<KeyDescriptor>> {
        const OP: &str = "ListAccessKeys";
        let output = session
            .iam
            .list_access_keys()
            .send()
            .await
            .map_err(|e| sdk_error(OP, e))?;
        output
            .access_key_metadata()
            .iter()
            .map(|m| {
                let id = m
                    .access_key_id()
                    .ok_or_else(|| RotatorError::invalid_response(OP, "key without an id"))?;
                let created = m.create_date().ok_or_else(|| {
                    RotatorError::invalid_response(OP, format!("key {id} has no creation date"))
                })?;
                Ok(KeyDescriptor {
                    id: id.to_string(),
                    created: to_datetime(OP, created)?,
                    status: m.status().map(|s| s.as_str().to_string()).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn create_key(&self, session: &AwsSession) -> Result<IssuedKey> {
        const OP: &str = "CreateAccessKey";
        let output = session
            .iam
            .create_access_key()
            .send()
            .await
            .map_err(|e| sdk_error(OP, e))?;
        let key = output
            .access_key()
            .ok_or_else(|| RotatorError::invalid_response(OP, "no access key in response"))?;
        Ok(IssuedKey {
            access_key_id: key.access_key_id().to_string(),
            secret_access_key: key.secret_access_key().to_string(),
        })
    }

    async fn delete_key(&self, session: &AwsSession, key_id: &str) -> Result<()> {
        session
            .iam
            .delete_access_key()
            .access_key_id(key_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteAccessKey", e))?;
        Ok(())
    }
}
