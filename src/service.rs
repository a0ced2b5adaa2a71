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

//! Remote credential service abstraction.
//!
//! The planner only talks to the remote side through [`CredentialService`].
//! [`crate::aws::AwsCredentialService`] implements it against IAM and STS;
//! tests substitute an in-memory fake.
//!
//! Every call is a single attempt. There is no retry or backoff here.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::Result;
use crate::store::ProfileRecord;

/// Caller identity returned by session validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Account that owns the session's credentials.
    pub account_id: String,
    /// Principal ARN.
    pub arn: String,
}

/// One remote access key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    /// Access key id.
    pub id: String,
    /// Creation timestamp.
    pub created: OffsetDateTime,
    /// Remote status (`Active` / `Inactive`).
    pub status: String,
}

/// Freshly issued key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedKey {
    /// New access key id.
    pub access_key_id: String,
    /// New secret access key.
    pub secret_access_key: String,
}

impl std::fmt::Debug for IssuedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedKey")
            .field("access_key_id", &self.access_key_id)
            .finish()
    }
}

/// Remote side of a rotation: identity checks and key lifecycle.
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// Per-profile authenticated session.
    type Session: Send + Sync;

    /// Establish a session for `profile` using its current record.
    async fn open_session(&self, profile: &str, record: &ProfileRecord) -> Result<Self::Session>;

    /// Resolve the identity behind a session.
    async fn validate_identity(&self, session: &Self::Session) -> Result<Identity>;

    /// List the keys of the session's user.
    async fn list_keys(&self, session: &Self::Session) -> Result<Vec<KeyDescriptor>>;

    /// Issue a new key for the session's user.
    async fn create_key(&self, session: &Self::Session) -> Result<IssuedKey>;

    /// Delete a key of the session's user.
    async fn delete_key(&self, session: &Self::Session, key_id: &str) -> Result<()>;
}
