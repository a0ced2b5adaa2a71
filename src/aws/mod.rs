// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! AWS implementation of the remote credential service.
//!
//! Every session is an SDK configuration resolved from one profile of the
//! shared files, so static keys, session tokens and role chains all work.
//! Identity is checked with STS `GetCallerIdentity`; keys are listed,
//! created and deleted with IAM.
//!
//! # Example
//!
//! ```no_run
//! use cred_rotator::aws::{AwsCredentialService, AwsEndpoints};
//! use cred_rotator::files::ConfigFiles;
//!
//! let service = AwsCredentialService::new(AwsEndpoints::default(), ConfigFiles::new("/home/me/.aws"));
//! # let _ = service;
//! ```

mod client;

pub use client::{AwsCredentialService, AwsEndpoints, AwsSession};
