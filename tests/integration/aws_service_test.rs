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

//! Integration tests for the IAM/STS credential service

use crate::integration::{MockIamServer, caller_identity_response, fixtures, list_keys_response};
use cred_rotator::aws::AwsSession;
use cred_rotator::files::ConfigFiles;
use cred_rotator::parser::ConfigParser;
use cred_rotator::{AwsCredentialService, CredentialService, RotatorError};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, header_exists, method};
use wiremock::{Mock, ResponseTemplate};

const CREDENTIALS: &str = "\
[dev]
aws_access_key_id=AKIAOLD
aws_secret_access_key=oldsecret

[temp]
aws_access_key_id=ASIATEMP
aws_secret_access_key=tempsecret
aws_session_token=token123
";

/// Service reading profiles from a scratch directory holding [`CREDENTIALS`].
fn service(mock: &MockIamServer) -> (TempDir, AwsCredentialService) {
    let dir = fixtures::config_dir(None, Some(CREDENTIALS));
    let service = AwsCredentialService::new(mock.endpoints(), ConfigFiles::new(dir.path()));
    (dir, service)
}

async fn session(service: &AwsCredentialService, profile: &str) -> AwsSession {
    let store = ConfigParser::default().parse_str(CREDENTIALS);
    service
        .open_session(profile, store.profile(profile).unwrap())
        .await
        .expect("session opens")
}

#[tokio::test]
async fn test_validate_identity() {
    let mock = MockIamServer::start().await;
    mock.mock_caller_identity("123456789012").await;

    let (_dir, service) = service(&mock);
    let session = session(&service, "dev").await;
    let identity = service.validate_identity(&session).await.unwrap();

    assert_eq!(identity.account_id, "123456789012");
    assert_eq!(identity.arn, "arn:aws:iam::123456789012:user/tester");
}

#[tokio::test]
async fn test_requests_are_signed_with_profile_key() {
    let mock = MockIamServer::start().await;
    Mock::given(method("POST"))
        .and(header_exists("x-amz-date"))
        .and(header_exists("authorization"))
        .and(body_string_contains("Version=2010-05-08"))
        .respond_with(list_keys_response(&[]))
        .expect(1)
        .mount(mock.inner())
        .await;

    let (_dir, service) = service(&mock);
    let session = session(&service, "dev").await;
    assert!(service.list_keys(&session).await.unwrap().is_empty());

    let requests = mock.inner().received_requests().await.unwrap();
    let authorization = requests[0].headers.get("authorization").unwrap();
    assert!(
        authorization
            .to_str()
            .unwrap()
            .contains("Credential=AKIAOLD/")
    );
}

#[tokio::test]
async fn test_session_token_is_sent() {
    let mock = MockIamServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-amz-security-token", "token123"))
        .respond_with(caller_identity_response(
            "999",
            "arn:aws:sts::999:assumed-role/x",
        ))
        .expect(1)
        .mount(mock.inner())
        .await;

    let (_dir, service) = service(&mock);
    let session = session(&service, "temp").await;
    assert_eq!(service.validate_identity(&session).await.unwrap().account_id, "999");
}

#[tokio::test]
async fn test_list_keys_reads_dates_and_status() {
    let mock = MockIamServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("Action=ListAccessKeys"))
        .respond_with(list_keys_response(&[
            ("AKIAOLD", "2020-09-13T12:26:40Z", "Active"),
            ("AKIAOTHER", "2020-09-13T12:26:40Z", "Inactive"),
        ]))
        .mount(mock.inner())
        .await;

    let (_dir, service) = service(&mock);
    let session = session(&service, "dev").await;
    let keys = service.list_keys(&session).await.unwrap();

    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].id, "AKIAOLD");
    assert_eq!(keys[0].created.unix_timestamp(), 1_600_000_000);
    assert_eq!(keys[0].status, "Active");
    assert_eq!(keys[1].status, "Inactive");
}

#[tokio::test]
async fn test_create_and_delete() {
    let mock = MockIamServer::start().await;
    mock.mock_create_key("AKIANEW", "newsecret", 1).await;
    mock.mock_delete_key("AKIAOLD", 1).await;

    let (_dir, service) = service(&mock);
    let session = session(&service, "dev").await;

    let issued = service.create_key(&session).await.unwrap();
    assert_eq!(issued.access_key_id, "AKIANEW");
    assert_eq!(issued.secret_access_key, "newsecret");
    assert!(!format!("{issued:?}").contains("newsecret"));

    service.delete_key(&session, "AKIAOLD").await.unwrap();
}

#[tokio::test]
async fn test_error_document_is_decoded() {
    let mock = MockIamServer::start().await;
    mock.mock_error("CreateAccessKey", 409, "LimitExceeded", "Cannot exceed quota")
        .await;

    let (_dir, service) = service(&mock);
    let session = session(&service, "dev").await;
    let err = service.create_key(&session).await.unwrap_err();

    match err {
        RotatorError::Remote {
            operation,
            code,
            message,
        } => {
            assert_eq!(operation, "CreateAccessKey");
            assert_eq!(code, "LimitExceeded");
            assert_eq!(message, "Cannot exceed quota");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unknown_profile_fails_identity_check() {
    let mock = MockIamServer::start().await;
    mock.mock_caller_identity("123456789012").await;

    let (_dir, service) = service(&mock);
    let store = ConfigParser::default().parse_str("[ghost]\nregion=us-east-1\n");
    let session = service
        .open_session("ghost", store.profile("ghost").unwrap())
        .await
        .unwrap();

    // No credentials resolve, so the call never reaches the endpoint
    let err = service.validate_identity(&session).await.unwrap_err();
    assert!(matches!(err, RotatorError::Remote { .. }), "{err}");
    assert!(mock.inner().received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_success_body() {
    let mock = MockIamServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<xml/>"))
        .mount(mock.inner())
        .await;

    let (_dir, service) = service(&mock);
    let session = session(&service, "dev").await;
    assert!(service.list_keys(&session).await.is_err());
}
