//! Integration test utilities and helpers
//!
//! This module provides common test infrastructure for the rotator integration
//! tests: a wiremock-backed IAM/STS endpoint, an in-memory credential service
//! that records every call, and scratch configuration directories.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use cred_rotator::{
    AwsEndpoints, CredentialService, Identity, IssuedKey, KeyDescriptor, ProfileRecord,
    Result, RotatorError,
};
use time::{Duration, OffsetDateTime};
use wiremock::matchers::{body_string_contains, header_exists, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Signing region used by the mock endpoint.
pub const REGION: &str = "us-east-1";

const IAM_NS: &str = "https://iam.amazonaws.com/doc/2010-05-08/";
const STS_NS: &str = "https://sts.amazonaws.com/doc/2011-06-15/";

/// Query-protocol XML response wrapping `result` in `<{action}Result>`.
pub fn query_response(namespace: &str, action: &str, result: &str) -> ResponseTemplate {
    xml(
        200,
        format!(
            "<{action}Response xmlns=\"{namespace}\">\
             <{action}Result>{result}</{action}Result>\
             <ResponseMetadata><RequestId>req-1</RequestId></ResponseMetadata>\
             </{action}Response>"
        ),
    )
}

/// `ListAccessKeys` response body for keys given as `(id, create date, status)`.
pub fn list_keys_response(keys: &[(&str, &str, &str)]) -> ResponseTemplate {
    let members: String = keys
        .iter()
        .map(|(id, created, status)| {
            format!(
                "<member><UserName>tester</UserName><AccessKeyId>{id}</AccessKeyId>\
                 <Status>{status}</Status><CreateDate>{created}</CreateDate></member>"
            )
        })
        .collect();
    query_response(
        IAM_NS,
        "ListAccessKeys",
        &format!(
            "<AccessKeyMetadata>{members}</AccessKeyMetadata><IsTruncated>false</IsTruncated>"
        ),
    )
}

/// `GetCallerIdentity` response body.
pub fn caller_identity_response(account_id: &str, arn: &str) -> ResponseTemplate {
    query_response(
        STS_NS,
        "GetCallerIdentity",
        &format!("<Arn>{arn}</Arn><UserId>AIDATESTER</UserId><Account>{account_id}</Account>"),
    )
}

fn xml(status: u16, body: String) -> ResponseTemplate {
    ResponseTemplate::new(status)
        .insert_header("content-type", "text/xml")
        .set_body_string(body)
}

/// Mock IAM/STS endpoint for integration tests
pub struct MockIamServer {
    server: MockServer,
}

impl MockIamServer {
    /// Create a new mock endpoint
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Get the base URL of the mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Endpoints pointing both services at the mock server
    pub fn endpoints(&self) -> AwsEndpoints {
        AwsEndpoints::single(self.url(), REGION)
    }

    /// Get a reference to the inner MockServer for custom mocking
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Mock a successful GetCallerIdentity response
    pub async fn mock_caller_identity(&self, account_id: &str) {
        Mock::given(method("POST"))
            .and(body_string_contains("Action=GetCallerIdentity"))
            .and(header_exists("authorization"))
            .respond_with(caller_identity_response(
                account_id,
                &format!("arn:aws:iam::{account_id}:user/tester"),
            ))
            .mount(&self.server)
            .await;
    }

    /// Mock a ListAccessKeys response of active keys; dates are RFC 3339
    pub async fn mock_list_keys(&self, keys: &[(&str, &str)]) {
        let keys: Vec<_> = keys
            .iter()
            .map(|(id, created)| (*id, *created, "Active"))
            .collect();
        Mock::given(method("POST"))
            .and(body_string_contains("Action=ListAccessKeys"))
            .respond_with(list_keys_response(&keys))
            .mount(&self.server)
            .await;
    }

    /// Mock a CreateAccessKey response, expecting `times` calls
    pub async fn mock_create_key(&self, access_key_id: &str, secret: &str, times: u64) {
        Mock::given(method("POST"))
            .and(body_string_contains("Action=CreateAccessKey"))
            .respond_with(query_response(
                IAM_NS,
                "CreateAccessKey",
                &format!(
                    "<AccessKey><UserName>tester</UserName>\
                     <AccessKeyId>{access_key_id}</AccessKeyId><Status>Active</Status>\
                     <SecretAccessKey>{secret}</SecretAccessKey>\
                     <CreateDate>2024-01-01T00:00:00Z</CreateDate></AccessKey>"
                ),
            ))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Mock a DeleteAccessKey response for one key id, expecting `times` calls
    pub async fn mock_delete_key(&self, access_key_id: &str, times: u64) {
        Mock::given(method("POST"))
            .and(body_string_contains("Action=DeleteAccessKey"))
            .and(body_string_contains(format!("AccessKeyId={access_key_id}")))
            .respond_with(xml(
                200,
                format!(
                    "<DeleteAccessKeyResponse xmlns=\"{IAM_NS}\">\
                     <ResponseMetadata><RequestId>req-1</RequestId></ResponseMetadata>\
                     </DeleteAccessKeyResponse>"
                ),
            ))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Mock an error document for one action.
    ///
    /// Use a non-retryable status (4xx) so the SDK gives up after one call.
    pub async fn mock_error(&self, action: &str, status: u16, code: &str, message: &str) {
        Mock::given(method("POST"))
            .and(body_string_contains(format!("Action={action}")))
            .respond_with(xml(
                status,
                format!(
                    "<ErrorResponse xmlns=\"{IAM_NS}\">\
                     <Error><Type>Sender</Type><Code>{code}</Code>\
                     <Message>{message}</Message></Error>\
                     <RequestId>req-err</RequestId></ErrorResponse>"
                ),
            ))
            .mount(&self.server)
            .await;
    }
}

/// One call made against [`FakeService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    OpenSession(String),
    ValidateIdentity(String),
    ListKeys(String),
    CreateKey(String),
    DeleteKey { profile: String, key_id: String },
}

/// Session handed out by [`FakeService`].
#[derive(Debug, Clone)]
pub struct FakeSession {
    profile: String,
    access_key_id: String,
}

struct FakeUser {
    account_id: String,
    keys: Vec<KeyDescriptor>,
}

#[derive(Default)]
struct FakeState {
    users: HashMap<String, FakeUser>,
    calls: Vec<Call>,
    issued: usize,
    create_limit: Option<usize>,
    fail_delete: bool,
}

impl FakeState {
    fn user_of(&mut self, access_key_id: &str) -> Option<&mut FakeUser> {
        self.users
            .values_mut()
            .find(|u| u.keys.iter().any(|k| k.id == access_key_id))
    }
}

/// In-memory credential service that records every call.
///
/// Users own keys; a session authenticates as whichever user owns the
/// profile's access key id.
#[derive(Default)]
pub struct FakeService {
    state: Mutex<FakeState>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user in `account_id` owning keys of the given ages (days).
    pub fn with_user(self, name: &str, account_id: &str, keys: &[(&str, i64)]) -> Self {
        let now = OffsetDateTime::now_utc();
        let keys = keys
            .iter()
            .map(|(id, age_days)| KeyDescriptor {
                id: id.to_string(),
                created: now - Duration::days(*age_days),
                status: "Active".to_string(),
            })
            .collect();
        self.state.lock().unwrap().users.insert(
            name.to_string(),
            FakeUser {
                account_id: account_id.to_string(),
                keys,
            },
        );
        self
    }

    /// Make every CreateAccessKey call fail.
    pub fn failing_create(self) -> Self {
        self.failing_create_after(0)
    }

    /// Let the first `issued` CreateAccessKey calls succeed, then fail.
    pub fn failing_create_after(self, issued: usize) -> Self {
        self.state.lock().unwrap().create_limit = Some(issued);
        self
    }

    /// Make every DeleteAccessKey call fail.
    pub fn failing_delete(self) -> Self {
        self.state.lock().unwrap().fail_delete = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::CreateKey(_)))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::DeleteKey { .. }))
            .count()
    }

    /// Remote key ids currently held by a user.
    pub fn keys_of(&self, user: &str) -> Vec<String> {
        self.state.lock().unwrap().users[user]
            .keys
            .iter()
            .map(|k| k.id.clone())
            .collect()
    }
}

fn unknown_key(operation: &str) -> RotatorError {
    RotatorError::remote(
        operation,
        "InvalidClientTokenId",
        "The security token included in the request is invalid.",
    )
}

#[async_trait]
impl CredentialService for FakeService {
    type Session = FakeSession;

    async fn open_session(&self, profile: &str, record: &ProfileRecord) -> Result<FakeSession> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(Call::OpenSession(profile.to_string()));
        let access_key_id = record
            .access_key_id()
            .ok_or_else(|| RotatorError::session(profile, "no aws_access_key_id"))?;
        Ok(FakeSession {
            profile: profile.to_string(),
            access_key_id: access_key_id.to_string(),
        })
    }

    async fn validate_identity(&self, session: &FakeSession) -> Result<Identity> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::ValidateIdentity(session.profile.clone()));
        let user = state
            .user_of(&session.access_key_id)
            .ok_or_else(|| unknown_key("GetCallerIdentity"))?;
        Ok(Identity {
            account_id: user.account_id.clone(),
            arn: format!("arn:aws:iam::{}:user/fake", user.account_id),
        })
    }

    async fn list_keys(&self, session: &FakeSession) -> Result<Vec<KeyDescriptor>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ListKeys(session.profile.clone()));
        let user = state
            .user_of(&session.access_key_id)
            .ok_or_else(|| unknown_key("ListAccessKeys"))?;
        Ok(user.keys.clone())
    }

    async fn create_key(&self, session: &FakeSession) -> Result<IssuedKey> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateKey(session.profile.clone()));
        if state.create_limit.is_some_and(|limit| state.issued >= limit) {
            return Err(RotatorError::remote(
                "CreateAccessKey",
                "LimitExceeded",
                "Cannot exceed quota for AccessKeysPerUser: 2",
            ));
        }
        state.issued += 1;
        let issued = IssuedKey {
            access_key_id: format!("AKIANEW{}", state.issued),
            secret_access_key: format!("secret-new-{}", state.issued),
        };
        let user = state
            .user_of(&session.access_key_id)
            .ok_or_else(|| unknown_key("CreateAccessKey"))?;
        user.keys.push(KeyDescriptor {
            id: issued.access_key_id.clone(),
            created: OffsetDateTime::now_utc(),
            status: "Active".to_string(),
        });
        Ok(issued)
    }

    async fn delete_key(&self, session: &FakeSession, key_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::DeleteKey {
            profile: session.profile.clone(),
            key_id: key_id.to_string(),
        });
        if state.fail_delete {
            return Err(RotatorError::remote(
                "DeleteAccessKey",
                "ServiceFailure",
                "internal error",
            ));
        }
        let user = state
            .user_of(&session.access_key_id)
            .ok_or_else(|| unknown_key("DeleteAccessKey"))?;
        let before = user.keys.len();
        user.keys.retain(|k| k.id != key_id);
        if user.keys.len() == before {
            return Err(RotatorError::remote(
                "DeleteAccessKey",
                "NoSuchEntity",
                format!("The Access Key with id {key_id} cannot be found."),
            ));
        }
        Ok(())
    }
}

/// Test fixture helpers
pub mod fixtures {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    /// Scratch directory holding the given file contents (`None` = absent).
    pub fn config_dir(config: Option<&str>, credentials: Option<&str>) -> TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        if let Some(content) = config {
            fs::write(dir.path().join("config"), content).expect("write config");
        }
        if let Some(content) = credentials {
            fs::write(dir.path().join("credentials"), content).expect("write credentials");
        }
        dir
    }

    /// Read a file in the scratch directory.
    pub fn read(dir: &Path, name: &str) -> String {
        fs::read_to_string(dir.join(name)).unwrap_or_else(|e| panic!("read {name}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let mock_server = MockIamServer::start().await;
        assert!(!mock_server.url().is_empty());
        assert!(mock_server.url().starts_with("http://"));
    }

    #[tokio::test]
    async fn test_fake_service_tracks_keys() {
        let fake = FakeService::new().with_user("alice", "111", &[("AKIA1", 10)]);
        let record = {
            let mut r = ProfileRecord::new();
            r.set_key_pair("AKIA1", "s1");
            r
        };

        let session = fake.open_session("dev", &record).await.unwrap();
        let issued = fake.create_key(&session).await.unwrap();
        fake.delete_key(&session, "AKIA1").await.unwrap();

        assert_eq!(fake.keys_of("alice"), vec![issued.access_key_id]);
        assert_eq!(fake.create_count(), 1);
        assert_eq!(fake.delete_count(), 1);
    }
}
