//! Async HTTP client for the shidduch server.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use shidduch_core::{
  credentials::BackendConfig,
  profile::{Profile, ProfileId, ProfileRecord},
  store::{CollectionPath, Snapshot},
};
use thiserror::Error;

const API_KEY_HEADER: &str = "x-api-key";

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Why the backend could not be brought up. Each kind gets its own recovery
/// screen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendInitError {
  #[error("anonymous sign-in is not enabled for this project")]
  AuthDisabled,

  #[error("the backend rejected the API key")]
  InvalidKey,

  #[error("could not initialise the backend connection: {0}")]
  InitFailed(String),

  #[error("sign-in failed: {0}")]
  General(String),
}

impl BackendInitError {
  /// Map a sign-in error code from the server.
  pub fn from_code(code: &str) -> Self {
    match code {
      "auth/configuration-not-found" | "auth/operation-not-allowed" => Self::AuthDisabled,
      "auth/api-key-not-valid" => Self::InvalidKey,
      other => Self::General(other.to_string()),
    }
  }
}

/// A non-success response, with the server's `{"error"}` text when present.
#[derive(Debug, Error)]
#[error("{method} {path} → {status}: {message}")]
pub struct RequestFailed {
  pub method:  &'static str,
  pub path:    String,
  pub status:  u16,
  pub message: String,
}

impl RequestFailed {
  pub fn is_permission_denied(&self) -> bool { self.message == "permission-denied" }
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

#[derive(Deserialize)]
struct SignIn {
  uid: String,
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// Signed-in client for one profile collection.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct BackendClient {
  client: Client,
  config: BackendConfig,
  path:   CollectionPath,
  uid:    String,
}

impl BackendClient {
  /// Sign in anonymously and bind to the profile collection of `app_id`.
  pub async fn connect(config: BackendConfig, app_id: &str) -> Result<Self, BackendInitError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| BackendInitError::InitFailed(e.to_string()))?;

    let url = format!("{}/auth/anonymous", config.base_url());
    let resp = client
      .post(&url)
      .header(API_KEY_HEADER, &config.api_key)
      .json(&json!({ "projectId": config.project_id }))
      .send()
      .await
      .map_err(|e| BackendInitError::InitFailed(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
      return Err(match resp.json::<ErrorBody>().await {
        Ok(body) => BackendInitError::from_code(&body.error),
        Err(_) => BackendInitError::General(format!("sign-in returned {status}")),
      });
    }

    let SignIn { uid } = resp
      .json()
      .await
      .map_err(|e| BackendInitError::General(e.to_string()))?;
    tracing::info!(%uid, app_id, "signed in");

    Ok(Self {
      client,
      config,
      path: CollectionPath::profiles(app_id),
      uid,
    })
  }

  pub fn uid(&self) -> &str { &self.uid }

  pub fn collection(&self) -> &CollectionPath { &self.path }

  fn url(&self, suffix: &str) -> String {
    format!("{}/api/{}{}", self.config.base_url(), self.path, suffix)
  }

  fn authed(&self, req: RequestBuilder) -> RequestBuilder {
    req.header(API_KEY_HEADER, &self.config.api_key)
  }

  async fn check(resp: Response, method: &'static str, path: String) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let message = match resp.json::<ErrorBody>().await {
      Ok(body) => body.error,
      Err(_) => status.canonical_reason().unwrap_or("error").to_string(),
    };
    Err(RequestFailed { method, path, status: status.as_u16(), message }.into())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// `GET …/profiles`
  pub async fn snapshot(&self) -> Result<Snapshot> {
    let resp = self
      .authed(self.client.get(self.url("")))
      .send()
      .await
      .context("GET profiles failed")?;
    Self::check(resp, "GET", self.path.to_string())
      .await?
      .json()
      .await
      .context("deserialising snapshot")
  }

  /// `GET …/profiles?after_version=N&wait_ms=M`. Returns once the
  /// collection moves past `after`, or with the current snapshot when `wait`
  /// runs out.
  pub async fn wait_for_change(&self, after: u64, wait: Duration) -> Result<Snapshot> {
    let resp = self
      .authed(self.client.get(self.url("")))
      .query(&[
        ("after_version", after.to_string()),
        ("wait_ms", wait.as_millis().to_string()),
      ])
      .send()
      .await
      .context("long-poll for profiles failed")?;
    Self::check(resp, "GET", self.path.to_string())
      .await?
      .json()
      .await
      .context("deserialising snapshot")
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// `POST …/profiles`
  pub async fn create(&self, record: &ProfileRecord) -> Result<Profile> {
    let resp = self
      .authed(self.client.post(self.url("")))
      .json(record)
      .send()
      .await
      .context("POST profile failed")?;
    Self::check(resp, "POST", self.path.to_string())
      .await?
      .json()
      .await
      .context("deserialising created profile")
  }

  /// `PUT …/profiles/{id}`
  pub async fn update(&self, id: &ProfileId, record: &ProfileRecord) -> Result<Profile> {
    let suffix = format!("/{id}");
    let resp = self
      .authed(self.client.put(self.url(&suffix)))
      .json(record)
      .send()
      .await
      .context("PUT profile failed")?;
    Self::check(resp, "PUT", format!("{}{suffix}", self.path))
      .await?
      .json()
      .await
      .context("deserialising updated profile")
  }

  /// `DELETE …/profiles/{id}`
  pub async fn delete(&self, id: &ProfileId) -> Result<()> {
    let suffix = format!("/{id}");
    let resp = self
      .authed(self.client.delete(self.url(&suffix)))
      .send()
      .await
      .context("DELETE profile failed")?;
    Self::check(resp, "DELETE", format!("{}{suffix}", self.path)).await?;
    Ok(())
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use serde_json::Map;
  use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path, query_param},
  };

  use super::*;

  pub(crate) const PROFILES: &str = "/api/artifacts/FamilyShidduchDB/public/data/profiles";

  pub(crate) fn config_for(server: &MockServer) -> BackendConfig {
    BackendConfig {
      api_key:      "family-key".into(),
      project_id:   "family".into(),
      database_url: Some(server.uri()),
      extra:        Map::new(),
    }
  }

  pub(crate) async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
      .and(path("/auth/anonymous"))
      .and(header(API_KEY_HEADER, "family-key"))
      .and(body_partial_json(json!({"projectId": "family"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uid": "u1"})))
      .mount(server)
      .await;
  }

  async fn sign_in_error(code: &str) -> BackendInitError {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/auth/anonymous"))
      .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": code})))
      .mount(&server)
      .await;
    BackendClient::connect(config_for(&server), "FamilyShidduchDB")
      .await
      .unwrap_err()
  }

  #[tokio::test]
  async fn connect_signs_in_with_key_and_project() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    let client = BackendClient::connect(config_for(&server), "FamilyShidduchDB")
      .await
      .unwrap();
    assert_eq!(client.uid(), "u1");
    assert_eq!(client.collection().app_id(), "FamilyShidduchDB");
  }

  #[tokio::test]
  async fn sign_in_codes_map_to_init_error_kinds() {
    assert_eq!(
      sign_in_error("auth/operation-not-allowed").await,
      BackendInitError::AuthDisabled
    );
    assert_eq!(
      sign_in_error("auth/configuration-not-found").await,
      BackendInitError::AuthDisabled
    );
    assert_eq!(
      sign_in_error("auth/api-key-not-valid").await,
      BackendInitError::InvalidKey
    );
    assert_eq!(
      sign_in_error("auth/too-many-requests").await,
      BackendInitError::General("auth/too-many-requests".into())
    );
  }

  #[tokio::test]
  async fn unreachable_backend_is_init_failure() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    drop(server);

    let err = BackendClient::connect(config, "FamilyShidduchDB").await.unwrap_err();
    assert!(matches!(err, BackendInitError::InitFailed(_)));
  }

  #[tokio::test]
  async fn snapshot_and_long_poll_decode_profiles() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("GET"))
      .and(path(PROFILES))
      .and(header(API_KEY_HEADER, "family-key"))
      .and(query_param("after_version", "3"))
      .and(query_param("wait_ms", "1500"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "version": 4,
        "profiles": [{"id": "a", "firstName": "Noa", "age": "24"}]
      })))
      .mount(&server)
      .await;

    let client = BackendClient::connect(config_for(&server), "FamilyShidduchDB")
      .await
      .unwrap();
    let snap = client
      .wait_for_change(3, Duration::from_millis(1500))
      .await
      .unwrap();
    assert_eq!(snap.version, 4);
    assert_eq!(snap.profiles[0].id.as_str(), "a");
    assert_eq!(snap.profiles[0].record.age, 24);
  }

  #[tokio::test]
  async fn error_responses_keep_the_server_code() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("GET"))
      .and(path(PROFILES))
      .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "permission-denied"})))
      .mount(&server)
      .await;

    let client = BackendClient::connect(config_for(&server), "FamilyShidduchDB")
      .await
      .unwrap();
    let err = client.snapshot().await.unwrap_err();
    let failed = err.downcast_ref::<RequestFailed>().unwrap();
    assert_eq!(failed.status, 403);
    assert!(failed.is_permission_denied());
  }

  #[tokio::test]
  async fn writes_hit_the_document_routes() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("POST"))
      .and(path(PROFILES))
      .and(body_partial_json(json!({"firstName": "Noa"})))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "new", "firstName": "Noa"})))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("PUT"))
      .and(path(format!("{PROFILES}/new")))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new", "firstName": "Noa"})))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("DELETE"))
      .and(path(format!("{PROFILES}/new")))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    let client = BackendClient::connect(config_for(&server), "FamilyShidduchDB")
      .await
      .unwrap();
    let record = ProfileRecord { first_name: "Noa".into(), ..Default::default() };

    let created = client.create(&record).await.unwrap();
    assert_eq!(created.id.as_str(), "new");
    client.update(&created.id, &record).await.unwrap();
    client.delete(&created.id).await.unwrap();
  }

  #[tokio::test]
  async fn delete_of_missing_document_is_an_error() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("DELETE"))
      .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "profile not found: x"})))
      .mount(&server)
      .await;

    let client = BackendClient::connect(config_for(&server), "FamilyShidduchDB")
      .await
      .unwrap();
    let err = client.delete(&ProfileId::new("x")).await.unwrap_err();
    assert!(err.to_string().contains("404"));
  }
}
