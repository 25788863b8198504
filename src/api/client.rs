use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{ProxyPattern, ProxyPatternCreate, ProxyPatternUpdate};
use crate::api::PatternApi;
use crate::config::ApiConfig;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// HTTP client for the pattern service
#[derive(Debug, Clone)]
pub struct PatternClient {
  base_url: String,
  http: reqwest::Client,
}

impl PatternClient {
  pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
    let parsed = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
      return Err(ApiError::InvalidUrl(format!(
        "{base_url}: scheme must be http or https"
      )));
    }

    let http = reqwest::Client::builder().timeout(timeout).build()?;

    Ok(Self {
      base_url: base_url.trim_end_matches('/').to_string(),
      http,
    })
  }

  pub fn from_config(config: &ApiConfig) -> ApiResult<Self> {
    Self::new(&config.url, Duration::from_secs(config.timeout_secs))
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url, path.trim_start_matches('/'))
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    debug!(%method, path, "pattern api request");
    self.http.request(method, self.url(path))
  }

  async fn send(&self, request: RequestBuilder, id: Option<i64>) -> ApiResult<Response> {
    let response = request.send().await.map_err(|e| {
      warn!(error = %e, "pattern api transport failure");
      ApiError::Http(e)
    })?;
    check_status(response, id).await
  }

  async fn send_json<T: DeserializeOwned>(
    &self,
    request: RequestBuilder,
    id: Option<i64>,
  ) -> ApiResult<T> {
    let response = self.send(request, id).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
      warn!(error = %e, "pattern api returned an undecodable body");
      ApiError::Decode(e)
    })
  }
}

impl PatternApi for PatternClient {
  async fn list(&self) -> ApiResult<Vec<ProxyPattern>> {
    self
      .send_json(self.request(Method::GET, "/proxy_patterns"), None)
      .await
  }

  async fn create(&self, body: ProxyPatternCreate) -> ApiResult<ProxyPattern> {
    let request = self.request(Method::POST, "/proxy_patterns").json(&body);
    self.send_json(request, None).await
  }

  async fn read(&self, id: i64) -> ApiResult<ProxyPattern> {
    let request = self.request(Method::GET, &format!("/proxy_patterns/{id}"));
    self.send_json(request, Some(id)).await
  }

  async fn update(&self, id: i64, body: ProxyPatternUpdate) -> ApiResult<ProxyPattern> {
    let request = self
      .request(Method::PATCH, &format!("/proxy_patterns/{id}"))
      .json(&body);
    self.send_json(request, Some(id)).await
  }

  async fn delete(&self, id: i64) -> ApiResult<()> {
    let request = self.request(Method::DELETE, &format!("/proxy_patterns/{id}"));
    self.send(request, Some(id)).await?;
    Ok(())
  }
}

/// Map non-2xx responses to `ApiError`. 404 on an id route becomes `NotFound`.
async fn check_status(response: Response, id: Option<i64>) -> ApiResult<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  if status == StatusCode::NOT_FOUND {
    if let Some(id) = id {
      warn!(id, "pattern not found");
      return Err(ApiError::NotFound { id });
    }
  }

  let body = response.text().await.unwrap_or_default();
  let message = error_message(&body)
    .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

  warn!(status = status.as_u16(), %message, "pattern api error response");
  Err(ApiError::Status {
    status: status.as_u16(),
    message,
  })
}

/// Pull a human readable message out of an error body.
///
/// Understands `{"detail": "..."}`, validation lists of the form
/// `{"detail": [{"msg": "..."}]}`, and `error`/`message` keys. Falls back to
/// the raw body.
fn error_message(body: &str) -> Option<String> {
  let body = body.trim();
  if body.is_empty() {
    return None;
  }

  let json: serde_json::Value = match serde_json::from_str(body) {
    Ok(v) => v,
    Err(_) => return Some(body.to_string()),
  };

  match &json["detail"] {
    serde_json::Value::String(s) => return Some(s.clone()),
    serde_json::Value::Array(items) => {
      let msgs: Vec<&str> = items.iter().filter_map(|i| i["msg"].as_str()).collect();
      if !msgs.is_empty() {
        return Some(msgs.join("; "));
      }
    }
    _ => {}
  }

  json["error"]
    .as_str()
    .or_else(|| json["message"].as_str())
    .map(String::from)
    .or_else(|| Some(body.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client_for(server: &MockServer) -> PatternClient {
    PatternClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
  }

  #[test]
  fn test_url_building() {
    let client = PatternClient::new("http://localhost:8101/", Duration::from_secs(1)).unwrap();
    assert_eq!(client.base_url(), "http://localhost:8101");
    assert_eq!(
      client.url("/proxy_patterns"),
      "http://localhost:8101/proxy_patterns"
    );
    assert_eq!(
      client.url("proxy_patterns/3"),
      "http://localhost:8101/proxy_patterns/3"
    );
  }

  #[test]
  fn test_rejects_invalid_url() {
    let err = PatternClient::new("localhost:8101", Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, ApiError::InvalidUrl(_)));

    let err = PatternClient::new("not a url", Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, ApiError::InvalidUrl(_)));
  }

  #[test]
  fn test_error_message_extraction() {
    assert_eq!(
      error_message(r#"{"detail":"Proxy pattern not found"}"#).as_deref(),
      Some("Proxy pattern not found")
    );
    assert_eq!(
      error_message(r#"{"detail":[{"msg":"field required"},{"msg":"too short"}]}"#).as_deref(),
      Some("field required; too short")
    );
    assert_eq!(
      error_message(r#"{"error":"boom"}"#).as_deref(),
      Some("boom")
    );
    assert_eq!(error_message("plain text").as_deref(), Some("plain text"));
    assert_eq!(error_message("   "), None);
  }

  #[tokio::test]
  async fn test_list_patterns() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/proxy_patterns"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        {"id": 1, "pattern": "patriots", "enabled": true},
        {"id": 2, "pattern": "celtics", "enabled": false, "pattern_type": "url"}
      ])))
      .expect(1)
      .mount(&server)
      .await;

    let patterns = client_for(&server).list().await.unwrap();
    assert_eq!(patterns.len(), 2);
    assert_eq!(patterns[0].pattern, "patriots");
    assert_eq!(patterns[1].id, 2);
    assert!(!patterns[1].enabled);
  }

  #[tokio::test]
  async fn test_create_sends_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/proxy_patterns"))
      .and(body_json(json!({"pattern": "eagles", "enabled": true})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": 2,
        "pattern": "eagles",
        "enabled": true,
        "pattern_type": "regex",
        "created_at": "2024-09-01T12:00:00Z",
        "updated_at": "2024-09-01T12:00:00Z"
      })))
      .expect(1)
      .mount(&server)
      .await;

    let created = client_for(&server)
      .create(ProxyPatternCreate::enabled("eagles"))
      .await
      .unwrap();
    assert_eq!(created.id, 2);
    assert!(created.created_at.is_some());
  }

  #[tokio::test]
  async fn test_update_sends_partial_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
      .and(path("/proxy_patterns/4"))
      .and(body_json(json!({"enabled": false})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": 4, "pattern": "bruins", "enabled": false
      })))
      .expect(1)
      .mount(&server)
      .await;

    let updated = client_for(&server)
      .update(4, ProxyPatternUpdate::enabled(false))
      .await
      .unwrap();
    assert_eq!(updated.pattern, "bruins");
    assert!(!updated.enabled);
  }

  #[tokio::test]
  async fn test_read_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/proxy_patterns/42"))
      .respond_with(
        ResponseTemplate::new(404).set_body_json(json!({"detail": "Proxy pattern not found"})),
      )
      .mount(&server)
      .await;

    let err = client_for(&server).read(42).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound { id: 42 }));
  }

  #[tokio::test]
  async fn test_delete_accepts_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/proxy_patterns/1"))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    client_for(&server).delete(1).await.unwrap();
  }

  #[tokio::test]
  async fn test_validation_error_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/proxy_patterns"))
      .respond_with(ResponseTemplate::new(422).set_body_json(json!({
        "detail": [{"loc": ["body", "pattern"], "msg": "field required"}]
      })))
      .mount(&server)
      .await;

    let err = client_for(&server)
      .create(ProxyPatternCreate::enabled(""))
      .await
      .unwrap_err();
    match err {
      ApiError::Status { status, message } => {
        assert_eq!(status, 422);
        assert_eq!(message, "field required");
      }
      other => panic!("expected status error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_server_error_without_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/proxy_patterns"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let err = client_for(&server).list().await.unwrap_err();
    match err {
      ApiError::Status { status, message } => {
        assert_eq!(status, 500);
        assert_eq!(message, "Internal Server Error");
      }
      other => panic!("expected status error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/proxy_patterns"))
      .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
      .mount(&server)
      .await;

    let err = client_for(&server).list().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
  }

  #[tokio::test]
  async fn test_connection_refused_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = PatternClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let err = client.list().await.unwrap_err();
    assert!(err.is_transport());
  }
}
