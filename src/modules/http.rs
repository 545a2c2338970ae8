//! Blocking REST client shared by the API modules
//!
//! A [`RestClient`] is built for a single module invocation from the
//! invocation's [`HttpSettings`], a base URL and a [`Credential`], and is
//! dropped when the invocation ends. Nothing is pooled across invocations.

use super::{ModuleError, ModuleResult};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Default timeout in seconds for HTTP requests
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Credentials used to build the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// HTTP Basic authentication
    Basic { username: String, password: String },
}

// Never print secrets, even in debug logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Bearer(_) => f.write_str("Bearer(***)"),
            Credential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Transport settings for the per-invocation client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Whether TLS certificates are verified
    pub validate_certs: bool,
    /// User-Agent header value
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            validate_certs: true,
            user_agent: format!("restible/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A decoded 2xx response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// JSON body, `Value::Null` when the body was empty
    pub body: Value,
}

/// Per-invocation HTTP client bound to one service.
pub struct RestClient {
    client: Client,
    base_url: Url,
    credential: Credential,
    service: &'static str,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url.as_str())
            .field("credential", &self.credential)
            .finish()
    }
}

impl RestClient {
    /// Build a client for `service` rooted at `base_url`.
    ///
    /// `default_headers` are sent with every request (API version pins and the like).
    pub fn new(
        service: &'static str,
        base_url: &str,
        credential: Credential,
        settings: &HttpSettings,
        default_headers: &[(&'static str, &'static str)],
    ) -> ModuleResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ModuleError::InvalidParameter(format!("Invalid api_url '{}': {}", base_url, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ModuleError::InvalidParameter(format!(
                "api_url must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in default_headers {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(!settings.validate_certs)
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ModuleError::ExecutionFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            credential,
            service,
        })
    }

    /// Join path segments onto the base URL, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> ModuleResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ModuleError::InvalidParameter(format!(
                    "api_url cannot be used as a base URL: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn get(&self, segments: &[&str], query: &[(&str, String)]) -> ModuleResult<ApiResponse> {
        self.send(Method::GET, segments, query, None)
    }

    pub fn post(&self, segments: &[&str], body: &Value) -> ModuleResult<ApiResponse> {
        self.send(Method::POST, segments, &[], Some(body))
    }

    pub fn patch(&self, segments: &[&str], body: &Value) -> ModuleResult<ApiResponse> {
        self.send(Method::PATCH, segments, &[], Some(body))
    }

    pub fn delete(&self, segments: &[&str]) -> ModuleResult<ApiResponse> {
        self.send(Method::DELETE, segments, &[], None)
    }

    /// Send one request. Non-2xx responses become [`ModuleError::Http`].
    pub fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ModuleResult<ApiResponse> {
        let url = self.endpoint(segments)?;
        tracing::debug!(service = self.service, %method, %url, "sending request");

        let mut request = self.client.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request = self.authorize(request);

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                ModuleError::Transport(format!("{} request timed out: {}", self.service, e))
            } else if e.is_connect() {
                ModuleError::Transport(format!("Connection to {} failed: {}", self.service, e))
            } else {
                ModuleError::Transport(format!("{} request failed: {}", self.service, e))
            }
        })?;

        self.decode(response)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Credential::Bearer(token) => request.bearer_auth(token),
            Credential::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }

    fn decode(&self, response: Response) -> ModuleResult<ApiResponse> {
        let status = response.status();
        let text = response.text().map_err(|e| {
            ModuleError::Transport(format!("Failed to read {} response body: {}", self.service, e))
        })?;

        if !status.is_success() {
            tracing::debug!(service = self.service, status = status.as_u16(), "request rejected");
            return Err(ModuleError::Http {
                service: self.service,
                status: status.as_u16(),
                message: error_message(&text, status.canonical_reason()),
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                ModuleError::Transport(format!(
                    "{} returned invalid JSON (HTTP {}): {}",
                    self.service,
                    status.as_u16(),
                    e
                ))
            })?
        };

        Ok(ApiResponse { body })
    }
}

/// Extract a readable message from an error body.
///
/// Understands GitHub's `{"message": ...}` and Cloudflare's
/// `{"errors": [{"message": ...}]}` shapes, falling back to the raw body.
fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(errors) = json.get("errors").and_then(Value::as_array) {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            if !messages.is_empty() {
                return messages.join("; ");
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        reason.unwrap_or("Unknown").to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RestClient {
        RestClient::new(
            "Test",
            base,
            Credential::Bearer("token".into()),
            &HttpSettings::default(),
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = client("https://api.cloudflare.com/client/v4");
        let url = client.endpoint(&["accounts", "abc", "cfd_tunnel"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.cloudflare.com/client/v4/accounts/abc/cfd_tunnel"
        );

        let client = self::client("https://api.github.com/");
        let url = client.endpoint(&["repos", "org", "my repo"]).unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/repos/org/my%20repo");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = RestClient::new(
            "Test",
            "not a url",
            Credential::Bearer("t".into()),
            &HttpSettings::default(),
            &[],
        )
        .unwrap_err();
        assert!(err.is_validation());

        let err = RestClient::new(
            "Test",
            "ftp://example.com",
            Credential::Bearer("t".into()),
            &HttpSettings::default(),
            &[],
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"message": "Not Found"}"#, Some("Not Found")),
            "Not Found"
        );
        assert_eq!(
            error_message(
                r#"{"success": false, "errors": [{"code": 1003, "message": "Invalid account"}]}"#,
                None
            ),
            "Invalid account"
        );
        assert_eq!(error_message("", Some("Bad Gateway")), "Bad Gateway");
        assert_eq!(error_message("oops", None), "oops");
    }

    #[test]
    fn test_credential_debug_hides_secrets() {
        let basic = Credential::Basic {
            username: "octocat".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{:?}", basic);
        assert!(rendered.contains("octocat"));
        assert!(!rendered.contains("hunter2"));
        assert!(!format!("{:?}", Credential::Bearer("ghp_x".into())).contains("ghp_x"));
    }
}
