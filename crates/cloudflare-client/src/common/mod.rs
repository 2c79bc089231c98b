//! Common utilities for the Cloudflare API client
//!
//! Provides the authenticated HTTP wrapper and the v4 response envelope
//! shared by every endpoint.

use crate::error::CloudflareError;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

/// User-Agent sent with every request
pub const USER_AGENT: &str = "docker-cloudflare-tunnel-sync";

/// One entry of the envelope's `errors`/`messages` arrays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// Pagination info of list responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub total_count: u32,
}

/// Cloudflare v4 response envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

impl<T> ApiResponse<T> {
    /// Joined error messages, or "unknown error".
    pub fn error_summary(&self) -> String {
        let messages: Vec<&str> = self
            .errors
            .iter()
            .map(|e| e.message.trim())
            .filter(|m| !m.is_empty())
            .collect();
        if messages.is_empty() {
            "unknown error".to_string()
        } else {
            messages.join("; ")
        }
    }
}

/// HTTP client wrapper with authentication
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Send a request and unwrap the response envelope.
    ///
    /// 404 maps to `NotFound`, 401/403 to `Authentication`, any other failure
    /// (non-2xx or `success: false`) to `Api` with the joined error messages.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse<T>, CloudflareError> {
        let url = self.build_url(path);
        match body {
            Some(body) => debug!("{} {} with body: {}", method, url, body),
            None => debug!("{} {}", method, url),
        }

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(CloudflareError::Http)?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(CloudflareError::NotFound(format!("{} {} - {}", method, path, snippet(&text))));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CloudflareError::Authentication(format!(
                "{} {} returned {} - {}",
                method,
                path,
                status,
                snippet(&text)
            )));
        }

        if text.trim().is_empty() {
            return Err(CloudflareError::Api {
                status: status.as_u16(),
                message: format!("{} {} returned an empty body", method, path),
            });
        }

        let envelope: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(CloudflareError::Api {
                    status: status.as_u16(),
                    message: format!(
                        "error decoding response body: {} - Response (first 500 chars): {}",
                        e,
                        snippet(&text)
                    ),
                });
            }
            Err(_) => {
                return Err(CloudflareError::Api {
                    status: status.as_u16(),
                    message: format!("{} {} failed: {}", method, path, snippet(&text)),
                });
            }
        };

        if !status.is_success() || !envelope.success {
            return Err(CloudflareError::Api {
                status: status.as_u16(),
                message: format!("{} {} failed: {}", method, path, envelope.error_summary()),
            });
        }

        Ok(envelope)
    }

    /// Make a request and return the envelope's `result`
    async fn request_result<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, CloudflareError> {
        let envelope = self.request::<T>(method.clone(), path, body).await?;
        envelope.result.ok_or_else(|| CloudflareError::Api {
            status: 200,
            message: format!("{} {} returned no result", method, path),
        })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CloudflareError> {
        self.request_result(Method::GET, path, None).await
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, CloudflareError> {
        self.request_result(Method::POST, path, Some(body)).await
    }

    /// Make a PUT request
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, CloudflareError> {
        self.request_result(Method::PUT, path, Some(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), CloudflareError> {
        self.request::<serde_json::Value>(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Fetch every page of a list endpoint, following `result_info.total_pages`.
    pub async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &[(&str, &str)],
        per_page: u32,
    ) -> Result<Vec<T>, CloudflareError> {
        let mut all_results = Vec::new();
        let per_page = per_page.to_string();
        let mut page: u32 = 1;

        loop {
            let page_str = page.to_string();
            let mut query: Vec<(&str, &str)> = filters.to_vec();
            query.push(("per_page", per_page.as_str()));
            query.push(("page", page_str.as_str()));
            let url = format!("{}?{}", path, self.build_query_string(&query));
            debug!("Fetching page: {}", url);

            let envelope = self.request::<Vec<T>>(Method::GET, &url, None).await?;
            all_results.extend(envelope.result.unwrap_or_default());

            let total_pages = envelope.result_info.map(|info| info.total_pages).unwrap_or(0);
            if total_pages == 0 || page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(all_results)
    }

    /// Build query string from filters
    pub fn build_query_string(&self, filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn snippet(text: &str) -> String {
    text.trim().chars().take(500).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http() -> HttpClient {
        HttpClient::new(Client::new(), "https://api.example.test/client/v4/".to_string(), "tok".to_string())
    }

    #[test]
    fn test_build_url_joins_relative_paths() {
        let http = http();
        assert_eq!(http.build_url("zones"), "https://api.example.test/client/v4/zones");
        assert_eq!(http.build_url("/zones"), "https://api.example.test/client/v4/zones");
        assert_eq!(http.build_url("https://other/x"), "https://other/x");
    }

    #[test]
    fn test_query_string_is_encoded() {
        let query = http().build_query_string(&[("account.id", "abc"), ("name", "a b.example.com")]);
        assert_eq!(query, "account.id=abc&name=a%20b.example.com");
    }

    #[test]
    fn test_error_summary_joins_messages() {
        let envelope: ApiResponse<serde_json::Value> = serde_json::from_str(
            r#"{"success":false,"errors":[{"code":1,"message":"bad"},{"message":"worse"}],"result":null}"#,
        )
        .unwrap();
        assert_eq!(envelope.error_summary(), "bad; worse");

        let empty: ApiResponse<serde_json::Value> = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert_eq!(empty.error_summary(), "unknown error");
    }

    #[test]
    fn test_auth_header_is_bearer() {
        assert_eq!(http().auth_header(), "Bearer tok");
    }
}
