use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::Credentials;
use crate::error::{BlogError, Result};
use crate::message::{GraphQLRequest, GraphQLResponse};

/// Header carrying the API key in anonymous mode
pub const API_KEY_HEADER: &str = "x-api-key";

/// Configuration for the GraphQL endpoint
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// GraphQL endpoint URL (e.g. "https://xxx.appsync-api.us-east-1.amazonaws.com/graphql")
    pub endpoint: String,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Whole-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:20002/graphql".to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

/// Executes GraphQL requests under a given set of credentials
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: GraphQLRequest, credentials: &Credentials) -> Result<GraphQLResponse>;

    /// Get transport name for debugging
    fn name(&self) -> &'static str {
        "Transport"
    }
}

/// Transport that POSTs GraphQL documents over HTTPS
pub struct HttpTransport {
    config: ConnectionConfig,
    client: reqwest::Client,
    requests: AtomicU64,
    failures: AtomicU64,
}

impl HttpTransport {
    /// Create a transport with default configuration
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let config = ConnectionConfig {
            endpoint: endpoint.into(),
            ..ConnectionConfig::default()
        };
        Self::with_config(config)
    }

    /// Create a transport with custom configuration
    pub fn with_config(config: ConnectionConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(BlogError::config_error("GraphQL endpoint is not set"));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("crudblog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BlogError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    /// Build the HTTP request for a GraphQL call
    pub fn build_request(&self, request: &GraphQLRequest, credentials: &Credentials) -> Result<reqwest::Request> {
        let builder = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(request.to_bytes()?);

        let builder = match credentials {
            Credentials::ApiKey(key) => builder.header(API_KEY_HEADER, header_value(key)?),
            Credentials::UserPool { id_token } => builder.header(AUTHORIZATION, header_value(id_token)?),
        };

        builder
            .build()
            .map_err(|e| BlogError::config_error(format!("Invalid GraphQL endpoint: {}", e)))
    }

    /// Get transport statistics for monitoring
    pub fn get_stats(&self) -> TransportStats {
        TransportStats {
            endpoint: self.config.endpoint.clone(),
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    async fn send(&self, request: reqwest::Request) -> Result<GraphQLResponse> {
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            // AppSync answers 401 with a regular GraphQL error body; keep its messages.
            let errors = GraphQLResponse::from_bytes(&body)
                .map(|parsed| parsed.errors)
                .unwrap_or_default();
            if errors.is_empty() {
                return Err(BlogError::http_status(status.as_u16(), String::from_utf8_lossy(&body)));
            }
            return Err(BlogError::Api {
                status: Some(status.as_u16()),
                errors,
            });
        }

        GraphQLResponse::from_bytes(&body)
    }
}

fn header_value(secret: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(secret)
        .map_err(|_| BlogError::config_error("Credential contains characters not allowed in a header"))?;
    value.set_sensitive(true);
    Ok(value)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: GraphQLRequest, credentials: &Credentials) -> Result<GraphQLResponse> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Sending {} to {} ({})",
            request.name(),
            self.config.endpoint,
            credentials.mode()
        );

        let http_request = self.build_request(&request, credentials)?;
        let result = self.send(http_request).await;

        if let Err(e) = &result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!("{} failed: {}", request.name(), e);
        }
        result
    }

    fn name(&self) -> &'static str {
        "HttpTransport"
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("config", &self.config)
            .finish()
    }
}

/// Transport statistics for monitoring
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransportStats {
    pub endpoint: String,
    pub requests: u64,
    pub failures: u64,
}
