/*!
 * Catalog transport.
 *
 * `CatalogClient` is the seam between the walker and the network: it fetches
 * the raw feed document of a node (with the session headers attached when a
 * session is given) and the raw bytes of a caption asset.
 */

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::errors::CatalogError;
use crate::session::model::{CLIENT_NAME_HEADER, CLIENT_VERSION_HEADER, Session};

/// Network access needed by a traversal
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch the feed document at `url`
    ///
    /// Fails with `CatalogError::Unauthorized` when the service rejects the
    /// session, and `CatalogError::CatalogFetch` for any other failure.
    async fn fetch_node(&self, url: &str, session: Option<&Session>)
    -> Result<String, CatalogError>;

    /// Fetch a caption asset; no session headers are sent
    async fn fetch_caption(&self, href: &str) -> Result<Bytes, CatalogError>;
}

/// Catalog client speaking HTTP
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    /// HTTP client for making requests
    client: Client,
    /// Client name header value
    client_name: String,
    /// Client version header value
    client_version: String,
}

impl HttpCatalogClient {
    /// Create a client with a per-request timeout
    pub fn new(
        timeout_secs: u64,
        client_name: impl Into<String>,
        client_version: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| CatalogError::CatalogFetch {
                url: String::new(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            client_name: client_name.into(),
            client_version: client_version.into(),
        })
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_node(
        &self,
        url: &str,
        session: Option<&Session>,
    ) -> Result<String, CatalogError> {
        let mut request = self.client.get(url);
        if let Some(session) = session {
            for (name, value) in session.headers() {
                request = request.header(name, value);
            }
            request = request
                .header(CLIENT_NAME_HEADER, &self.client_name)
                .header(CLIENT_VERSION_HEADER, &self.client_version);
        }

        debug!("GET {}", url);
        let response = request.send().await.map_err(|e| fetch_error(url, e))?;

        let status = response.status();
        if is_auth_failure(status) {
            return Err(CatalogError::Unauthorized {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            error!("Catalog error ({}) for {}", status, url);
            return Err(CatalogError::CatalogFetch {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| fetch_error(url, e))
    }

    async fn fetch_caption(&self, href: &str) -> Result<Bytes, CatalogError> {
        debug!("GET {}", href);
        let response = self
            .client
            .get(href)
            .send()
            .await
            .map_err(|e| fetch_error(href, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::CatalogFetch {
                url: href.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        response.bytes().await.map_err(|e| fetch_error(href, e))
    }
}

/// Statuses the catalog service uses to reject a session
pub fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn fetch_error(url: &str, e: reqwest::Error) -> CatalogError {
    CatalogError::CatalogFetch {
        url: url.to_string(),
        reason: e.to_string(),
    }
}
