/*!
 * Device login against the clearleap identity endpoint.
 *
 * The login request is identified by the installation's device id and carries
 * the credentials in an `Authorization` header. The provider expects the
 * password to be base64 encoded before the usual basic-auth combination:
 *
 * ```text
 * Authorization: Basic base64("<username>:" + base64(<password>))
 * ```
 *
 * A successful login answers HTTP 200 with a small XML body holding a
 * `<token>` element. Anything else is an authentication error; no retry is
 * attempted here.
 */

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info};
use reqwest::Client;
use std::time::Duration;

use super::model::{
    CLIENT_NAME_HEADER, CLIENT_VERSION_HEADER, Credentials, DEVICE_ID_HEADER, Session,
};
use crate::errors::CatalogError;

/// Path of the login endpoint, relative to the auth host
pub const LOGIN_PATH: &str = "cloffice/client/device/login";

/// Source of fresh device sessions
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Log the device in and return the issued session
    ///
    /// Fails with `CatalogError::Auth` when the provider rejects the request.
    async fn authenticate(
        &self,
        credentials: &Credentials,
        device_id: &str,
    ) -> Result<Session, CatalogError>;
}

/// Static description of the login client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Auth host, e.g. `https://api-hbon.hbo.clearleap.com`
    pub endpoint: String,
    /// Locale passed as the `language` query parameter
    pub locale: String,
    /// Device type declared in the login body
    pub device_type: String,
    /// Value of the client name header
    pub client_name: String,
    /// Value of the client version header
    pub client_version: String,
}

/// Login client speaking HTTP
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    client: Client,
    settings: AuthSettings,
}

impl HttpAuthClient {
    /// Create a login client
    pub fn new(settings: AuthSettings, timeout_secs: u64) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CatalogError::Auth(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    /// Full login URL including the locale query
    pub fn login_url(&self) -> String {
        format!(
            "{}/{}?language={}",
            self.settings.endpoint.trim_end_matches('/'),
            LOGIN_PATH,
            self.settings.locale
        )
    }
}

#[async_trait]
impl Authenticator for HttpAuthClient {
    async fn authenticate(
        &self,
        credentials: &Credentials,
        device_id: &str,
    ) -> Result<Session, CatalogError> {
        let url = self.login_url();
        debug!("Logging in device {} at {}", device_id, url);

        let response = self
            .client
            .post(&url)
            .header(DEVICE_ID_HEADER, device_id)
            .header(CLIENT_NAME_HEADER, &self.settings.client_name)
            .header(CLIENT_VERSION_HEADER, &self.settings.client_version)
            .header(reqwest::header::AUTHORIZATION, authorization_header(credentials))
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(login_body(&self.settings.device_type, device_id))
            .send()
            .await
            .map_err(|e| CatalogError::Auth(format!("Login request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(CatalogError::Auth(format!(
                "Login endpoint answered {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Auth(format!("Failed to read login response: {}", e)))?;

        let token = parse_token(&body)?;
        info!("Device {} logged in as {}", device_id, credentials.username);
        Ok(Session::new(device_id, token))
    }
}

/// `Authorization` header value for the given credentials
pub fn authorization_header(credentials: &Credentials) -> String {
    let encoded_password = STANDARD.encode(credentials.password.as_bytes());
    let pair = format!("{}:{}", credentials.username, encoded_password);
    format!("Basic {}", STANDARD.encode(pair.as_bytes()))
}

/// XML body declaring the device type and id
pub fn login_body(device_type: &str, device_id: &str) -> String {
    format!(
        "<device><type>{}</type><id>{}</id></device>",
        escape_xml(device_type),
        escape_xml(device_id)
    )
}

/// Extract the issued token from a login response body
pub fn parse_token(body: &str) -> Result<String, CatalogError> {
    let doc = roxmltree::Document::parse(body)
        .map_err(|e| CatalogError::Auth(format!("Unparseable login response: {}", e)))?;

    doc.descendants()
        .find(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("token"))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CatalogError::Auth("Login response carries no token".to_string()))
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
