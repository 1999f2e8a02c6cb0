/*!
 * Device session and credential types.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Header carrying the per-installation device identifier
pub const DEVICE_ID_HEADER: &str = "X-Clearleap-DeviceId";

/// Header carrying the server-issued device token
pub const DEVICE_TOKEN_HEADER: &str = "X-Clearleap-DeviceToken";

/// Header carrying the client name
pub const CLIENT_NAME_HEADER: &str = "X-Client-Name";

/// Header carrying the client version
pub const CLIENT_VERSION_HEADER: &str = "X-Client-Version";

/// Authenticated device session
///
/// The device id is generated once per installation and reused; the token is
/// issued by the login endpoint and has no known expiry. A session is never
/// edited in place: a re-login produces a new value that replaces the old one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stable device identifier
    pub device_id: String,
    /// Opaque server-issued token
    pub device_token: String,
}

impl Session {
    /// Create a session
    pub fn new(device_id: impl Into<String>, device_token: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            device_token: device_token.into(),
        }
    }

    /// Header pairs to attach to catalog requests
    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [
            (DEVICE_ID_HEADER, self.device_id.as_str()),
            (DEVICE_TOKEN_HEADER, self.device_token.as_str()),
        ]
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device_id", &self.device_id)
            .field("device_token", &"<redacted>")
            .finish()
    }
}

/// Login credentials
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Account password, in clear
    pub password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether both fields are filled in
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
