/*!
 * Device session lifecycle.
 *
 * This module provides:
 * - The session and credential types
 * - Persistence of the session record behind a key/value store
 * - Device login against the identity endpoint
 * - A shared session manager with single-flight refresh
 */

pub mod auth;
pub mod manager;
pub mod model;
pub mod store;

// Re-export main types
pub use auth::{AuthSettings, Authenticator, HttpAuthClient};
pub use manager::SessionManager;
pub use model::{Credentials, Session};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, SessionBackend, SessionStore, SqliteStore};
