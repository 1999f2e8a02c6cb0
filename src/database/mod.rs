/*!
 * Database module for persistent storage of the device session.
 *
 * This module provides the SQLite backend used by
 * `session::store::SqliteStore`.
 */

pub mod schema;
pub mod connection;

// Re-export main types
pub use connection::DatabaseConnection;
