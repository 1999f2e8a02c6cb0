/*!
 * Shared device session with single-flight refresh.
 *
 * Every catalog worker reads the same current session. When a worker sees the
 * catalog service reject it, it calls `refresh` with the session it used;
 * refreshes are serialised, and a worker that arrives after another worker
 * already installed a replacement simply gets that replacement instead of
 * logging in again.
 */

use log::{debug, info};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::auth::Authenticator;
use super::model::{Credentials, Session};
use super::store::SessionStore;
use crate::errors::CatalogError;

/// Owner of the live session for one run
pub struct SessionManager {
    store: SessionStore,
    authenticator: Arc<dyn Authenticator>,
    credentials: Credentials,

    // @field: Current session; replaced whole, never edited
    current: RwLock<Option<Arc<Session>>>,

    // @field: Serialises logins
    refresh_lock: Mutex<()>,

    // @field: Number of successful logins performed
    logins: AtomicUsize,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("store", &self.store)
            .field("credentials", &self.credentials)
            .field("current", &*self.current.read())
            .field("logins", &self.login_count())
            .finish()
    }
}

impl SessionManager {
    /// Create a manager, starting from whatever session the store holds
    pub fn new(
        store: SessionStore,
        authenticator: Arc<dyn Authenticator>,
        credentials: Credentials,
    ) -> Result<Self, CatalogError> {
        let persisted = store.load()?;
        if persisted.is_some() {
            debug!("Loaded persisted device session");
        }

        Ok(Self {
            store,
            authenticator,
            credentials,
            current: RwLock::new(persisted.map(Arc::new)),
            refresh_lock: Mutex::new(()),
            logins: AtomicUsize::new(0),
        })
    }

    /// The session currently installed, if any
    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.read().clone()
    }

    /// The current session, logging in first when none exists yet
    pub async fn ensure(&self) -> Result<Arc<Session>, CatalogError> {
        match self.current() {
            Some(session) => Ok(session),
            None => self.refresh(None).await,
        }
    }

    /// Replace a rejected session
    ///
    /// `stale` is the session the caller's failed request carried. If a
    /// different session has been installed since, it is returned without a
    /// new login.
    pub async fn refresh(&self, stale: Option<&Session>) -> Result<Arc<Session>, CatalogError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(installed) = self.current() {
            let superseded = match stale {
                Some(stale) => *installed != *stale,
                None => true,
            };
            if superseded {
                debug!("Reusing session installed by a concurrent refresh");
                return Ok(installed);
            }
        }

        let device_id = self.store.device_id_blocking().await?;
        info!("Logging in to obtain a fresh device session");
        let session = self
            .authenticator
            .authenticate(&self.credentials, &device_id)
            .await?;

        self.store.save_blocking(session.clone()).await?;
        let session = Arc::new(session);
        *self.current.write() = Some(Arc::clone(&session));
        self.logins.fetch_add(1, Ordering::SeqCst);

        Ok(session)
    }

    /// Number of logins this manager performed
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Backing store
    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}
