/*!
 * Session refresh behaviour during traversal
 */

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use capfetch::catalog::feed::FeedParser;
use capfetch::catalog::CatalogWalker;
use capfetch::errors::CatalogError;
use capfetch::session::store::{Record, DEVICE_ID_KEY, DEVICE_TOKEN_KEY};
use capfetch::session::{Credentials, MemoryStore, Session, SessionManager, SessionStore};
use crate::common::mock_catalog::{MockAuthenticator, MockCatalog, SessionPolicy};
use crate::common::{self, browse_url, BASE};

fn stale_store() -> Arc<MemoryStore> {
    let mut record = Record::new();
    record.insert(DEVICE_ID_KEY.to_string(), "device-1".to_string());
    record.insert(DEVICE_TOKEN_KEY.to_string(), "expired".to_string());
    Arc::new(MemoryStore::with_record(record))
}

fn sessions(store: Arc<MemoryStore>, auth: Arc<MockAuthenticator>) -> Arc<SessionManager> {
    Arc::new(
        SessionManager::new(SessionStore::new(store), auth, Credentials::new("me", "pw")).unwrap(),
    )
}

fn single_node(policy: SessionPolicy) -> MockCatalog {
    MockCatalog::new()
        .with_node(
            browse_url("movie"),
            common::feed(&[common::movie_item("Bar Movie", &[("https://cdn.test/bar_SV.xml", "sv")])]),
        )
        .with_policy(policy)
}

#[tokio::test]
async fn test_walk_withExpiredSession_shouldReloginOnceAndRetryOnce() {
    let catalog = Arc::new(single_node(SessionPolicy::RequireToken("token-1".to_string())));
    let store = stale_store();
    let auth = Arc::new(MockAuthenticator::new());
    let manager = sessions(store.clone(), auth.clone());
    let walker = CatalogWalker::new(catalog.clone(), Some(manager.clone()), FeedParser::default(), BASE, 1);

    let outcome = walker.walk("movie", &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.targets.len(), 1);
    assert_eq!(auth.calls(), 1);
    assert_eq!(catalog.node_call_count(&browse_url("movie")), 2);

    // The fresh session keeps the device id and is persisted
    let persisted = SessionStore::new(store.clone()).load().unwrap();
    assert_eq!(persisted, Some(Session::new("device-1", "token-1")));
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn test_walk_withRepeatedRejection_shouldFailWithoutThirdAttempt() {
    let catalog = Arc::new(single_node(SessionPolicy::RejectAll));
    let auth = Arc::new(MockAuthenticator::new());
    let manager = sessions(stale_store(), auth.clone());
    let walker = CatalogWalker::new(catalog.clone(), Some(manager), FeedParser::default(), BASE, 1);

    let result = walker.walk("movie", &CancellationToken::new()).await;

    assert!(matches!(result, Err(CatalogError::CatalogFetch { .. })));
    assert_eq!(auth.calls(), 1);
    assert_eq!(catalog.node_call_count(&browse_url("movie")), 2);
}

#[tokio::test]
async fn test_walk_withoutStoredSession_shouldLoginBeforeFirstFetch() {
    let catalog = Arc::new(single_node(SessionPolicy::RequireToken("token-1".to_string())));
    let auth = Arc::new(MockAuthenticator::new());
    let manager = sessions(Arc::new(MemoryStore::new()), auth.clone());
    let walker = CatalogWalker::new(catalog.clone(), Some(manager), FeedParser::default(), BASE, 1);

    walker.walk("movie", &CancellationToken::new()).await.unwrap();

    assert_eq!(auth.calls(), 1);
    assert_eq!(catalog.node_calls().len(), 1);
}

#[tokio::test]
async fn test_walk_withRejectedLogin_shouldAbortWithAuthError() {
    let catalog = Arc::new(single_node(SessionPolicy::RejectAll));
    let auth = Arc::new(MockAuthenticator::rejecting());
    let manager = sessions(stale_store(), auth.clone());
    let walker = CatalogWalker::new(catalog.clone(), Some(manager), FeedParser::default(), BASE, 1);

    let result = walker.walk("movie", &CancellationToken::new()).await;

    assert!(matches!(result, Err(CatalogError::Auth(_))));
    assert_eq!(auth.calls(), 1);
    assert_eq!(catalog.node_calls().len(), 1);
}

/// Once refreshed, the session is reused by every concurrent sibling fetch
#[tokio::test]
async fn test_walk_afterRefresh_shouldReuseSessionForSiblings() {
    let mut catalog = MockCatalog::new().with_node(
        browse_url("show"),
        common::feed(&[
            common::season_item("S1", "s1"),
            common::season_item("S2", "s2"),
            common::season_item("S3", "s3"),
            common::season_item("S4", "s4"),
        ]),
    );
    for (season, id) in ["s1", "s2", "s3", "s4"].iter().enumerate() {
        let href = format!("https://cdn.test/foo_{}_SV.xml", id);
        catalog = catalog.with_node(
            browse_url(id),
            common::feed(&[common::episode_item("Foo", season as u32 + 1, 1, &[(href.as_str(), "sv")])]),
        );
    }
    let catalog = Arc::new(catalog.with_policy(SessionPolicy::RequireToken("token-1".to_string())));
    let auth = Arc::new(MockAuthenticator::new());
    let manager = sessions(stale_store(), auth.clone());
    let walker = CatalogWalker::new(catalog.clone(), Some(manager.clone()), FeedParser::default(), BASE, 4);

    let outcome = walker.walk("show", &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.targets.len(), 4);
    assert_eq!(auth.calls(), 1);
    assert_eq!(manager.login_count(), 1);
}
