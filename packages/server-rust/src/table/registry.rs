//! Per-endpoint cache of remote table handles.
//!
//! One long-lived handle per distinct URL string, created lazily on first
//! reference and reused by every later call. Entries are never evicted:
//! the cache grows with the number of distinct endpoints a process
//! touches, and callers rely on handle reuse across calls.

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::traits::{RemoteTable, RemoteTableFactory};

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Validated endpoint URL: an absolute URI with scheme and authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    uri: http::Uri,
}

impl Endpoint {
    /// # Errors
    ///
    /// Returns `HandleCreationError` if `url` does not parse as an absolute
    /// URI with both a scheme and an authority.
    pub fn parse(url: &str) -> Result<Self, HandleCreationError> {
        let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
            HandleCreationError::new(url, e.to_string())
        })?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(HandleCreationError::new(
                url,
                "url must be absolute (scheme and host)",
            ));
        }
        Ok(Self {
            url: url.to_string(),
            uri,
        })
    }

    /// The URL exactly as the caller supplied it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn uri(&self) -> &http::Uri {
        &self.uri
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// A table handle could not be created for an endpoint.
#[derive(Debug, thiserror::Error)]
#[error("cannot create table handle for `{url}`: {reason}")]
pub struct HandleCreationError {
    pub url: String,
    pub reason: String,
}

impl HandleCreationError {
    fn new(url: &str, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TableHandle
// ---------------------------------------------------------------------------

/// Cached handle: the endpoint plus the remote table bound to it.
pub struct TableHandle {
    endpoint: Endpoint,
    table: Arc<dyn RemoteTable>,
}

impl TableHandle {
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn table(&self) -> &dyn RemoteTable {
        self.table.as_ref()
    }
}

impl fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableHandle")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// TableRegistry
// ---------------------------------------------------------------------------

/// Owned URL -> handle mapping with an injected factory.
pub struct TableRegistry {
    factory: Arc<dyn RemoteTableFactory>,
    tables: DashMap<String, Arc<TableHandle>>,
}

impl TableRegistry {
    #[must_use]
    pub fn new(factory: Arc<dyn RemoteTableFactory>) -> Self {
        Self {
            factory,
            tables: DashMap::new(),
        }
    }

    /// Return the cached handle for `url`, creating it on first reference.
    ///
    /// Keys are compared as exact strings; no normalization is applied.
    ///
    /// # Errors
    ///
    /// Returns `HandleCreationError` if `url` is not a valid absolute URL or
    /// the factory refuses to build a handle. Nothing is cached on failure.
    pub fn get_or_create(&self, url: &str) -> Result<Arc<TableHandle>, HandleCreationError> {
        if let Some(handle) = self.tables.get(url) {
            return Ok(Arc::clone(handle.value()));
        }
        match self.tables.entry(url.to_string()) {
            Entry::Occupied(e) => Ok(Arc::clone(e.get())),
            Entry::Vacant(e) => {
                let endpoint = Endpoint::parse(url)?;
                let table = self
                    .factory
                    .create(&endpoint)
                    .map_err(|err| HandleCreationError::new(url, format!("{err:#}")))?;
                debug!(url, "created table handle");
                let handle = Arc::new(TableHandle { endpoint, table });
                e.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    /// Number of cached handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.tables.contains_key(url)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use geobridge_core::{AggregationDescriptor, AggregationRow, QueryDescriptor};
    use proptest::prelude::*;

    use super::*;
    use crate::traits::FeatureIter;

    struct NullTable;

    #[async_trait]
    impl RemoteTable for NullTable {
        async fn query_features(&self, _query: &QueryDescriptor) -> anyhow::Result<FeatureIter> {
            Ok(Box::new(std::iter::empty()))
        }

        async fn query_feature_count(&self, _query: &QueryDescriptor) -> anyhow::Result<u64> {
            Ok(0)
        }

        async fn query_statistics(
            &self,
            _query: &AggregationDescriptor,
        ) -> anyhow::Result<Vec<AggregationRow>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicU32,
    }

    impl RemoteTableFactory for CountingFactory {
        fn create(&self, _endpoint: &Endpoint) -> anyhow::Result<Arc<dyn RemoteTable>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullTable))
        }
    }

    struct RefusingFactory;

    impl RemoteTableFactory for RefusingFactory {
        fn create(&self, _endpoint: &Endpoint) -> anyhow::Result<Arc<dyn RemoteTable>> {
            anyhow::bail!("refused")
        }
    }

    #[test]
    fn same_url_returns_same_handle() {
        let factory = Arc::new(CountingFactory::default());
        let registry = TableRegistry::new(factory.clone());

        let a = registry.get_or_create("https://svc/0").unwrap();
        let b = registry.get_or_create("https://svc/0").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn urls_are_not_normalized() {
        let factory = Arc::new(CountingFactory::default());
        let registry = TableRegistry::new(factory.clone());

        let a = registry.get_or_create("https://svc/0").unwrap();
        let b = registry.get_or_create("https://svc/0/").unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(a.endpoint().as_str(), "https://svc/0");
    }

    #[test]
    fn unparseable_url_fails_and_is_not_cached() {
        let registry = TableRegistry::new(Arc::new(CountingFactory::default()));
        let err = registry.get_or_create("not a url").unwrap_err();
        assert_eq!(err.url, "not a url");
        assert!(registry.is_empty());

        assert!(registry.get_or_create("").is_err());
        assert!(registry.get_or_create("/relative/path").is_err());
        assert!(!registry.contains("/relative/path"));
    }

    #[test]
    fn factory_failure_is_handle_creation_error() {
        let registry = TableRegistry::new(Arc::new(RefusingFactory));
        let err = registry.get_or_create("https://svc/1").unwrap_err();
        assert!(err.reason.contains("refused"));
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_first_use_creates_one_handle() {
        let factory = Arc::new(CountingFactory::default());
        let registry = Arc::new(TableRegistry::new(factory.clone()));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get_or_create("https://svc/2").unwrap())
            })
            .collect();
        let handles: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    proptest! {
        #[test]
        fn repeated_lookups_share_one_handle(path in "[a-z0-9/]{0,24}", repeats in 2usize..6) {
            let factory = Arc::new(CountingFactory::default());
            let registry = TableRegistry::new(factory.clone());
            let url = format!("https://svc.example/{path}");

            let first = registry.get_or_create(&url).unwrap();
            for _ in 1..repeats {
                prop_assert!(Arc::ptr_eq(&first, &registry.get_or_create(&url).unwrap()));
            }
            prop_assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        }
    }
}
