//! Tree configuration.
//!
//! Node capacities, page size and cache sizing for an [`MTree`](crate::MTree).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::{MTreeError, MTreeResult};
use crate::tree::mtree_constants::{
    DEFAULT_CACHE_PAGES, DEFAULT_DIRECTORY_CAPACITY, DEFAULT_LEAF_CAPACITY, MIN_CAPACITY,
    MIN_PAGE_SIZE, PAGE_SIZE,
};

/// M-tree configuration wrapper.
///
/// A cloneable, thread-safe configuration holder. Clones share the same
/// underlying values.
///
/// # Example
///
/// ```rust
/// use mtree::MTreeConfig;
///
/// let config = MTreeConfig::new()
///     .with_leaf_capacity(16)
///     .with_directory_capacity(8)
///     .with_cache_pages(256);
/// assert_eq!(config.leaf_capacity(), 16);
/// ```
#[derive(Clone)]
pub struct MTreeConfig {
    inner: Arc<MTreeConfigInner>,
}

/// Internal configuration storage.
struct MTreeConfigInner {
    /// Maximum entries in a leaf node before it is split.
    leaf_capacity: AtomicUsize,

    /// Maximum entries in a directory node before it is split.
    directory_capacity: AtomicUsize,

    /// Size of a page in the page file, in bytes.
    page_size: AtomicUsize,

    /// Number of pages kept by the page cache.
    cache_pages: AtomicUsize,

    /// Verify page checksums when reading from disk.
    verify_checksums: AtomicBool,
}

impl MTreeConfig {
    /// Creates a new configuration with default values.
    ///
    /// Defaults:
    /// - Leaf capacity: 64
    /// - Directory capacity: 64
    /// - Page size: 16 KB
    /// - Cache: 1024 pages
    /// - Checksum verification: enabled
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MTreeConfigInner::new()),
        }
    }

    #[inline]
    pub fn leaf_capacity(&self) -> usize {
        self.inner.leaf_capacity.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_leaf_capacity(&self, capacity: usize) {
        self.inner.leaf_capacity.store(capacity, Ordering::Relaxed);
    }

    /// Builder-style variant of [`set_leaf_capacity`](Self::set_leaf_capacity).
    #[inline]
    pub fn with_leaf_capacity(self, capacity: usize) -> Self {
        self.set_leaf_capacity(capacity);
        self
    }

    #[inline]
    pub fn directory_capacity(&self) -> usize {
        self.inner.directory_capacity.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_directory_capacity(&self, capacity: usize) {
        self.inner
            .directory_capacity
            .store(capacity, Ordering::Relaxed);
    }

    /// Builder-style variant of [`set_directory_capacity`](Self::set_directory_capacity).
    #[inline]
    pub fn with_directory_capacity(self, capacity: usize) -> Self {
        self.set_directory_capacity(capacity);
        self
    }

    /// Returns the page size in bytes.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.inner.page_size.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_page_size(&self, size: usize) {
        self.inner.page_size.store(size, Ordering::Relaxed);
    }

    #[inline]
    pub fn with_page_size(self, size: usize) -> Self {
        self.set_page_size(size);
        self
    }

    /// Returns the number of pages held by the page cache.
    #[inline]
    pub fn cache_pages(&self) -> usize {
        self.inner.cache_pages.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_cache_pages(&self, pages: usize) {
        self.inner.cache_pages.store(pages, Ordering::Relaxed);
    }

    #[inline]
    pub fn with_cache_pages(self, pages: usize) -> Self {
        self.set_cache_pages(pages);
        self
    }

    #[inline]
    pub fn verify_checksums(&self) -> bool {
        self.inner.verify_checksums.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_verify_checksums(&self, verify: bool) {
        self.inner.verify_checksums.store(verify, Ordering::Relaxed);
    }

    #[inline]
    pub fn with_verify_checksums(self, verify: bool) -> Self {
        self.set_verify_checksums(verify);
        self
    }

    /// Checks that the configured values describe a usable tree.
    pub fn validate(&self) -> MTreeResult<()> {
        if self.leaf_capacity() < MIN_CAPACITY {
            return Err(MTreeError::InvalidArgument(format!(
                "leaf capacity must be at least {}, got {}",
                MIN_CAPACITY,
                self.leaf_capacity()
            )));
        }
        if self.directory_capacity() < MIN_CAPACITY {
            return Err(MTreeError::InvalidArgument(format!(
                "directory capacity must be at least {}, got {}",
                MIN_CAPACITY,
                self.directory_capacity()
            )));
        }
        if self.page_size() < MIN_PAGE_SIZE {
            return Err(MTreeError::InvalidArgument(format!(
                "page size must be at least {} bytes, got {}",
                MIN_PAGE_SIZE,
                self.page_size()
            )));
        }
        if self.cache_pages() == 0 {
            return Err(MTreeError::InvalidArgument(
                "cache must hold at least one page".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MTreeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MTreeConfig")
            .field("leaf_capacity", &self.leaf_capacity())
            .field("directory_capacity", &self.directory_capacity())
            .field("page_size", &self.page_size())
            .field("cache_pages", &self.cache_pages())
            .field("verify_checksums", &self.verify_checksums())
            .finish()
    }
}

impl MTreeConfigInner {
    fn new() -> Self {
        Self {
            leaf_capacity: AtomicUsize::new(DEFAULT_LEAF_CAPACITY),
            directory_capacity: AtomicUsize::new(DEFAULT_DIRECTORY_CAPACITY),
            page_size: AtomicUsize::new(PAGE_SIZE),
            cache_pages: AtomicUsize::new(DEFAULT_CACHE_PAGES),
            verify_checksums: AtomicBool::new(true),
        }
    }
}
