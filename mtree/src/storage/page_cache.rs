//! LRU cache for node pages.
//!
//! Pages enter the cache when first read from disk or when written by the
//! tree. Written pages stay dirty until the page file flushes them; a dirty
//! page pushed out by the LRU policy is handed back to the caller so it can
//! be written before it is lost.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::tree::mtree_types::{Node, PageId};

/// A cached page with its dirty flag
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub node: Arc<Node>,
    pub dirty: bool,
}

/// A page pushed out of the cache
#[derive(Debug)]
pub struct EvictedPage {
    pub page_id: PageId,
    pub node: Arc<Node>,
    pub dirty: bool,
}

pub struct PageCache {
    pages: LruCache<PageId, CachedPage>,
}

impl PageCache {
    pub fn new(max_pages: NonZeroUsize) -> Self {
        Self {
            pages: LruCache::new(max_pages),
        }
    }

    /// Get a page, marking it most recently used.
    pub fn get(&mut self, page_id: PageId) -> Option<Arc<Node>> {
        self.pages.get(&page_id).map(|cached| cached.node.clone())
    }

    /// Insert or replace a page. Returns the page evicted to make room, if any.
    pub fn insert(&mut self, page_id: PageId, node: Arc<Node>, dirty: bool) -> Option<EvictedPage> {
        match self.pages.push(page_id, CachedPage { node, dirty }) {
            // replaced the previous version of the same page
            Some((evicted_id, _)) if evicted_id == page_id => None,
            Some((evicted_id, cached)) => Some(EvictedPage {
                page_id: evicted_id,
                node: cached.node,
                dirty: cached.dirty,
            }),
            None => None,
        }
    }

    /// The page that inserting `page_id` would evict. Nothing is removed.
    pub fn eviction_candidate(&self, page_id: PageId) -> Option<EvictedPage> {
        if self.pages.contains(&page_id) || self.pages.len() < self.pages.cap().get() {
            return None;
        }
        self.pages.peek_lru().map(|(id, cached)| EvictedPage {
            page_id: *id,
            node: cached.node.clone(),
            dirty: cached.dirty,
        })
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.contains(&page_id)
    }

    /// Dirty pages in ascending page order.
    pub fn dirty_pages(&self) -> Vec<(PageId, Arc<Node>)> {
        let mut dirty: Vec<_> = self
            .pages
            .iter()
            .filter(|(_, cached)| cached.dirty)
            .map(|(id, cached)| (*id, cached.node.clone()))
            .collect();
        dirty.sort_by_key(|(id, _)| *id);
        dirty
    }

    pub fn mark_clean(&mut self, page_id: PageId) {
        if let Some(cached) = self.pages.peek_mut(&page_id) {
            cached.dirty = false;
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.pages.cap().get()
    }
}
