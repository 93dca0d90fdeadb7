//! Node storage backends.
//!
//! The tree reads and writes whole nodes through the [`NodeStorage`] trait.
//! Nodes are handed out as `Arc<Node>` snapshots: a write installs a new
//! snapshot and never mutates one that a reader may still hold.

pub mod memory;
pub mod page_cache;
pub mod page_file;

use std::sync::Arc;

use crate::errors::MTreeResult;
use crate::tree::mtree_types::{FileHeader, Node, PageId};

pub use memory::MemoryStorage;
pub use page_file::PageFileStorage;

/// Page-oriented storage of tree nodes.
pub trait NodeStorage: Send + Sync {
    /// Fetches the node stored in `page_id`.
    fn read_node(&self, page_id: PageId) -> MTreeResult<Arc<Node>>;

    /// Replaces the node stored in `page_id`.
    fn write_node(&self, page_id: PageId, node: Node) -> MTreeResult<()>;

    /// Reserves a fresh page id.
    fn allocate_page(&self) -> MTreeResult<PageId>;

    /// Current tree metadata.
    fn header(&self) -> FileHeader;

    /// Replaces the tree metadata.
    fn set_header(&self, header: FileHeader) -> MTreeResult<()>;

    /// Root page, `None` while the tree is empty.
    fn root_page(&self) -> Option<PageId> {
        self.header().root()
    }

    /// Persists pending writes.
    fn flush(&self) -> MTreeResult<()>;

    fn stats(&self) -> StorageStats;
}

/// Counters reported by a storage backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub pages: u64,
    pub cached_pages: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
}

impl<S: NodeStorage + ?Sized> NodeStorage for Box<S> {
    fn read_node(&self, page_id: PageId) -> MTreeResult<Arc<Node>> {
        (**self).read_node(page_id)
    }

    fn write_node(&self, page_id: PageId, node: Node) -> MTreeResult<()> {
        (**self).write_node(page_id, node)
    }

    fn allocate_page(&self) -> MTreeResult<PageId> {
        (**self).allocate_page()
    }

    fn header(&self) -> FileHeader {
        (**self).header()
    }

    fn set_header(&self, header: FileHeader) -> MTreeResult<()> {
        (**self).set_header(header)
    }

    fn root_page(&self) -> Option<PageId> {
        (**self).root_page()
    }

    fn flush(&self) -> MTreeResult<()> {
        (**self).flush()
    }

    fn stats(&self) -> StorageStats {
        (**self).stats()
    }
}
