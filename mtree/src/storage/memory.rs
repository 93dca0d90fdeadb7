//! Heap-backed node storage.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{NodeStorage, StorageStats};
use crate::errors::{MTreeError, MTreeResult};
use crate::tree::mtree_types::{FileHeader, Node, PageId};

/// Keeps every node in memory. Nothing survives the process.
pub struct MemoryStorage {
    pages: RwLock<HashMap<PageId, Arc<Node>>>,
    header: RwLock<FileHeader>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_header(FileHeader::new())
    }

    pub fn with_header(header: FileHeader) -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            header: RwLock::new(header),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStorage for MemoryStorage {
    fn read_node(&self, page_id: PageId) -> MTreeResult<Arc<Node>> {
        self.pages
            .read()
            .get(&page_id)
            .cloned()
            .ok_or_else(|| MTreeError::NotFound(format!("page {} does not exist", page_id)))
    }

    fn write_node(&self, page_id: PageId, node: Node) -> MTreeResult<()> {
        if page_id == 0 {
            return Err(MTreeError::InvalidOperation(
                "page 0 is reserved for the header".into(),
            ));
        }
        self.pages.write().insert(page_id, Arc::new(node));
        Ok(())
    }

    fn allocate_page(&self) -> MTreeResult<PageId> {
        let mut header = self.header.write();
        let page_id = header.next_page_id;
        header.next_page_id += 1;
        Ok(page_id)
    }

    fn header(&self) -> FileHeader {
        self.header.read().clone()
    }

    fn set_header(&self, header: FileHeader) -> MTreeResult<()> {
        *self.header.write() = header;
        Ok(())
    }

    fn flush(&self) -> MTreeResult<()> {
        Ok(())
    }

    fn stats(&self) -> StorageStats {
        let pages = self.pages.read().len() as u64;
        StorageStats {
            pages,
            cached_pages: pages,
            ..StorageStats::default()
        }
    }
}
