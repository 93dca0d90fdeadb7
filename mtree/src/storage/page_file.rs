//! Page-file node storage.
//!
//! Page 0 holds the [`FileHeader`]; every other page holds one bincode-encoded
//! node wrapped in a [`PageWithChecksum`]. Pages are read one at a time on
//! demand and kept in an LRU [`PageCache`]. Writes go to the cache and reach
//! the file when the page is evicted or on [`NodeStorage::flush`].

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::page_cache::PageCache;
use super::{NodeStorage, StorageStats};
use crate::config::MTreeConfig;
use crate::errors::{MTreeError, MTreeResult};
use crate::tree::mtree_constants::{HEADER_PAGE, MIN_PAGE_SIZE};
use crate::tree::mtree_types::{FileHeader, Node, PageId, PageWithChecksum};

/// Encoded size of one entry (two ids and two distances)
const ENTRY_BYTES: usize = 32;
/// Encoded overhead of a node and its checksum wrapper
const NODE_OVERHEAD_BYTES: usize = 64;

#[derive(Default)]
struct StorageCounters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
}

/// Node storage backed by a single page file.
pub struct PageFileStorage {
    file: RwLock<File>,
    path: PathBuf,
    page_size: usize,
    verify_checksums: bool,
    cache: Mutex<PageCache>,
    header: RwLock<FileHeader>,
    header_dirty: AtomicBool,
    counters: StorageCounters,
}

impl PageFileStorage {
    /// Create a new page file, truncating any existing file at `path`.
    pub fn create(path: &Path, config: &MTreeConfig) -> MTreeResult<Self> {
        config.validate()?;
        let max_capacity = config.leaf_capacity().max(config.directory_capacity());
        let needed = (max_capacity + 1) * ENTRY_BYTES + NODE_OVERHEAD_BYTES;
        if needed > config.page_size() {
            return Err(MTreeError::InvalidArgument(format!(
                "page size {} too small for node capacity {} (needs {} bytes)",
                config.page_size(),
                max_capacity,
                needed
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let header = FileHeader {
            page_size: config.page_size() as u32,
            leaf_capacity: config.leaf_capacity() as u32,
            directory_capacity: config.directory_capacity() as u32,
            ..FileHeader::new()
        };

        let storage = Self::with_file(file, path, header, config)?;
        storage.write_header()?;
        storage.sync()?;
        log::debug!("Created page file {}", path.display());
        Ok(storage)
    }

    /// Open an existing page file. Page size and capacities come from its header.
    pub fn open(path: &Path, config: &MTreeConfig) -> MTreeResult<Self> {
        config.validate()?;
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let header = read_header(&mut file)?;
        header.validate()?;
        if (header.page_size as usize) < MIN_PAGE_SIZE {
            return Err(MTreeError::Corrupted(format!(
                "invalid page size {} in header",
                header.page_size
            )));
        }

        log::debug!(
            "Opened page file {} with {} entries (height {})",
            path.display(),
            header.entry_count,
            header.height
        );
        Self::with_file(file, path, header, config)
    }

    fn with_file(
        file: File,
        path: &Path,
        header: FileHeader,
        config: &MTreeConfig,
    ) -> MTreeResult<Self> {
        let cache_pages = NonZeroUsize::new(config.cache_pages()).ok_or_else(|| {
            MTreeError::InvalidArgument("cache must hold at least one page".into())
        })?;
        Ok(Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            page_size: header.page_size as usize,
            verify_checksums: config.verify_checksums(),
            cache: Mutex::new(PageCache::new(cache_pages)),
            header: RwLock::new(header),
            header_dirty: AtomicBool::new(false),
            counters: StorageCounters::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn write_header(&self) -> MTreeResult<()> {
        let header = self.header.read().clone();
        let mut padded = bincode::serde::encode_to_vec(&header, bincode::config::legacy())?;
        padded.resize(self.page_size, 0);

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(HEADER_PAGE))?;
        file.write_all(&padded)?;
        self.header_dirty.store(false, Ordering::Release);
        Ok(())
    }

    /// Read a single node from disk, one seek and one read.
    fn read_page(&self, page_id: PageId) -> MTreeResult<Node> {
        if page_id == HEADER_PAGE {
            return Err(MTreeError::InvalidOperation(
                "cannot read page 0 (reserved for header)".into(),
            ));
        }

        let offset = page_id * self.page_size as u64;
        let mut buffer = vec![0u8; self.page_size];
        {
            let mut file = self.file.write();
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buffer)?;
        }
        self.counters.disk_reads.fetch_add(1, Ordering::Relaxed);

        let (page, _): (PageWithChecksum, usize) =
            bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())?;
        page.into_node(self.verify_checksums).map_err(|e| match e {
            MTreeError::Corrupted(msg) => {
                MTreeError::Corrupted(format!("page {}: {}", page_id, msg))
            }
            other => other,
        })
    }

    fn write_page(&self, page_id: PageId, node: &Node) -> MTreeResult<()> {
        if page_id == HEADER_PAGE {
            return Err(MTreeError::InvalidOperation(
                "cannot write to page 0 (reserved for header)".into(),
            ));
        }

        let page = PageWithChecksum::new(node)?;
        let mut padded = bincode::serde::encode_to_vec(&page, bincode::config::legacy())?;
        if padded.len() > self.page_size {
            return Err(MTreeError::InvalidOperation(format!(
                "node too large: {} bytes (max {})",
                padded.len(),
                self.page_size
            )));
        }
        padded.resize(self.page_size, 0);

        let offset = page_id * self.page_size as u64;
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&padded)?;
        self.counters.disk_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn sync(&self) -> MTreeResult<()> {
        self.file.write().sync_all()?;
        Ok(())
    }

    /// Add a node to the cache; an evicted dirty page is written to disk.
    fn cache_node(
        &self,
        cache: &mut PageCache,
        page_id: PageId,
        node: Arc<Node>,
        dirty: bool,
    ) -> MTreeResult<()> {
        // write the victim back while it is still cached, so a failed write
        // leaves it dirty in the cache
        if let Some(victim) = cache.eviction_candidate(page_id) {
            if victim.dirty {
                self.write_page(victim.page_id, &victim.node)?;
                cache.mark_clean(victim.page_id);
            }
        }
        if let Some(evicted) = cache.insert(page_id, node, dirty) {
            if evicted.dirty {
                self.write_page(evicted.page_id, &evicted.node)?;
            }
        }
        Ok(())
    }
}

fn read_header(file: &mut File) -> MTreeResult<FileHeader> {
    file.seek(SeekFrom::Start(HEADER_PAGE))?;
    let mut buffer = vec![0u8; MIN_PAGE_SIZE];
    file.read_exact(&mut buffer).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            MTreeError::Corrupted("file too short to hold a header".into())
        } else {
            MTreeError::Io(e)
        }
    })?;
    let (header, _) = bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())?;
    Ok(header)
}

impl NodeStorage for PageFileStorage {
    fn read_node(&self, page_id: PageId) -> MTreeResult<Arc<Node>> {
        if let Some(node) = self.cache.lock().get(page_id) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(node);
        }

        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
        if page_id >= self.header.read().next_page_id {
            return Err(MTreeError::NotFound(format!("page {} does not exist", page_id)));
        }
        let node = Arc::new(self.read_page(page_id)?);

        let mut cache = self.cache.lock();
        // a concurrent reader may have cached it meanwhile
        if let Some(cached) = cache.get(page_id) {
            return Ok(cached);
        }
        self.cache_node(&mut cache, page_id, node.clone(), false)?;
        Ok(node)
    }

    fn write_node(&self, page_id: PageId, node: Node) -> MTreeResult<()> {
        if page_id == HEADER_PAGE {
            return Err(MTreeError::InvalidOperation(
                "cannot write to page 0 (reserved for header)".into(),
            ));
        }
        let mut cache = self.cache.lock();
        self.cache_node(&mut cache, page_id, Arc::new(node), true)
    }

    fn allocate_page(&self) -> MTreeResult<PageId> {
        let mut header = self.header.write();
        let page_id = header.next_page_id;
        header.next_page_id += 1;
        self.header_dirty.store(true, Ordering::Release);
        Ok(page_id)
    }

    fn header(&self) -> FileHeader {
        self.header.read().clone()
    }

    fn set_header(&self, header: FileHeader) -> MTreeResult<()> {
        *self.header.write() = header;
        self.header_dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn flush(&self) -> MTreeResult<()> {
        let mut cache = self.cache.lock();
        let dirty = cache.dirty_pages();
        let flushed = dirty.len();
        for (page_id, node) in dirty {
            self.write_page(page_id, &node)?;
            cache.mark_clean(page_id);
        }
        drop(cache);

        if self.header_dirty.load(Ordering::Acquire) || flushed > 0 {
            self.write_header()?;
        }
        self.sync()?;
        log::debug!("Flushed {} dirty pages to {}", flushed, self.path.display());
        Ok(())
    }

    fn stats(&self) -> StorageStats {
        StorageStats {
            pages: self.header.read().next_page_id.saturating_sub(1),
            cached_pages: self.cache.lock().len() as u64,
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            disk_reads: self.counters.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.counters.disk_writes.load(Ordering::Relaxed),
        }
    }
}
