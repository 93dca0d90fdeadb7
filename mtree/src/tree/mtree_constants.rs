//! Constants for the M-tree page layout.

/// Default page size (16KB) - balances I/O efficiency and memory usage
pub const PAGE_SIZE: usize = 16384;

/// Default maximum number of entries per leaf node
pub const DEFAULT_LEAF_CAPACITY: usize = 64;

/// Default maximum number of entries per directory node
pub const DEFAULT_DIRECTORY_CAPACITY: usize = 64;

/// Smallest capacity that still allows a node to be split in two
pub const MIN_CAPACITY: usize = 2;

/// Default cache size in number of pages (16MB with 16KB pages)
pub const DEFAULT_CACHE_PAGES: usize = 1024;

/// Magic number for file format identification
pub const MAGIC: u32 = 0x4E4D5452; // "NMTR" - metric tree

/// File format version
pub const VERSION: u32 = 1;

/// Page reserved for the file header
pub const HEADER_PAGE: u64 = 0;

/// Smallest accepted page size; the header must fit in one page
pub const MIN_PAGE_SIZE: usize = 512;
