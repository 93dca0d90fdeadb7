//! Core types and data structures of the M-tree.
//!
//! This module defines:
//! - Identifier types for objects and pages
//! - Entry types (leaf and directory) and the node sum type
//! - The file header and checksummed page wrapper used by page files
//! - Tree statistics

use serde::{Deserialize, Serialize};

use crate::errors::{MTreeError, MTreeResult};
use crate::storage::StorageStats;
use crate::tree::mtree_constants::{
    DEFAULT_DIRECTORY_CAPACITY, DEFAULT_LEAF_CAPACITY, MAGIC, PAGE_SIZE, VERSION,
};

/// Identifier of an object in the backing relation.
pub type DbId = u64;

/// Page ID - unique identifier for a node/page in node storage
pub type PageId = u64;

// ============================================================================
// Statistics
// ============================================================================

/// Statistics about an M-tree and the queries run against it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MTreeStats {
    pub total_entries: u64,
    pub tree_height: u32,
    pub knn_queries: u64,
    pub range_queries: u64,
    pub distance_calculations: u64,
    pub storage: StorageStats,
}

// ============================================================================
// Entries
// ============================================================================

/// Common read access to leaf and directory entries.
pub trait MTreeEntry {
    /// The routing object (for leaf entries: the indexed object itself).
    fn routing_object_id(&self) -> DbId;

    /// Distance from the routing object to the routing object of the parent
    /// entry, 0 for entries stored in the root node.
    fn parent_distance(&self) -> f64;

    /// Covering radius of the subtree, always 0 for leaf entries.
    fn covering_radius(&self) -> f64;

    /// Child page referenced by a directory entry.
    fn child_page(&self) -> Option<PageId>;

    fn is_leaf_entry(&self) -> bool {
        self.child_page().is_none()
    }
}

/// An object stored in a leaf node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeafEntry {
    pub object_id: DbId,
    pub parent_distance: f64,
}

impl LeafEntry {
    pub fn new(object_id: DbId, parent_distance: f64) -> Self {
        Self {
            object_id,
            parent_distance,
        }
    }
}

impl MTreeEntry for LeafEntry {
    fn routing_object_id(&self) -> DbId {
        self.object_id
    }

    fn parent_distance(&self) -> f64 {
        self.parent_distance
    }

    fn covering_radius(&self) -> f64 {
        0.0
    }

    fn child_page(&self) -> Option<PageId> {
        None
    }
}

/// A routing entry in a directory node, covering one child page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub routing_object_id: DbId,
    pub covering_radius: f64,
    pub parent_distance: f64,
    pub child_page: PageId,
}

impl DirectoryEntry {
    pub fn new(
        routing_object_id: DbId,
        covering_radius: f64,
        parent_distance: f64,
        child_page: PageId,
    ) -> Self {
        Self {
            routing_object_id,
            covering_radius,
            parent_distance,
            child_page,
        }
    }
}

impl MTreeEntry for DirectoryEntry {
    fn routing_object_id(&self) -> DbId {
        self.routing_object_id
    }

    fn parent_distance(&self) -> f64 {
        self.parent_distance
    }

    fn covering_radius(&self) -> f64 {
        self.covering_radius
    }

    fn child_page(&self) -> Option<PageId> {
        Some(self.child_page)
    }
}

// ============================================================================
// Node
// ============================================================================

/// Node types in the M-tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Leaf node containing the indexed objects
    Leaf { entries: Vec<LeafEntry> },
    /// Directory node containing routing entries
    Directory { entries: Vec<DirectoryEntry> },
}

impl Node {
    pub fn empty_leaf() -> Self {
        Node::Leaf {
            entries: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    pub fn num_entries(&self) -> usize {
        match self {
            Node::Leaf { entries } => entries.len(),
            Node::Directory { entries } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries() == 0
    }

    /// Returns the entry at `index`, if any.
    pub fn entry(&self, index: usize) -> Option<&dyn MTreeEntry> {
        match self {
            Node::Leaf { entries } => entries.get(index).map(|e| e as &dyn MTreeEntry),
            Node::Directory { entries } => entries.get(index).map(|e| e as &dyn MTreeEntry),
        }
    }

    /// Iterates over all entries regardless of the node kind.
    pub fn entries(&self) -> Box<dyn Iterator<Item = &dyn MTreeEntry> + '_> {
        match self {
            Node::Leaf { entries } => Box::new(entries.iter().map(|e| e as &dyn MTreeEntry)),
            Node::Directory { entries } => {
                Box::new(entries.iter().map(|e| e as &dyn MTreeEntry))
            }
        }
    }

    /// Returns true if the node holds more entries than `capacity` allows.
    pub fn has_overflow(&self, leaf_capacity: usize, directory_capacity: usize) -> bool {
        match self {
            Node::Leaf { entries } => entries.len() > leaf_capacity,
            Node::Directory { entries } => entries.len() > directory_capacity,
        }
    }
}

// ============================================================================
// Page with Checksum
// ============================================================================

/// A serialized node wrapped with a CRC32 checksum for corruption detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageWithChecksum {
    /// CRC32 checksum of `payload`
    pub checksum: u32,
    /// bincode-encoded node
    pub payload: Vec<u8>,
}

impl PageWithChecksum {
    pub fn new(node: &Node) -> MTreeResult<Self> {
        let payload = bincode::serde::encode_to_vec(node, bincode::config::legacy())?;
        Ok(Self {
            checksum: crc32(&payload),
            payload,
        })
    }

    /// Verify checksum (if requested) and decode the node
    pub fn into_node(self, verify: bool) -> MTreeResult<Node> {
        if verify {
            let actual = crc32(&self.payload);
            if actual != self.checksum {
                return Err(MTreeError::Corrupted(format!(
                    "page checksum mismatch (expected: {:x}, got: {:x})",
                    self.checksum, actual
                )));
            }
        }
        let (node, _) = bincode::serde::decode_from_slice(&self.payload, bincode::config::legacy())?;
        Ok(node)
    }
}

/// CRC32-MPEG2 checksum
pub(crate) fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFFFFFF;
    const POLY: u32 = 0x04C11DB7;

    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x80000000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }

    crc ^ 0xFFFFFFFF
}

// ============================================================================
// File Header
// ============================================================================

/// Tree metadata; stored in page 0 of a page file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    /// Root page, 0 while the tree is empty
    pub root_page: PageId,
    pub next_page_id: PageId,
    pub entry_count: u64,
    /// Number of levels, 0 for an empty tree and 1 for a single leaf root
    pub height: u32,
    pub leaf_capacity: u32,
    pub directory_capacity: u32,
}

impl FileHeader {
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            page_size: PAGE_SIZE as u32,
            root_page: 0,
            next_page_id: 1,
            entry_count: 0,
            height: 0,
            leaf_capacity: DEFAULT_LEAF_CAPACITY as u32,
            directory_capacity: DEFAULT_DIRECTORY_CAPACITY as u32,
        }
    }

    pub fn root(&self) -> Option<PageId> {
        (self.root_page != 0).then_some(self.root_page)
    }

    pub fn validate(&self) -> MTreeResult<()> {
        if self.magic != MAGIC {
            return Err(MTreeError::Corrupted(
                "invalid file format (bad magic)".into(),
            ));
        }
        if self.version != VERSION {
            return Err(MTreeError::Corrupted(format!(
                "unsupported file format version {}",
                self.version
            )));
        }
        Ok(())
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}
