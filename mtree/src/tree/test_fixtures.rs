//! Hand-built trees shared by the unit tests of the search algorithms.

use crate::errors::{MTreeError, MTreeResult};
use crate::storage::{MemoryStorage, NodeStorage};
use crate::tree::mtree_types::{DbId, DirectoryEntry, LeafEntry, Node};

pub const A: DbId = 1;
pub const B: DbId = 2;
pub const C: DbId = 3;
pub const D: DbId = 4;
pub const E: DbId = 5;

pub fn point(x: f64, y: f64) -> [f64; 2] {
    [x, y]
}

fn coordinates(id: DbId) -> Option<[f64; 2]> {
    match id {
        A => Some(point(0.0, 0.0)),
        B => Some(point(1.0, 0.0)),
        C => Some(point(0.0, 1.0)),
        D => Some(point(5.0, 5.0)),
        E => Some(point(6.0, 5.0)),
        _ => None,
    }
}

/// Euclidean distance from `query` to one of the five fixture points.
pub fn euclidean_to(query: [f64; 2]) -> impl Fn(DbId) -> MTreeResult<f64> {
    move |id| {
        let [x, y] = coordinates(id)
            .ok_or_else(|| MTreeError::NotFound(format!("object {}", id)))?;
        Ok(((x - query[0]).powi(2) + (y - query[1]).powi(2)).sqrt())
    }
}

/// A(0,0) B(1,0) C(0,1) under routing object A, D(5,5) E(6,5) under D.
pub fn five_points_tree() -> MemoryStorage {
    let storage = MemoryStorage::new();
    let left = storage.allocate_page().unwrap();
    let right = storage.allocate_page().unwrap();
    let root = storage.allocate_page().unwrap();

    storage
        .write_node(
            left,
            Node::Leaf {
                entries: vec![
                    LeafEntry::new(A, 0.0),
                    LeafEntry::new(B, 1.0),
                    LeafEntry::new(C, 1.0),
                ],
            },
        )
        .unwrap();
    storage
        .write_node(
            right,
            Node::Leaf {
                entries: vec![LeafEntry::new(D, 0.0), LeafEntry::new(E, 1.0)],
            },
        )
        .unwrap();
    storage
        .write_node(
            root,
            Node::Directory {
                entries: vec![
                    DirectoryEntry::new(A, 1.0, 0.0, left),
                    DirectoryEntry::new(D, 1.0, 0.0, right),
                ],
            },
        )
        .unwrap();

    let mut header = storage.header();
    header.root_page = root;
    header.height = 2;
    header.entry_count = 5;
    storage.set_header(header).unwrap();
    storage
}
