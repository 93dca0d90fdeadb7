//! Structural checks and summaries of a tree.

use std::fmt;

use crate::distance::DistanceQuery;
use crate::errors::MTreeResult;
use crate::storage::NodeStorage;
use crate::tree::mtree_types::{DbId, MTreeEntry, Node, PageId};

/// Slack allowed when comparing stored distances with recomputed ones
const DISTANCE_TOLERANCE: f64 = 1e-9;

/// Result of [`check_integrity`](crate::MTree::check_integrity)
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    /// Nodes visited from the root
    pub nodes_checked: u64,
    /// Objects found in leaves
    pub objects_found: u64,
    /// Depth of the deepest leaf
    pub height: u32,
    /// Human readable description of every violation
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Shape of a tree, as reported by [`summary`](crate::MTree::summary)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSummary {
    pub levels: u32,
    pub directory_nodes: u64,
    pub leaf_nodes: u64,
    pub directory_entries: u64,
    pub objects: u64,
    pub leaf_capacity: usize,
    pub directory_capacity: usize,
}

impl fmt::Display for TreeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "M-tree")?;
        writeln!(f, "  height = {}", self.levels)?;
        writeln!(f, "  leaf capacity = {}", self.leaf_capacity)?;
        writeln!(f, "  directory capacity = {}", self.directory_capacity)?;
        writeln!(
            f,
            "  {} directory nodes ({} entries)",
            self.directory_nodes, self.directory_entries
        )?;
        writeln!(f, "  {} leaf nodes", self.leaf_nodes)?;
        write!(f, "  {} objects", self.objects)
    }
}

/// Counts nodes and entries per kind by walking the whole tree.
pub(crate) fn summarize(
    storage: &dyn NodeStorage,
    leaf_capacity: usize,
    directory_capacity: usize,
) -> MTreeResult<TreeSummary> {
    let header = storage.header();
    let mut summary = TreeSummary {
        levels: header.height,
        leaf_capacity,
        directory_capacity,
        ..TreeSummary::default()
    };

    let mut pending: Vec<PageId> = header.root().into_iter().collect();
    while let Some(page_id) = pending.pop() {
        match &*storage.read_node(page_id)? {
            Node::Leaf { entries } => {
                summary.leaf_nodes += 1;
                summary.objects += entries.len() as u64;
            }
            Node::Directory { entries } => {
                summary.directory_nodes += 1;
                summary.directory_entries += entries.len() as u64;
                pending.extend(entries.iter().map(|e| e.child_page));
            }
        }
    }
    Ok(summary)
}

/// Walks the tree and verifies:
/// - parent distances match the recomputed distance to the parent routing object
/// - every object lies within the covering radius of each routing object above it
/// - all leaves sit at the depth recorded in the header
/// - node sizes respect the capacities and the object count matches the header
///
/// Storage and distance failures abort the check; structural violations are
/// collected in the report.
pub(crate) fn check_integrity<Q: DistanceQuery + ?Sized>(
    storage: &dyn NodeStorage,
    distances: &Q,
    leaf_capacity: usize,
    directory_capacity: usize,
) -> MTreeResult<IntegrityReport> {
    let header = storage.header();
    let mut report = IntegrityReport::default();

    if let Err(e) = header.validate() {
        report.errors.push(format!("Invalid header: {}", e));
        return Ok(report);
    }

    let Some(root) = header.root() else {
        if header.entry_count != 0 {
            report.errors.push(format!(
                "empty tree records {} entries",
                header.entry_count
            ));
        }
        return Ok(report);
    };

    let checker = Checker {
        storage,
        distances,
        leaf_capacity,
        directory_capacity,
        expected_height: header.height,
    };
    checker.check_node(root, None, 1, &mut report)?;

    if report.objects_found != header.entry_count {
        report.errors.push(format!(
            "header records {} entries but {} objects were found",
            header.entry_count, report.objects_found
        ));
    }
    if !report.is_valid() {
        log::warn!(
            "Integrity check found {} problems, first: {}",
            report.errors.len(),
            report.errors[0]
        );
    }
    Ok(report)
}

struct Checker<'a, Q: DistanceQuery + ?Sized> {
    storage: &'a dyn NodeStorage,
    distances: &'a Q,
    leaf_capacity: usize,
    directory_capacity: usize,
    expected_height: u32,
}

impl<Q: DistanceQuery + ?Sized> Checker<'_, Q> {
    /// Checks the subtree at `page_id` and returns the objects it holds.
    fn check_node(
        &self,
        page_id: PageId,
        parent_routing: Option<DbId>,
        depth: u32,
        report: &mut IntegrityReport,
    ) -> MTreeResult<Vec<DbId>> {
        let node = self.storage.read_node(page_id)?;
        report.nodes_checked += 1;
        report.height = report.height.max(depth);

        if node.is_empty() {
            report.errors.push(format!("page {}: empty node", page_id));
        }
        let capacity = if node.is_leaf() {
            self.leaf_capacity
        } else {
            self.directory_capacity
        };
        if node.num_entries() > capacity {
            report.errors.push(format!(
                "page {}: {} entries exceed capacity {}",
                page_id,
                node.num_entries(),
                capacity
            ));
        }

        for entry in node.entries() {
            self.check_parent_distance(page_id, entry, parent_routing, report)?;
        }

        match &*node {
            Node::Leaf { entries } => {
                if depth != self.expected_height {
                    report.errors.push(format!(
                        "page {}: leaf at depth {} but tree height is {}",
                        page_id, depth, self.expected_height
                    ));
                }
                report.objects_found += entries.len() as u64;
                Ok(entries.iter().map(|e| e.object_id).collect())
            }
            Node::Directory { entries } => {
                let mut objects = Vec::new();
                for entry in entries {
                    let below = self.check_node(
                        entry.child_page,
                        Some(entry.routing_object_id),
                        depth + 1,
                        report,
                    )?;
                    for &object_id in &below {
                        let distance = self
                            .distances
                            .distance(entry.routing_object_id, object_id)?;
                        if distance > entry.covering_radius + DISTANCE_TOLERANCE {
                            report.errors.push(format!(
                                "page {}: object {} at distance {} outside covering radius {} of {}",
                                page_id,
                                object_id,
                                distance,
                                entry.covering_radius,
                                entry.routing_object_id
                            ));
                        }
                    }
                    objects.extend(below);
                }
                Ok(objects)
            }
        }
    }

    fn check_parent_distance(
        &self,
        page_id: PageId,
        entry: &dyn MTreeEntry,
        parent_routing: Option<DbId>,
        report: &mut IntegrityReport,
    ) -> MTreeResult<()> {
        let expected = match parent_routing {
            Some(parent) => self
                .distances
                .distance(parent, entry.routing_object_id())?,
            None => 0.0,
        };
        if (expected - entry.parent_distance()).abs() > DISTANCE_TOLERANCE {
            report.errors.push(format!(
                "page {}: entry {} stores parent distance {} but is {} away",
                page_id,
                entry.routing_object_id(),
                entry.parent_distance(),
                expected
            ));
        }
        Ok(())
    }
}
