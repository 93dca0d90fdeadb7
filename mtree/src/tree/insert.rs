//! Insertion and node splitting.
//!
//! An object descends along one routing entry per level to a leaf. On the
//! way down, the chosen entry's covering radius grows just enough to cover
//! the new object. A node that overflows is split in two: the farthest pair
//! of its routing objects is promoted and every entry joins the closer one.
//! The two resulting routing entries replace the old one in the parent,
//! which may overflow in turn; a split of the root adds a new level.

use crate::distance::DistanceQuery;
use crate::errors::{MTreeError, MTreeResult};
use crate::storage::NodeStorage;
use crate::tree::mtree_types::{DbId, DirectoryEntry, LeafEntry, Node, PageId};

/// Result of inserting into a subtree.
#[derive(Debug)]
enum InsertOutcome {
    /// The subtree absorbed the object.
    Fit,
    /// The subtree root was split; both entries still need a parent distance.
    Split(DirectoryEntry, DirectoryEntry),
}

/// Parent routing object and its distance to the object being inserted.
#[derive(Debug, Clone, Copy)]
struct ParentRouting {
    object_id: DbId,
    distance_to_new: f64,
}

/// Split of a set of routing objects between two promoted objects.
struct Partition {
    first: usize,
    second: usize,
    /// For each entry: `true` if it joins `second`, and its distance to the
    /// promoted object it joins.
    assignment: Vec<(bool, f64)>,
}

pub(crate) struct Inserter<'a, Q: DistanceQuery + ?Sized> {
    storage: &'a dyn NodeStorage,
    distances: &'a Q,
    leaf_capacity: usize,
    directory_capacity: usize,
}

impl<'a, Q: DistanceQuery + ?Sized> Inserter<'a, Q> {
    pub fn new(
        storage: &'a dyn NodeStorage,
        distances: &'a Q,
        leaf_capacity: usize,
        directory_capacity: usize,
    ) -> Self {
        Self {
            storage,
            distances,
            leaf_capacity,
            directory_capacity,
        }
    }

    /// Inserts the stored object `id`.
    pub fn insert(&self, id: DbId) -> MTreeResult<()> {
        if !self.distances.contains(id) {
            return Err(MTreeError::NotFound(format!(
                "object {} is unknown to the distance query",
                id
            )));
        }

        let mut header = self.storage.header();
        match header.root() {
            None => {
                let page_id = self.storage.allocate_page()?;
                self.storage.write_node(
                    page_id,
                    Node::Leaf {
                        entries: vec![LeafEntry::new(id, 0.0)],
                    },
                )?;
                header = self.storage.header();
                header.root_page = page_id;
                header.height = 1;
                log::debug!("Created root leaf at page {}", page_id);
            }
            Some(root) => {
                if let InsertOutcome::Split(first, second) = self.insert_into(root, None, id)? {
                    let page_id = self.storage.allocate_page()?;
                    self.storage.write_node(
                        page_id,
                        Node::Directory {
                            entries: vec![
                                with_parent_distance(first, 0.0),
                                with_parent_distance(second, 0.0),
                            ],
                        },
                    )?;
                    header = self.storage.header();
                    header.root_page = page_id;
                    header.height += 1;
                    log::debug!(
                        "Root split, new root at page {} (height {})",
                        page_id,
                        header.height
                    );
                } else {
                    header = self.storage.header();
                }
            }
        }

        header.entry_count += 1;
        self.storage.set_header(header)
    }

    fn insert_into(
        &self,
        page_id: PageId,
        parent: Option<ParentRouting>,
        id: DbId,
    ) -> MTreeResult<InsertOutcome> {
        let node = self.storage.read_node(page_id)?;
        match &*node {
            Node::Leaf { entries } => {
                let parent_distance = parent.map_or(0.0, |p| p.distance_to_new);
                let mut entries = entries.clone();
                entries.push(LeafEntry::new(id, parent_distance));

                if entries.len() > self.leaf_capacity {
                    self.split_leaf(page_id, entries)
                } else {
                    self.storage.write_node(page_id, Node::Leaf { entries })?;
                    Ok(InsertOutcome::Fit)
                }
            }
            Node::Directory { entries } => {
                let mut entries = entries.clone();
                let (index, distance) = self.choose_subtree(&entries, id)?;
                let enlarged = distance > entries[index].covering_radius;
                if enlarged {
                    entries[index].covering_radius = distance;
                }

                let chosen = entries[index];
                let routing = ParentRouting {
                    object_id: chosen.routing_object_id,
                    distance_to_new: distance,
                };
                match self.insert_into(chosen.child_page, Some(routing), id)? {
                    InsertOutcome::Fit => {
                        if enlarged {
                            self.storage
                                .write_node(page_id, Node::Directory { entries })?;
                        }
                        Ok(InsertOutcome::Fit)
                    }
                    InsertOutcome::Split(first, second) => {
                        let first = self.attach(first, parent)?;
                        let second = self.attach(second, parent)?;
                        entries[index] = first;
                        entries.push(second);

                        if entries.len() > self.directory_capacity {
                            self.split_directory(page_id, entries)
                        } else {
                            self.storage
                                .write_node(page_id, Node::Directory { entries })?;
                            Ok(InsertOutcome::Fit)
                        }
                    }
                }
            }
        }
    }

    /// Picks the entry to descend into and returns it with the distance from
    /// its routing object to `id`. An entry whose ball already contains the
    /// object wins (closest first); otherwise the smallest enlargement.
    fn choose_subtree(&self, entries: &[DirectoryEntry], id: DbId) -> MTreeResult<(usize, f64)> {
        let mut best_covering: Option<(usize, f64)> = None;
        let mut best_enlarging: Option<(usize, f64, f64)> = None;

        for (index, entry) in entries.iter().enumerate() {
            let distance = self.distances.distance(entry.routing_object_id, id)?;
            if distance <= entry.covering_radius {
                if best_covering.map_or(true, |(_, best)| distance < best) {
                    best_covering = Some((index, distance));
                }
            } else {
                let enlargement = distance - entry.covering_radius;
                if best_enlarging.map_or(true, |(_, _, best)| enlargement < best) {
                    best_enlarging = Some((index, distance, enlargement));
                }
            }
        }

        best_covering
            .or_else(|| best_enlarging.map(|(index, distance, _)| (index, distance)))
            .ok_or_else(|| MTreeError::Corrupted("directory node without entries".into()))
    }

    /// Sets the parent distance of a freshly split entry.
    fn attach(
        &self,
        entry: DirectoryEntry,
        parent: Option<ParentRouting>,
    ) -> MTreeResult<DirectoryEntry> {
        let parent_distance = match parent {
            Some(p) => self
                .distances
                .distance(p.object_id, entry.routing_object_id)?,
            None => 0.0,
        };
        Ok(with_parent_distance(entry, parent_distance))
    }

    fn split_leaf(&self, page_id: PageId, entries: Vec<LeafEntry>) -> MTreeResult<InsertOutcome> {
        let routing: Vec<DbId> = entries.iter().map(|e| e.object_id).collect();
        let partition = self.partition(&routing)?;

        let mut groups: [Vec<LeafEntry>; 2] = [Vec::new(), Vec::new()];
        let mut radii = [0.0f64; 2];
        for (entry, &(to_second, distance)) in entries.iter().zip(&partition.assignment) {
            let side = usize::from(to_second);
            groups[side].push(LeafEntry::new(entry.object_id, distance));
            radii[side] = radii[side].max(distance);
        }

        let [first, second] = groups;
        let second_page = self.storage.allocate_page()?;
        self.storage
            .write_node(page_id, Node::Leaf { entries: first })?;
        self.storage
            .write_node(second_page, Node::Leaf { entries: second })?;
        log::trace!("Split leaf {} into {} and {}", page_id, page_id, second_page);

        Ok(InsertOutcome::Split(
            DirectoryEntry::new(routing[partition.first], radii[0], 0.0, page_id),
            DirectoryEntry::new(routing[partition.second], radii[1], 0.0, second_page),
        ))
    }

    fn split_directory(
        &self,
        page_id: PageId,
        entries: Vec<DirectoryEntry>,
    ) -> MTreeResult<InsertOutcome> {
        let routing: Vec<DbId> = entries.iter().map(|e| e.routing_object_id).collect();
        let partition = self.partition(&routing)?;

        let mut groups: [Vec<DirectoryEntry>; 2] = [Vec::new(), Vec::new()];
        let mut radii = [0.0f64; 2];
        for (entry, &(to_second, distance)) in entries.iter().zip(&partition.assignment) {
            let side = usize::from(to_second);
            groups[side].push(with_parent_distance(*entry, distance));
            radii[side] = radii[side].max(distance + entry.covering_radius);
        }

        let [first, second] = groups;
        let second_page = self.storage.allocate_page()?;
        self.storage
            .write_node(page_id, Node::Directory { entries: first })?;
        self.storage
            .write_node(second_page, Node::Directory { entries: second })?;
        log::trace!(
            "Split directory {} into {} and {}",
            page_id,
            page_id,
            second_page
        );

        Ok(InsertOutcome::Split(
            DirectoryEntry::new(routing[partition.first], radii[0], 0.0, page_id),
            DirectoryEntry::new(routing[partition.second], radii[1], 0.0, second_page),
        ))
    }

    /// Promotes the farthest pair of routing objects and assigns every entry
    /// to the closer one; ties go to the smaller group.
    fn partition(&self, routing: &[DbId]) -> MTreeResult<Partition> {
        let n = routing.len();
        let mut matrix = vec![0.0f64; n * n];
        let mut first = 0;
        let mut second = 1;
        let mut farthest = f64::NEG_INFINITY;

        for i in 0..n {
            for j in (i + 1)..n {
                let distance = self.distances.distance(routing[i], routing[j])?;
                matrix[i * n + j] = distance;
                matrix[j * n + i] = distance;
                if distance > farthest {
                    farthest = distance;
                    first = i;
                    second = j;
                }
            }
        }

        let mut sizes = [0usize; 2];
        let mut assignment = Vec::with_capacity(n);
        for i in 0..n {
            let to_first = matrix[first * n + i];
            let to_second = matrix[second * n + i];
            let joins_second = if i == first {
                false
            } else if i == second {
                true
            } else if to_first != to_second {
                to_second < to_first
            } else {
                sizes[1] < sizes[0]
            };
            sizes[usize::from(joins_second)] += 1;
            let distance = if joins_second { to_second } else { to_first };
            assignment.push((joins_second, distance));
        }

        Ok(Partition {
            first,
            second,
            assignment,
        })
    }
}

fn with_parent_distance(mut entry: DirectoryEntry, parent_distance: f64) -> DirectoryEntry {
    entry.parent_distance = parent_distance;
    entry
}
