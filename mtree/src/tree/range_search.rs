//! Range queries.
//!
//! Depth-first traversal that keeps every subtree whose covering ball
//! intersects the query ball. The distance from the query to the parent
//! routing object, together with the stored parent distances, lets the
//! search discard entries through the triangle inequality without
//! computing their distance to the query.

use crate::errors::MTreeResult;
use crate::results::{DistanceResult, RangeCollector};
use crate::tree::mtree_types::{DbId, Node, PageId};
use crate::tree::query_context::QueryContext;

/// Finds all objects within `radius` of the query and hands them to
/// `collector`, in traversal order.
///
/// Matches are buffered until the traversal completes so that a storage or
/// distance failure never leaves a partial result in the collector.
pub(crate) fn range_search<C>(
    ctx: &QueryContext<'_>,
    radius: f64,
    collector: &mut C,
) -> MTreeResult<()>
where
    C: RangeCollector + ?Sized,
{
    let Some(root) = ctx.storage.root_page() else {
        return Ok(());
    };

    let mut matches = Vec::new();
    search_node(ctx, None, root, radius, &mut matches)?;
    for result in matches {
        collector.add(result.distance, result.id);
    }
    Ok(())
}

fn search_node(
    ctx: &QueryContext<'_>,
    parent: Option<DbId>,
    page_id: PageId,
    radius: f64,
    matches: &mut Vec<DistanceResult>,
) -> MTreeResult<()> {
    let node = ctx.storage.read_node(page_id)?;
    let d1 = match parent {
        Some(routing_object_id) => ctx.distance(routing_object_id)?,
        None => 0.0,
    };

    match &*node {
        Node::Directory { entries } => {
            for entry in entries {
                let reach = radius + entry.covering_radius;
                if parent.is_some() && (d1 - entry.parent_distance).abs() > reach {
                    continue;
                }
                let d3 = ctx.distance(entry.routing_object_id)?;
                if d3 <= reach {
                    search_node(
                        ctx,
                        Some(entry.routing_object_id),
                        entry.child_page,
                        radius,
                        matches,
                    )?;
                }
            }
        }
        Node::Leaf { entries } => {
            for entry in entries {
                if parent.is_some() && (d1 - entry.parent_distance).abs() > radius {
                    continue;
                }
                let d3 = ctx.distance(entry.object_id)?;
                if d3 <= radius {
                    matches.push(DistanceResult::new(d3, entry.object_id));
                }
            }
        }
    }
    Ok(())
}
