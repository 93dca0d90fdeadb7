//! In-memory object store and the distance query bound to it.

use std::borrow::Borrow;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::distance::{DistanceFunction, DistanceQuery};
use crate::errors::{MTreeError, MTreeResult};
use crate::tree::mtree_types::DbId;

/// A cloneable, thread-safe store of objects addressed by [`DbId`].
///
/// Ids handed out by [`insert`](Relation::insert) start at 1 and increase
/// monotonically. Clones share the same storage.
pub struct Relation<O> {
    inner: Arc<RelationInner<O>>,
}

struct RelationInner<O> {
    objects: RwLock<IndexMap<DbId, O>>,
    next_id: AtomicU64,
}

impl<O> Clone for Relation<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O> Relation<O> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RelationInner {
                objects: RwLock::new(IndexMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Stores an object under a fresh id.
    pub fn insert(&self, object: O) -> DbId {
        let mut objects = self.inner.objects.write();
        let mut id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        while objects.contains_key(&id) {
            id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        }
        objects.insert(id, object);
        id
    }

    /// Stores an object under an explicit id.
    pub fn insert_with_id(&self, id: DbId, object: O) -> MTreeResult<()> {
        let mut objects = self.inner.objects.write();
        if objects.contains_key(&id) {
            return Err(MTreeError::InvalidOperation(format!(
                "object {} already exists",
                id
            )));
        }
        objects.insert(id, object);
        self.inner.next_id.fetch_max(id + 1, Ordering::Relaxed);
        Ok(())
    }

    /// Runs `f` against the object stored under `id`.
    pub fn with_object<R>(&self, id: DbId, f: impl FnOnce(&O) -> R) -> Option<R> {
        self.inner.objects.read().get(&id).map(f)
    }

    pub fn contains(&self, id: DbId) -> bool {
        self.inner.objects.read().contains_key(&id)
    }

    /// All ids in insertion order.
    pub fn ids(&self) -> Vec<DbId> {
        self.inner.objects.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<O: Clone> Relation<O> {
    pub fn get(&self, id: DbId) -> Option<O> {
        self.inner.objects.read().get(&id).cloned()
    }
}

impl<O> Default for Relation<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> FromIterator<O> for Relation<O> {
    fn from_iter<I: IntoIterator<Item = O>>(iter: I) -> Self {
        let relation = Relation::new();
        for object in iter {
            relation.insert(object);
        }
        relation
    }
}

/// Binds a [`Relation`] to a [`DistanceFunction`].
///
/// `T` is the borrowed form the distance function works on, so a relation of
/// `Vec<f64>` can be queried with plain `&[f64]` slices.
pub struct RelationDistanceQuery<O, T: ?Sized, F> {
    relation: Relation<O>,
    function: F,
    _marker: PhantomData<fn(&T)>,
}

impl<O, T, F> RelationDistanceQuery<O, T, F>
where
    O: Borrow<T>,
    T: ?Sized,
    F: DistanceFunction<T>,
{
    pub fn new(relation: Relation<O>, function: F) -> Self {
        Self {
            relation,
            function,
            _marker: PhantomData,
        }
    }

    pub fn relation(&self) -> &Relation<O> {
        &self.relation
    }

    pub fn function(&self) -> &F {
        &self.function
    }
}

impl<O, T, F> DistanceQuery for RelationDistanceQuery<O, T, F>
where
    O: Borrow<T> + Send + Sync,
    T: ?Sized,
    F: DistanceFunction<T>,
{
    type Object = T;

    fn distance(&self, a: DbId, b: DbId) -> MTreeResult<f64> {
        let objects = self.relation.inner.objects.read();
        let oa = objects.get(&a).ok_or_else(|| missing(a))?;
        let ob = objects.get(&b).ok_or_else(|| missing(b))?;
        Ok(self.function.distance(oa.borrow(), ob.borrow()))
    }

    fn distance_to_object(&self, query: &T, id: DbId) -> MTreeResult<f64> {
        self.relation
            .with_object(id, |o| self.function.distance(query, o.borrow()))
            .ok_or_else(|| missing(id))
    }

    fn contains(&self, id: DbId) -> bool {
        self.relation.contains(id)
    }
}

/// Distance query over a relation of `f64` vectors.
pub type VectorDistanceQuery<F> = RelationDistanceQuery<Vec<f64>, [f64], F>;

fn missing(id: DbId) -> MTreeError {
    MTreeError::NotFound(format!("object {} is not in the relation", id))
}
