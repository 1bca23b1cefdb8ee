//! Annotation persistence collaborator and optimistic commit.
//!
//! A commit is two steps: [`begin_mutation`] changes the local list at once
//! so it can be drawn, and [`finish_mutation`] later confirms or rolls back
//! with the store's answer.

use std::cell::{Cell, RefCell};
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::annotation::{Annotation, AnnotationId, AnnotationSet, Mutation, Pending, Tag};
use crate::error::{MutationError, StoreError};
use crate::geometry::Geometry;

/// Where new annotations are attached (clip annotation / task).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentContext {
    pub id: String,
}

/// Request/response contract of the persistence backend. Every call returns
/// the authoritative post-mutation record.
pub trait AnnotationStore {
    fn create(
        &self,
        parent: &ParentContext,
        geometry: &Geometry,
        tags: &[Tag],
    ) -> impl Future<Output = Result<Annotation, StoreError>>;

    fn update(&self, annotation: &Annotation, geometry: &Geometry) -> impl Future<Output = Result<Annotation, StoreError>>;

    fn delete(&self, annotation: &Annotation) -> impl Future<Output = Result<Annotation, StoreError>>;

    fn add_tag(&self, annotation: &Annotation, tag: &Tag) -> impl Future<Output = Result<Annotation, StoreError>>;

    fn remove_tag(&self, annotation: &Annotation, tag: &Tag) -> impl Future<Output = Result<Annotation, StoreError>>;
}

/// Apply `mutation` to the local list right away. The returned receipt
/// must be handed to [`finish_mutation`].
pub fn begin_mutation(set: &RefCell<AnnotationSet>, mutation: Mutation) -> Result<Pending, MutationError> {
    set.borrow_mut().apply(mutation).inspect_err(|e| {
        if e.is_user_facing() {
            log::warn!("mutation rejected locally: {e}");
        } else {
            log::debug!("mutation resolved locally: {e}");
        }
    })
}

/// Send an applied mutation to `store`, then confirm it with the returned
/// record or roll it back.
///
/// Never holds a borrow of `set` across the store call, so other events can
/// read the optimistic state while the request is in flight.
pub async fn finish_mutation<S: AnnotationStore>(
    set: &RefCell<AnnotationSet>,
    store: &S,
    parent: &ParentContext,
    pending: Pending,
) -> Result<Annotation, MutationError> {
    let result = match (&pending.mutation, pending.original()) {
        (Mutation::Create { geometry, tags }, _) => store.create(parent, geometry, tags).await,
        (Mutation::UpdateGeometry { geometry, .. }, Some(original)) => store.update(original, geometry).await,
        (Mutation::Delete { .. }, Some(original)) => store.delete(original).await,
        (Mutation::AddTag { tag, .. }, Some(original)) => store.add_tag(original, tag).await,
        (Mutation::RemoveTag { tag, .. }, Some(original)) => store.remove_tag(original, tag).await,
        (_, None) => Err(StoreError::NotFound(pending.target.clone())),
    };

    match result {
        Ok(record) => {
            set.borrow_mut().confirm(pending, record.clone());
            Ok(record)
        }
        Err(e) => {
            log::warn!("rolling back {}: {e}", pending.target);
            set.borrow_mut().rollback(pending);
            Err(MutationError::Store(e))
        }
    }
}

/// In-process store. Backs the demo front end and the tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<Vec<Annotation>>,
    next_id: Cell<u64>,
    offline: Cell<bool>,
}

impl MemoryStore {
    pub fn new(records: Vec<Annotation>) -> Self {
        Self { records: RefCell::new(records), ..Self::default() }
    }

    pub fn records(&self) -> Vec<Annotation> {
        self.records.borrow().clone()
    }

    /// While offline every call fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.get() {
            Err(StoreError::Unavailable("store is offline".into()))
        } else {
            Ok(())
        }
    }

    fn modify(
        &self,
        id: &AnnotationId,
        f: impl FnOnce(&mut Annotation) -> Result<(), StoreError>,
    ) -> Result<Annotation, StoreError> {
        self.check_online()?;
        let mut records = self.records.borrow_mut();
        let record = records
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        f(record)?;
        Ok(record.clone())
    }
}

impl AnnotationStore for MemoryStore {
    async fn create(&self, parent: &ParentContext, geometry: &Geometry, tags: &[Tag]) -> Result<Annotation, StoreError> {
        self.check_online()?;
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        let id = AnnotationId(format!("{}-{n}", parent.id));
        let record = Annotation::new(id, geometry.normalized()).with_tags(tags.iter().cloned());
        self.records.borrow_mut().push(record.clone());
        Ok(record)
    }

    async fn update(&self, annotation: &Annotation, geometry: &Geometry) -> Result<Annotation, StoreError> {
        self.modify(&annotation.id, |record| {
            record.geometry = geometry.normalized();
            Ok(())
        })
    }

    async fn delete(&self, annotation: &Annotation) -> Result<Annotation, StoreError> {
        self.check_online()?;
        let mut records = self.records.borrow_mut();
        let index = records
            .iter()
            .position(|a| a.id == annotation.id)
            .ok_or_else(|| StoreError::NotFound(annotation.id.clone()))?;
        Ok(records.remove(index))
    }

    async fn add_tag(&self, annotation: &Annotation, tag: &Tag) -> Result<Annotation, StoreError> {
        self.modify(&annotation.id, |record| {
            record.add_tag(tag.clone());
            Ok(())
        })
    }

    async fn remove_tag(&self, annotation: &Annotation, tag: &Tag) -> Result<Annotation, StoreError> {
        self.modify(&annotation.id, |record| {
            if record.remove_tag(tag) {
                Ok(())
            } else {
                Err(StoreError::Rejected { status: 404, message: format!("no tag {tag}") })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::FutureExt;

    async fn commit<S: AnnotationStore>(
        set: &RefCell<AnnotationSet>,
        store: &S,
        parent: &ParentContext,
        mutation: Mutation,
    ) -> Result<Annotation, MutationError> {
        let pending = begin_mutation(set, mutation)?;
        finish_mutation(set, store, parent, pending).await
    }

    /// A backend that never answers.
    struct Stalled;

    impl AnnotationStore for Stalled {
        async fn create(&self, _: &ParentContext, _: &Geometry, _: &[Tag]) -> Result<Annotation, StoreError> {
            futures::future::pending().await
        }

        async fn update(&self, _: &Annotation, _: &Geometry) -> Result<Annotation, StoreError> {
            futures::future::pending().await
        }

        async fn delete(&self, _: &Annotation) -> Result<Annotation, StoreError> {
            futures::future::pending().await
        }

        async fn add_tag(&self, _: &Annotation, _: &Tag) -> Result<Annotation, StoreError> {
            futures::future::pending().await
        }

        async fn remove_tag(&self, _: &Annotation, _: &Tag) -> Result<Annotation, StoreError> {
            futures::future::pending().await
        }
    }

    fn parent() -> ParentContext {
        ParentContext { id: "clip".into() }
    }

    fn seeded() -> (RefCell<AnnotationSet>, MemoryStore) {
        let a = Annotation::new("a", Geometry::BoundingBox([1.0, 100.0, 2.0, 200.0]));
        (RefCell::new(AnnotationSet::new(vec![a.clone()])), MemoryStore::new(vec![a]))
    }

    #[test]
    fn create_is_replaced_by_server_record() {
        let (set, store) = seeded();
        let record = block_on(commit(
            &set,
            &store,
            &parent(),
            Mutation::Create { geometry: Geometry::TimeInterval([4.0, 3.0]), tags: vec![] },
        ))
        .unwrap();
        assert_eq!(record.id, AnnotationId::from("clip-0"));
        assert_eq!(record.geometry, Geometry::TimeInterval([3.0, 4.0]));
        let set = set.borrow();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(&record.id), Some(&record));
    }

    #[test]
    fn failed_update_rolls_back() {
        let (set, store) = seeded();
        let before = set.borrow().clone();
        store.set_offline(true);
        let err = block_on(commit(
            &set,
            &store,
            &parent(),
            Mutation::UpdateGeometry { id: "a".into(), geometry: Geometry::TimeStamp(9.0) },
        ))
        .unwrap_err();
        assert!(err.is_user_facing());
        assert_eq!(set.borrow().as_slice(), before.as_slice());
    }

    #[test]
    fn failed_create_leaves_no_pending_record() {
        let (set, store) = seeded();
        store.set_offline(true);
        let result = block_on(commit(
            &set,
            &store,
            &parent(),
            Mutation::Create { geometry: Geometry::TimeStamp(1.0), tags: vec![] },
        ));
        assert!(result.is_err());
        assert_eq!(set.borrow().len(), 1);
    }

    #[test]
    fn duplicate_tag_is_resolved_without_the_store() {
        let (set, store) = seeded();
        let tag = Tag::new("call", "feeding buzz");
        block_on(commit(&set, &store, &parent(), Mutation::AddTag { id: "a".into(), tag: tag.clone() }))
            .unwrap();
        // Offline store would fail any round trip; the pre-check never reaches it.
        store.set_offline(true);
        let err = block_on(commit(&set, &store, &parent(), Mutation::AddTag { id: "a".into(), tag }))
            .unwrap_err();
        assert!(matches!(err, MutationError::TagAlreadyExists { .. }));
        assert!(!err.is_user_facing());
    }

    #[test]
    fn delete_removes_from_both_sides() {
        let (set, store) = seeded();
        block_on(commit(&set, &store, &parent(), Mutation::Delete { id: "a".into() })).unwrap();
        assert!(set.borrow().is_empty());
        assert!(store.records().is_empty());
    }

    #[test]
    fn change_is_visible_while_the_store_is_pending() {
        let (set, _) = seeded();
        let moved = Geometry::TimeStamp(9.0);
        let pending =
            begin_mutation(&set, Mutation::UpdateGeometry { id: "a".into(), geometry: moved.clone() }).unwrap();
        assert_eq!(set.borrow().get(&"a".into()).map(|a| a.geometry.clone()), Some(moved.clone()));

        let parent = parent();
        let mut save = Box::pin(finish_mutation(&set, &Stalled, &parent, pending));
        assert!(save.as_mut().now_or_never().is_none());
        assert_eq!(set.borrow().get(&"a".into()).map(|a| a.geometry.clone()), Some(moved));
    }

    #[test]
    fn finish_rolls_back_an_applied_delete() {
        let (set, store) = seeded();
        let pending = begin_mutation(&set, Mutation::Delete { id: "a".into() }).unwrap();
        assert!(set.borrow().is_empty());
        store.set_offline(true);
        let err = block_on(finish_mutation(&set, &store, &parent(), pending)).unwrap_err();
        assert!(matches!(err, MutationError::Store(StoreError::Unavailable(_))));
        assert_eq!(set.borrow().len(), 1);
    }
}
