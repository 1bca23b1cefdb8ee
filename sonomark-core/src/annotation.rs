//! Annotation records and the locally held annotation list.
//!
//! The list is owned by the task collaborator; this module only mirrors it
//! and applies optimistic mutations that are later confirmed (replaced by
//! the server record) or rolled back to their pre-mutation snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MutationError;
use crate::geometry::Geometry;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub String);

const PENDING_PREFIX: &str = "pending-";

impl AnnotationId {
    /// Placeholder id for a creation that the store has not confirmed yet.
    pub fn pending(n: u64) -> Self {
        AnnotationId(format!("{PENDING_PREFIX}{n}"))
    }

    pub fn is_pending(&self) -> bool {
        self.0.starts_with(PENDING_PREFIX)
    }
}

impl From<&str> for AnnotationId {
    fn from(s: &str) -> Self {
        AnnotationId(s.to_string())
    }
}

impl From<String> for AnnotationId {
    fn from(s: String) -> Self {
        AnnotationId(s)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key/value label. Two tags are the same tag when both key and value match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub geometry: Geometry,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Annotation {
    pub fn new(id: impl Into<AnnotationId>, geometry: Geometry) -> Self {
        Self { id: id.into(), geometry, tags: Vec::new() }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        for tag in tags {
            self.add_tag(tag);
        }
        self
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// Returns `false` when the tag was already present.
    pub fn add_tag(&mut self, tag: Tag) -> bool {
        if self.has_tag(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Returns `false` when the tag was not present.
    pub fn remove_tag(&mut self, tag: &Tag) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }
}

/// A change requested by the interaction layer.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    Create { geometry: Geometry, tags: Vec<Tag> },
    UpdateGeometry { id: AnnotationId, geometry: Geometry },
    Delete { id: AnnotationId },
    AddTag { id: AnnotationId, tag: Tag },
    RemoveTag { id: AnnotationId, tag: Tag },
}

#[derive(Clone, Debug, PartialEq)]
enum Snapshot {
    /// The target did not exist before the mutation (creation).
    Absent,
    Present { index: usize, annotation: Annotation },
}

/// Receipt for an optimistic mutation, consumed by `confirm` or `rollback`.
#[derive(Clone, Debug, PartialEq)]
pub struct Pending {
    pub mutation: Mutation,
    /// Id of the affected record in the local list.
    pub target: AnnotationId,
    snapshot: Snapshot,
}

impl Pending {
    /// The record as it was before the mutation, if it existed.
    pub fn original(&self) -> Option<&Annotation> {
        match &self.snapshot {
            Snapshot::Absent => None,
            Snapshot::Present { annotation, .. } => Some(annotation),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationSet {
    annotations: Vec<Annotation>,
    next_pending: u64,
}

impl AnnotationSet {
    pub fn new(annotations: Vec<Annotation>) -> Self {
        Self { annotations, next_pending: 0 }
    }

    /// Replace the whole list with an authoritative one.
    pub fn replace_all(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| &a.id == id)
    }

    fn position(&self, id: &AnnotationId) -> Result<usize, MutationError> {
        self.annotations
            .iter()
            .position(|a| &a.id == id)
            .ok_or_else(|| MutationError::NotFound(id.clone()))
    }

    /// Apply `mutation` locally and return the receipt needed to reconcile
    /// it. Tag pre-checks and malformed geometries fail here without
    /// touching the list.
    pub fn apply(&mut self, mutation: Mutation) -> Result<Pending, MutationError> {
        let (index, original) = match &mutation {
            Mutation::Create { geometry, tags } => {
                geometry.time_extent()?;
                let id = AnnotationId::pending(self.next_pending);
                self.next_pending += 1;
                let annotation = Annotation::new(id.clone(), geometry.clone()).with_tags(tags.iter().cloned());
                self.annotations.push(annotation);
                return Ok(Pending { mutation, target: id, snapshot: Snapshot::Absent });
            }
            Mutation::UpdateGeometry { id, geometry } => {
                let index = self.position(id)?;
                geometry.time_extent()?;
                let original = self.annotations[index].clone();
                self.annotations[index].geometry = geometry.clone();
                (index, original)
            }
            Mutation::Delete { id } => {
                let index = self.position(id)?;
                (index, self.annotations.remove(index))
            }
            Mutation::AddTag { id, tag } => {
                let index = self.position(id)?;
                let original = self.annotations[index].clone();
                if !self.annotations[index].add_tag(tag.clone()) {
                    return Err(MutationError::TagAlreadyExists { id: id.clone(), tag: tag.clone() });
                }
                (index, original)
            }
            Mutation::RemoveTag { id, tag } => {
                let index = self.position(id)?;
                let original = self.annotations[index].clone();
                if !self.annotations[index].remove_tag(tag) {
                    return Err(MutationError::TagDoesNotExist { id: id.clone(), tag: tag.clone() });
                }
                (index, original)
            }
        };
        let target = original.id.clone();
        Ok(Pending { mutation, target, snapshot: Snapshot::Present { index, annotation: original } })
    }

    /// Replace the optimistic record with the server's.
    pub fn confirm(&mut self, pending: Pending, record: Annotation) {
        if let Mutation::Delete { .. } = pending.mutation {
            self.annotations.retain(|a| a.id != pending.target && a.id != record.id);
            return;
        }
        match self.annotations.iter_mut().find(|a| a.id == pending.target) {
            Some(slot) => *slot = record,
            None => {
                log::debug!("confirmed {} after it left the local list", pending.target);
            }
        }
    }

    /// Restore the pre-mutation state of the target.
    pub fn rollback(&mut self, pending: Pending) {
        match pending.snapshot {
            Snapshot::Absent => self.annotations.retain(|a| a.id != pending.target),
            Snapshot::Present { index, annotation } => {
                if let Some(slot) = self.annotations.iter_mut().find(|a| a.id == annotation.id) {
                    *slot = annotation;
                } else {
                    let index = index.min(self.annotations.len());
                    self.annotations.insert(index, annotation);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeometryError;

    fn tag() -> Tag {
        Tag::new("species", "Pipistrellus")
    }

    fn set() -> AnnotationSet {
        AnnotationSet::new(vec![
            Annotation::new("a", Geometry::TimeInterval([1.0, 2.0])),
            Annotation::new("b", Geometry::BoundingBox([3.0, 100.0, 4.0, 200.0])).with_tags([tag()]),
        ])
    }

    #[test]
    fn tags_stay_unique_by_key_and_value() {
        let mut a = Annotation::new("x", Geometry::TimeStamp(1.0));
        assert!(a.add_tag(tag()));
        assert!(!a.add_tag(tag()));
        assert!(a.add_tag(Tag::new("species", "Myotis")));
        assert_eq!(a.tags.len(), 2);
    }

    #[test]
    fn create_gets_pending_id_then_server_record() {
        let mut s = set();
        let pending = s
            .apply(Mutation::Create { geometry: Geometry::TimeStamp(5.0), tags: vec![tag()] })
            .unwrap();
        assert!(pending.target.is_pending());
        assert_eq!(s.len(), 3);
        let record = Annotation::new("srv-1", Geometry::TimeStamp(5.0)).with_tags([tag()]);
        s.confirm(pending, record.clone());
        assert_eq!(s.get(&AnnotationId::from("srv-1")), Some(&record));
        assert!(s.as_slice().iter().all(|a| !a.id.is_pending()));
    }

    #[test]
    fn rollback_restores_snapshot() {
        let mut s = set();
        let before = s.clone();
        let pending = s
            .apply(Mutation::UpdateGeometry { id: "a".into(), geometry: Geometry::TimeInterval([8.0, 9.0]) })
            .unwrap();
        assert_ne!(s, before);
        s.rollback(pending);
        assert_eq!(s.as_slice(), before.as_slice());
    }

    #[test]
    fn rollback_of_delete_reinserts_in_place() {
        let mut s = set();
        let before = s.clone();
        let pending = s.apply(Mutation::Delete { id: "a".into() }).unwrap();
        assert_eq!(s.len(), 1);
        s.rollback(pending);
        assert_eq!(s.as_slice(), before.as_slice());
    }

    #[test]
    fn tag_prechecks_fail_without_changes() {
        let mut s = set();
        let before = s.clone();
        let err = s.apply(Mutation::AddTag { id: "b".into(), tag: tag() }).unwrap_err();
        assert!(matches!(err, MutationError::TagAlreadyExists { .. }));
        let err = s.apply(Mutation::RemoveTag { id: "a".into(), tag: tag() }).unwrap_err();
        assert!(matches!(err, MutationError::TagDoesNotExist { .. }));
        assert_eq!(s, before);
    }

    #[test]
    fn malformed_geometry_is_rejected_before_apply() {
        let mut s = set();
        let before = s.clone();
        let err = s
            .apply(Mutation::Create { geometry: Geometry::LineString(vec![]), tags: vec![] })
            .unwrap_err();
        assert_eq!(err, MutationError::Geometry(GeometryError::Empty { kind: "LineString" }));
        let err = s
            .apply(Mutation::UpdateGeometry { id: "a".into(), geometry: Geometry::Polygon(vec![]) })
            .unwrap_err();
        assert!(matches!(err, MutationError::Geometry(_)));
        assert!(err.is_user_facing());
        assert_eq!(s, before);
    }

    #[test]
    fn unknown_target_is_not_found() {
        let mut s = set();
        let err = s.apply(Mutation::Delete { id: "zz".into() }).unwrap_err();
        assert_eq!(err, MutationError::NotFound("zz".into()));
    }
}
