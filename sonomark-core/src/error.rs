use crate::annotation::{AnnotationId, Tag};

/// A geometry operation could not be carried out. Aborts that one operation
/// only; other annotations are untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("unsupported geometry type '{0}'")]
    UnsupportedVariant(String),
    #[error("{kind} has no coordinates")]
    Empty { kind: &'static str },
    #[error("malformed geometry: {0}")]
    Malformed(String),
    #[error("{kind} has no vertex {index}")]
    VertexOutOfRange { kind: &'static str, index: usize },
}

/// Failure to produce a ready segment image. Recorded per cache key.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("image service answered with status {0}")]
    Status(u16),
    #[error("failed to decode segment image: {0}")]
    Decode(String),
    #[error("segment fetch timed out after {0} ms")]
    Timeout(u64),
}

/// Failure reported by the annotation persistence collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("annotation store unavailable: {0}")]
    Unavailable(String),
    #[error("annotation store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("annotation {0} does not exist in the store")]
    NotFound(AnnotationId),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    #[error("annotation {id} already has tag {tag}")]
    TagAlreadyExists { id: AnnotationId, tag: Tag },
    #[error("annotation {id} has no tag {tag}")]
    TagDoesNotExist { id: AnnotationId, tag: Tag },
    #[error("annotation {0} is not in the current set")]
    NotFound(AnnotationId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl MutationError {
    /// Tag pre-check failures are a harmless race between two edits of the
    /// same tag set and are kept out of user-facing error reporting.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            MutationError::TagAlreadyExists { .. } | MutationError::TagDoesNotExist { .. }
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML config: {0}")]
    Yaml(String),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_prechecks_are_not_user_facing() {
        let id = AnnotationId::from("a1");
        let tag = Tag::new("species", "Myotis");
        assert!(!MutationError::TagAlreadyExists { id: id.clone(), tag: tag.clone() }.is_user_facing());
        assert!(!MutationError::TagDoesNotExist { id: id.clone(), tag }.is_user_facing());
        assert!(MutationError::NotFound(id).is_user_facing());
        assert!(MutationError::Store(StoreError::Unavailable("offline".into())).is_user_facing());
    }
}
