use thiserror::Error;

/// Errors surfaced by the store contract.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: '{id}'")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} already exists: '{id}'")]
    AlreadyExists { entity: &'static str, id: String },
    #[error("version conflict updating budget pool '{id}'")]
    VersionConflict { id: String },
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn already_exists(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::AlreadyExists {
            entity,
            id: id.into(),
        }
    }
}
