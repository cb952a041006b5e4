use turngate_errors::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StorageError(pub ErrorObj);

impl StorageError {
    pub fn validation(detail: &str) -> Self {
        StorageError(ErrorBuilder::new(codes::SCHEMA_VALIDATION).dev_msg(detail).build())
    }

    pub fn not_found(detail: &str) -> Self {
        StorageError(ErrorBuilder::new(codes::STORAGE_NOT_FOUND).dev_msg(detail).build())
    }

    pub fn unavailable(detail: &str) -> Self {
        StorageError(
            ErrorBuilder::new(codes::STORAGE_UNAVAILABLE)
                .dev_msg(detail)
                .build(),
        )
    }

    pub fn into_inner(self) -> ErrorObj {
        self.0
    }
}

impl From<StorageError> for ErrorObj {
    fn from(value: StorageError) -> Self {
        value.0
    }
}
