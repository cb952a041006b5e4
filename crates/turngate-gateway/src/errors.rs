use turngate_errors::prelude::*;
use turngate_llm::prelude::LlmError;
use turngate_store::prelude::StorageError;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct GatewayError(pub ErrorObj);

impl GatewayError {
    pub fn empty_message() -> Self {
        GatewayError(ErrorBuilder::new(codes::CHAT_EMPTY_MESSAGE).build())
    }

    pub fn rate_limited(user: &str) -> Self {
        GatewayError(
            ErrorBuilder::new(codes::QUOTA_RATE_LIMITED)
                .dev_msg(format!("throttle window exhausted for {user}"))
                .build(),
        )
    }

    pub fn unauthenticated(detail: &str) -> Self {
        GatewayError(
            ErrorBuilder::new(codes::AUTH_UNAUTHENTICATED)
                .dev_msg(detail)
                .build(),
        )
    }

    pub fn internal(detail: &str) -> Self {
        GatewayError(ErrorBuilder::new(codes::UNKNOWN_INTERNAL).dev_msg(detail).build())
    }

    pub fn code(&self) -> &'static str {
        self.0.code
    }

    pub fn into_inner(self) -> ErrorObj {
        self.0
    }
}

impl From<StorageError> for GatewayError {
    fn from(err: StorageError) -> Self {
        GatewayError(err.into_inner())
    }
}

impl From<LlmError> for GatewayError {
    fn from(err: LlmError) -> Self {
        GatewayError(err.into_inner())
    }
}
