use turngate_errors::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct LlmError(pub ErrorObj);

impl LlmError {
    pub fn provider_unavailable(detail: &str) -> Self {
        LlmError(
            ErrorBuilder::new(codes::LLM_PROVIDER_UNAVAILABLE)
                .dev_msg(detail)
                .build(),
        )
    }

    pub fn schema(detail: &str) -> Self {
        LlmError(ErrorBuilder::new(codes::SCHEMA_VALIDATION).dev_msg(detail).build())
    }

    pub fn unknown(detail: &str) -> Self {
        LlmError(ErrorBuilder::new(codes::UNKNOWN_INTERNAL).dev_msg(detail).build())
    }

    /// True when the provider call itself failed and the gateway should
    /// degrade rather than surface an error.
    pub fn is_provider_unavailable(&self) -> bool {
        self.0.code == codes::LLM_PROVIDER_UNAVAILABLE.code
    }

    pub fn into_inner(self) -> ErrorObj {
        self.0
    }
}

impl From<LlmError> for ErrorObj {
    fn from(value: LlmError) -> Self {
        value.0
    }
}
