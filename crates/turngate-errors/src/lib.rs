pub mod codes;

use serde::{Deserialize, Serialize};

pub mod prelude {
    pub use crate::codes;
    pub use crate::{ErrorBuilder, ErrorCode, ErrorObj, PublicErrorView, RetryClass};
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryClass {
    None,
    Transient,
    Permanent,
}

impl RetryClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            RetryClass::None => "none",
            RetryClass::Transient => "transient",
            RetryClass::Permanent => "permanent",
        }
    }
}

/// A stable error code: dotted machine name, HTTP mapping, retry hint, and
/// the message callers are allowed to see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: &'static str,
    pub http_status: u16,
    pub retry: RetryClass,
    pub user_msg: &'static str,
}

/// The carried error value. `message_dev` is for operators and logs only;
/// `to_public` strips it.
#[derive(Clone, Debug)]
pub struct ErrorObj {
    pub code: &'static str,
    pub http_status: u16,
    pub retry: RetryClass,
    pub message_user: &'static str,
    pub message_dev: Option<String>,
}

impl std::fmt::Display for ErrorObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let detail = self.message_dev.as_deref().unwrap_or(self.message_user);
        write!(f, "{} ({}): {}", self.code, self.http_status, detail)
    }
}

impl std::error::Error for ErrorObj {}

impl ErrorObj {
    pub fn to_public(&self) -> PublicErrorView {
        PublicErrorView {
            code: self.code,
            message: self.message_user.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicErrorView {
    pub code: &'static str,
    pub message: String,
}

pub struct ErrorBuilder {
    obj: ErrorObj,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            obj: ErrorObj {
                code: code.code,
                http_status: code.http_status,
                retry: code.retry,
                message_user: code.user_msg,
                message_dev: None,
            },
        }
    }

    pub fn dev_msg(mut self, detail: impl Into<String>) -> Self {
        self.obj.message_dev = Some(detail.into());
        self
    }

    pub fn build(self) -> ErrorObj {
        self.obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_view_hides_dev_detail() {
        let obj = ErrorBuilder::new(codes::STORAGE_UNAVAILABLE)
            .dev_msg("connection refused on shard 3")
            .build();
        let view = obj.to_public();
        assert_eq!(view.code, "STORAGE.UNAVAILABLE");
        assert!(!view.message.contains("shard"));
    }

    #[test]
    fn display_prefers_dev_detail() {
        let obj = ErrorBuilder::new(codes::CHAT_EMPTY_MESSAGE)
            .dev_msg("payload was whitespace")
            .build();
        assert!(obj.to_string().contains("payload was whitespace"));
        assert!(obj.to_string().contains("CHAT.EMPTY_MESSAGE"));
    }

    #[test]
    fn codes_carry_http_and_retry_mapping() {
        assert_eq!(codes::QUOTA_RATE_LIMITED.http_status, 429);
        assert_eq!(codes::QUOTA_RATE_LIMITED.retry, RetryClass::Transient);
        assert_eq!(codes::LLM_PROVIDER_UNAVAILABLE.http_status, 503);
        assert_eq!(codes::UNKNOWN_INTERNAL.retry, RetryClass::None);
    }
}
