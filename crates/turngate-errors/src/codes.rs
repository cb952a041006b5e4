use crate::{ErrorCode, RetryClass};

const GENERIC_INTERNAL: &str = "Something went wrong. Please try again later.";

pub const CHAT_EMPTY_MESSAGE: ErrorCode = ErrorCode {
    code: "CHAT.EMPTY_MESSAGE",
    http_status: 400,
    retry: RetryClass::None,
    user_msg: "Message cannot be empty.",
};

pub const QUOTA_RATE_LIMITED: ErrorCode = ErrorCode {
    code: "QUOTA.RATE_LIMITED",
    http_status: 429,
    retry: RetryClass::Transient,
    user_msg: "Too many messages. Please wait a moment and try again.",
};

pub const AUTH_UNAUTHENTICATED: ErrorCode = ErrorCode {
    code: "AUTH.UNAUTHENTICATED",
    http_status: 401,
    retry: RetryClass::None,
    user_msg: "Authentication required.",
};

pub const LLM_PROVIDER_UNAVAILABLE: ErrorCode = ErrorCode {
    code: "LLM.PROVIDER_UNAVAILABLE",
    http_status: 503,
    retry: RetryClass::Transient,
    user_msg: "The assistant is temporarily unavailable.",
};

pub const SCHEMA_VALIDATION: ErrorCode = ErrorCode {
    code: "SCHEMA.VALIDATION",
    http_status: 400,
    retry: RetryClass::None,
    user_msg: "Request was rejected by validation.",
};

pub const STORAGE_NOT_FOUND: ErrorCode = ErrorCode {
    code: "STORAGE.NOT_FOUND",
    http_status: 404,
    retry: RetryClass::None,
    user_msg: "Record not found.",
};

pub const STORAGE_UNAVAILABLE: ErrorCode = ErrorCode {
    code: "STORAGE.UNAVAILABLE",
    http_status: 500,
    retry: RetryClass::Transient,
    user_msg: GENERIC_INTERNAL,
};

pub const UNKNOWN_INTERNAL: ErrorCode = ErrorCode {
    code: "UNKNOWN.INTERNAL",
    http_status: 500,
    retry: RetryClass::None,
    user_msg: GENERIC_INTERNAL,
};
