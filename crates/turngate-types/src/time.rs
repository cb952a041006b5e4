use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64); // ms since epoch, UTC

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Timestamp {
    pub fn now() -> Self {
        Self(now_ms())
    }
}
