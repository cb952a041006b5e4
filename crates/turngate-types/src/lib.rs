pub mod id;
pub mod time;

pub mod prelude {
    pub use crate::id::{Id, UserId};
    pub use crate::time::{now_ms, Timestamp};
}
