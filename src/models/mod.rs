pub mod conversation;

pub use conversation::{Part, Turn, USER_ROLE};
