mod handler;
pub mod model;

pub use handler::{chat, method_not_allowed, preflight};
