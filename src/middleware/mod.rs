mod error_handler;
mod rate_limit;

pub use error_handler::{handle_panic, log_errors};
pub use rate_limit::{ClientWindow, RateLimiter, rate_limit};
