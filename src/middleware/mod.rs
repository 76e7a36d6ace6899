mod error_handler;
mod rate_limit;

pub use error_handler::log_errors;
pub use rate_limit::{
    RequestGate, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET, X_SERVER_ID, rate_limit,
};
