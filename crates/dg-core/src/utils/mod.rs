pub mod cancel;
pub mod rate_limiter;

pub use cancel::CancelSignal;
pub use rate_limiter::{ExecuteError, RateLimiter};
