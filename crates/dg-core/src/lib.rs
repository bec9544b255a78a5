pub mod logging;
pub mod utils;

pub use logging::{init_logging, init_logging_from_config};
pub use utils::{CancelSignal, ExecuteError, RateLimiter};
