pub mod document_client;
pub mod rate_limited;

pub use document_client::DocumentClient;
pub use rate_limited::RateLimitedClient;
