pub mod config;

pub use config::{Config, DEFAULT_API_URL};
