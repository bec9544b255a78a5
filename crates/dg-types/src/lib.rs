pub mod document;
pub mod enums;
pub mod error;

// Re-exports for convenience
pub use document::Document;
pub use enums::WindowUnit;
pub use error::{DocGateError, Result};
