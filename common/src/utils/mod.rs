//! Utility functions and helpers.

pub mod dsn;
pub mod sql_text;

// Re-export commonly used types
pub use dsn::TargetDsn;
pub use sql_text::SqlText;
