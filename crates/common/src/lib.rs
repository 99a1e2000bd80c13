pub mod api;
pub mod config;
pub mod error;
pub mod types;

pub use error::{NeoError, Result};
pub use types::SourceId;
