pub mod config;
pub mod error;

pub use config::{Config, ContextMode};
pub use error::*;
