//! Utility modules.

pub mod file_handler;

pub use file_handler::FileHandler;
