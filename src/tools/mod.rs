//! Tools agents can call.
//!
//! - [`base_tool`] - The `BaseTool` trait and the closure-backed `Tool`
//! - [`web_scraping`] - HTML fetching and extraction tools

pub mod base_tool;
pub mod web_scraping;

// Re-exports for convenience
pub use base_tool::{empty_parameters, parse_args, BaseTool, Tool, ToolError, ToolFn};
pub use web_scraping::WebScrapingTools;
