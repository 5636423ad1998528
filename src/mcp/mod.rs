//! MCP Server for recall
//!
//! Exposes hybrid search, similarity and entry lookup to AI assistants.

mod server;

pub use server::run_mcp_server;
