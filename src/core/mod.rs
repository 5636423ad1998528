//! Workspace, configuration and entry files

pub mod checksum;
pub mod config;
pub mod entry;
pub mod frontmatter;
pub mod paths;
