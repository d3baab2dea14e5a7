pub mod body;
pub mod build_info;
pub mod commands;
pub mod config;
pub mod error;
pub mod frontmatter;
pub mod model;
pub mod output;
pub mod server;
pub mod store;
pub mod workspace;
