pub mod common;
pub mod completions;
pub mod config;
pub mod kroger;
