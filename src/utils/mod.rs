// Configuration and small shared helpers

pub mod config;
pub mod content;
