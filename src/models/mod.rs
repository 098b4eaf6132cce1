// Data models shared by handlers and services

pub mod errors;
pub mod upload;
