// HTTP request handlers module
// Browser-facing proxy routes plus the storage endpoint they forward to

pub mod auth;
pub mod blogs;
pub mod forward;
pub mod health;
pub mod media;
pub mod storage;
pub mod upload;
