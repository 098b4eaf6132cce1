// Library exports for testing and external use

pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

/// Application state shared across the relay handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<utils::config::AppConfig>,
    pub backend: Arc<services::backend_client::BackendClient>,
    pub temp_store: Arc<services::temp_store::TempUploadStore>,
}

/// State for the storage role
#[derive(Clone)]
pub struct StorageState {
    pub config: Arc<utils::config::AppConfig>,
    pub images: Arc<services::image_store::ImageStore>,
}
