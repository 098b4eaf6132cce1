// Business logic services module
// This module contains the upload pipeline services shared by the handlers

pub mod backend_client;
pub mod editor;
pub mod image_store;
pub mod temp_store;
pub mod upload_policy;
