use axum::{
    http::Uri,
    response::{Html, IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tower_http::services::ServeDir;

use crate::handlers::{auth, blogs, health, media, storage, upload};
use crate::models::errors::AppError;
use crate::{AppState, StorageState};

/// Browser-facing proxy routes.
pub fn relay_router(app_state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health::health_check))
        .route("/api/health", get(health::health_check))

        // Editor image upload relay
        .route("/api/upload/image", any(upload::relay_image))

        // Session and blog proxies
        .route("/api/auth/login", any(auth::login))
        .route("/api/blogs/:id", any(blogs::get_by_id))
        .route("/api/blogs/", any(blogs::missing_id))
        .route("/api/blogs/slug/:slug", any(blogs::get_by_slug))
        .route("/api/blogs/slug/", any(blogs::missing_slug))

        // Published images live on the backend origin
        .route("/uploads/*path", get(media::serve_upload))

        .fallback(fallback_handler)
        .with_state(app_state)
}

/// The storage endpoint the relay forwards editor images to.
pub fn storage_router(state: StorageState) -> Router {
    let uploads = ServeDir::new(state.images.uploads_dir());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/health", get(health::health_check))
        .route("/api/upload/editor-image", any(storage::store_editor_image))
        .nest_service("/uploads", uploads)
        .with_state(state)
}

/// JSON 404 for unknown API paths, the status page for everything else.
async fn fallback_handler(uri: Uri) -> Response {
    if uri.path() == "/api" || uri.path().starts_with("/api/") {
        return AppError::not_found("Not found").into_response();
    }
    Html(STATUS_PAGE).into_response()
}

const STATUS_PAGE: &str = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Blog CMS Gateway</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 800px;
            margin: 0 auto;
            padding: 2rem;
            background: #f9fafb;
        }
        .container {
            background: white;
            padding: 2rem;
            border-radius: 8px;
            border: 1px solid #d1d5db;
        }
        h1 {
            color: #ea580c;
            text-align: center;
        }
        .status {
            text-align: center;
            color: #4b5563;
            margin-top: 1rem;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Blog CMS Gateway</h1>
        <p class="status">The API relay is running.</p>
        <p class="status">Editor uploads go to <code>POST /api/upload/image</code>.</p>
    </div>
</body>
</html>
"#;
