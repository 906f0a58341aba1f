pub mod auth;
pub mod error;
mod images;
mod validation;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub use error::{ApiError, ErrorCode, ErrorResponse};

/// Headroom for the multipart framing and text fields around the file
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Client pages reachable without the `.html` suffix
const CLIENT_PAGES: &[&str] = &["signup", "login", "profile", "public"];

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.storage.max_file_size() + MULTIPART_OVERHEAD;

    // Auth routes (public)
    let public_auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Auth routes (protected)
    let protected_auth_routes = Router::new()
        .route("/verify", get(auth::verify))
        .route(
            "/profile",
            get(auth::get_profile).patch(auth::update_profile),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // Image routes (protected)
    let protected_image_routes = Router::new()
        .route(
            "/upload",
            post(images::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/my-images", get(images::my_images))
        .route(
            "/:id",
            get(images::get_image)
                .patch(images::update_image)
                .delete(images::delete_image),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // Public gallery is merged after the protected router so the auth layer
    // does not apply to it
    let image_routes = Router::new()
        .route("/public", get(images::public_images))
        .merge(protected_image_routes);

    let auth_routes = public_auth_routes.merge(protected_auth_routes);

    // Stored files are served read-only under the upload URL prefix
    let uploads = ServeDir::new(state.storage.dir());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/images", image_routes)
        .nest_service(state.storage.url_prefix(), uploads)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Static client: named pages, then any file in `client_dir`, then `index.html`
pub fn client_router(client_dir: &Path) -> Router {
    let index_file = client_dir.join("index.html");

    let mut router = Router::new();
    for page in CLIENT_PAGES {
        let file = ServeFile::new(client_dir.join(format!("{}.html", page)));
        router = router.route_service(&format!("/{}", page), file);
    }

    router.fallback_service(ServeDir::new(client_dir).not_found_service(ServeFile::new(index_file)))
}

async fn health_check() -> &'static str {
    "OK"
}
