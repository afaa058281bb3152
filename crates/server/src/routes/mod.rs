use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod auth;
mod health;
mod users;
mod vm_requests;
mod vm_types;
mod vms;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/navigate", get(auth::navigate))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/me", patch(users::update_profile))
        .route("/users/:id", patch(users::update_user))
        // VM requests
        .route(
            "/requests",
            get(vm_requests::list_requests).post(vm_requests::create_request),
        )
        .route("/requests/:id/decision", post(vm_requests::decide_request))
        .route("/requests/:id/response", patch(vm_requests::update_response))
        // Virtual machines
        .route("/vms", get(vms::list_vms).post(vms::provision_vm))
        .route("/vms/:id", get(vms::get_vm).delete(vms::delete_vm))
        .route("/vms/:id/status", put(vms::report_status))
        .route("/vms/:id/actions/:action", post(vms::perform_action))
        // VM types
        .route(
            "/vm-types",
            get(vm_types::list_vm_types).post(vm_types::create_vm_type),
        )
        .route("/vm-types/:id", delete(vm_types::delete_vm_type))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
