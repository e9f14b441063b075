//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the pull-progress REST API using
//! utoipa for compile-time spec generation. Served at `/openapi.json`.

use utoipa::OpenApi;

/// OpenAPI documentation for the pull-progress REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "pull-progress REST API",
        version = "0.1.0",
        description = "Start, observe, cancel and dismiss model pulls with reconciled progress",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790", description = "Local development server")
    ),
    paths(
        // Pulls
        crate::api::routes::list_pulls,
        crate::api::routes::get_pull,
        crate::api::routes::start_pull,
        crate::api::routes::cancel_pull,
        crate::api::routes::dismiss_pull,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(
        schemas(
            crate::types::ArtifactRef,
            crate::types::PullState,
            crate::types::PullRequest,
            crate::types::PartSnapshot,
            crate::types::SessionSnapshot,
            crate::error::ApiError,
            crate::error::ErrorDetail,
        )
    ),
    tags(
        (name = "pulls", description = "Pull lifecycle and progress"),
        (name = "system", description = "Health, events and API documentation")
    )
)]
pub struct ApiDoc;
