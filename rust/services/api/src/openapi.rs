//! OpenAPI documentation configuration for the workflow orchestration
//! service's HTTP surface (spec.md §6).

use utoipa::OpenApi;

use crate::handlers::{admin, cwl, health, workflows};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Workflow Orchestration API",
        version = "0.1.0",
        description = "Plans, registers, validates, submits, and tracks bioinformatics analysis workflows against an external JSON-RPC scheduler.",
        license(name = "Apache-2.0", url = "https://www.apache.org/licenses/LICENSE-2.0")
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "workflows", description = "Workflow lifecycle endpoints"),
        (name = "admin", description = "Operator maintenance endpoints")
    ),
    paths(
        health::health_check,
        workflows::plan,
        workflows::register,
        workflows::validate,
        workflows::submit,
        workflows::submit_planned,
        workflows::cancel,
        workflows::status,
        workflows::get,
        cwl::import_cwl,
        admin::cleanup,
    ),
    components(
        schemas(
            health::HealthResponse,
            workflows::RegisterResponse,
            workflows::ValidateResponse,
            workflows::SubmitResponse,
            workflows::StatusResponse,
            workflows::StepStatusResponse,
            admin::CleanupQuery,
            admin::CleanupResponse,
        )
    )
)]
pub struct ApiDoc;
