pub mod error;
pub mod routes;
pub mod run_manager;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stagegate API",
        version = "0.1.0",
        description = "Control surface for the stage-gated multi-agent pipeline"
    ),
    paths(
        routes::health::health_check,
        routes::projects::list_projects,
        routes::projects::create_project,
        routes::projects::get_project,
        routes::projects::update_project,
        routes::runs::start_run,
        routes::runs::run_status,
        routes::approvals::approve_stage,
        routes::deliverables::get_deliverable,
        routes::deliverables::update_deliverable,
        routes::sse::events_stream,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::projects::ProjectResponse,
        routes::projects::CreateProjectRequest,
        routes::projects::UpdateProjectRequest,
        routes::runs::StartRunRequest,
        routes::runs::StartRunResponse,
        routes::runs::RunStatusResponse,
        routes::approvals::ApproveRequest,
        routes::approvals::ApproveResponse,
        routes::deliverables::DeliverableResponse,
        routes::deliverables::UpdateDeliverableRequest,
        stagegate_core::Stage,
        stagegate_core::RunStatus,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "projects", description = "Project management endpoints"),
        (name = "runs", description = "Pipeline run control endpoints"),
        (name = "deliverables", description = "Stage deliverable endpoints"),
        (name = "events", description = "Real-time event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route(
            "/api/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/api/projects/{name}",
            get(routes::projects::get_project).patch(routes::projects::update_project),
        )
        .route("/api/projects/{name}/run", post(routes::runs::start_run))
        .route(
            "/api/projects/{name}/deliverables/{stage}",
            get(routes::deliverables::get_deliverable)
                .put(routes::deliverables::update_deliverable),
        )
        .route("/api/run/status", get(routes::runs::run_status))
        .route("/api/run/approve", post(routes::approvals::approve_stage))
        .route("/api/events", get(routes::sse::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
