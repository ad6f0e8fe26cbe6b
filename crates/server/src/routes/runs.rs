use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use stagegate_core::{RunStatus, Stage};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::run_manager::RunOptions;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartRunRequest {
    /// Spend ceiling for the run.
    pub investment: Option<f64>,
    /// Stage to resume from; defaults to the project's saved stage.
    pub start_stage: Option<Stage>,
    /// Stage the cursor must reach; defaults to Test.
    pub end_stage: Option<Stage>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartRunResponse {
    pub project: String,
    pub start: Stage,
    pub end: Stage,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunStatusResponse {
    pub project: Option<String>,
    #[serde(flatten)]
    pub status: RunStatus,
}

#[utoipa::path(
    post,
    path = "/api/projects/{name}/run",
    params(("name" = String, Path, description = "Project name")),
    request_body = StartRunRequest,
    responses(
        (status = 202, description = "Run launched", body = StartRunResponse),
        (status = 404, description = "Project not found"),
        (status = 409, description = "A run is already in progress"),
    ),
    tag = "runs"
)]
pub async fn start_run(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<StartRunResponse>), AppError> {
    let started = state
        .runs
        .start(
            &name,
            RunOptions {
                investment: payload.investment,
                start: payload.start_stage,
                end: payload.end_stage,
            },
        )
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartRunResponse {
            project: name,
            start: started.start,
            end: started.end,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/run/status",
    responses(
        (status = 200, description = "Status of the most recent run", body = RunStatusResponse),
    ),
    tag = "runs"
)]
pub async fn run_status(State(state): State<AppState>) -> Json<RunStatusResponse> {
    let (project, status) = state.runs.status();
    Json(RunStatusResponse { project, status })
}
