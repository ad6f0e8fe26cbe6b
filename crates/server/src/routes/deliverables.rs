use axum::extract::{Path, State};
use axum::Json;
use orchestrator::DeliverableStore;
use serde::{Deserialize, Serialize};
use stagegate_core::Stage;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliverableResponse {
    pub project: String,
    pub stage: Stage,
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDeliverableRequest {
    pub content: String,
}

async fn store_for(state: &AppState, name: &str) -> Result<DeliverableStore, AppError> {
    // Loading the config doubles as an existence check.
    state.store.load(name).await?;
    Ok(DeliverableStore::new(state.store.project_dir(name)))
}

#[utoipa::path(
    get,
    path = "/api/projects/{name}/deliverables/{stage}",
    params(
        ("name" = String, Path, description = "Project name"),
        ("stage" = Stage, Path, description = "Document stage"),
    ),
    responses(
        (status = 200, description = "Deliverable content", body = DeliverableResponse),
        (status = 400, description = "Stage has no deliverable"),
        (status = 404, description = "Project or deliverable not found"),
    ),
    tag = "deliverables"
)]
pub async fn get_deliverable(
    State(state): State<AppState>,
    Path((name, stage)): Path<(String, Stage)>,
) -> Result<Json<DeliverableResponse>, AppError> {
    let store = store_for(&state, &name).await?;
    let content = store.read(stage).await?;
    Ok(Json(DeliverableResponse {
        project: name,
        stage,
        content,
    }))
}

#[utoipa::path(
    put,
    path = "/api/projects/{name}/deliverables/{stage}",
    params(
        ("name" = String, Path, description = "Project name"),
        ("stage" = Stage, Path, description = "Document stage"),
    ),
    request_body = UpdateDeliverableRequest,
    responses(
        (status = 200, description = "Deliverable replaced", body = DeliverableResponse),
        (status = 400, description = "Stage has no deliverable"),
        (status = 404, description = "Project not found"),
    ),
    tag = "deliverables"
)]
pub async fn update_deliverable(
    State(state): State<AppState>,
    Path((name, stage)): Path<(String, Stage)>,
    Json(payload): Json<UpdateDeliverableRequest>,
) -> Result<Json<DeliverableResponse>, AppError> {
    let store = store_for(&state, &name).await?;
    store.write(stage, &payload.content).await?;
    Ok(Json(DeliverableResponse {
        project: name,
        stage,
        content: payload.content,
    }))
}
