use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use stagegate_core::Stage;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveRequest {
    pub stage: Stage,
    pub approved: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApproveResponse {
    pub stage: Stage,
    pub approved: bool,
}

#[utoipa::path(
    post,
    path = "/api/run/approve",
    request_body = ApproveRequest,
    responses(
        (status = 200, description = "Verdict delivered to the waiting gate", body = ApproveResponse),
        (status = 409, description = "No matching approval is pending"),
    ),
    tag = "runs"
)]
pub async fn approve_stage(
    State(state): State<AppState>,
    Json(payload): Json<ApproveRequest>,
) -> Result<Json<ApproveResponse>, AppError> {
    state.runs.approve(payload.stage, payload.approved)?;
    Ok(Json(ApproveResponse {
        stage: payload.stage,
        approved: payload.approved,
    }))
}
