use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use stagegate_core::Stage;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectResponse {
    pub name: String,
    pub idea: String,
    pub stage: Stage,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub name: String,
    pub idea: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProjectRequest {
    pub idea: String,
}

#[utoipa::path(
    get,
    path = "/api/projects",
    responses(
        (status = 200, description = "All projects with a readable configuration", body = [ProjectResponse]),
    ),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectResponse>>, AppError> {
    let projects = state
        .store
        .list()
        .await?
        .into_iter()
        .map(|p| ProjectResponse {
            name: p.name,
            idea: p.idea,
            stage: p.stage,
        })
        .collect();
    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 409, description = "Project already exists"),
    ),
    tag = "projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), AppError> {
    if payload.name.is_empty() || payload.name.contains(['/', '\\', '.']) {
        return Err(AppError::BadRequest(format!(
            "invalid project name: {:?}",
            payload.name
        )));
    }
    let config = state.store.create(&payload.name, &payload.idea).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse {
            name: payload.name,
            idea: config.idea,
            stage: config.stage,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/projects/{name}",
    params(("name" = String, Path, description = "Project name")),
    responses(
        (status = 200, description = "Project configuration", body = ProjectResponse),
        (status = 404, description = "Project not found"),
    ),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ProjectResponse>, AppError> {
    let config = state.store.load(&name).await?;
    Ok(Json(ProjectResponse {
        name,
        idea: config.idea,
        stage: config.stage,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/projects/{name}",
    params(("name" = String, Path, description = "Project name")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Updated project configuration", body = ProjectResponse),
        (status = 404, description = "Project not found"),
    ),
    tag = "projects"
)]
pub async fn update_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>, AppError> {
    let config = state.store.update_idea(&name, &payload.idea).await?;
    Ok(Json(ProjectResponse {
        name,
        idea: config.idea,
        stage: config.stage,
    }))
}
