use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::dto::{CreateMachineRequest, MachineResponse, StateResponse, UrlResponse};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn create_machine(
    State(state): State<AppState>,
    Json(req): Json<CreateMachineRequest>,
) -> Result<(StatusCode, Json<MachineResponse>), ApiError> {
    req.validate_name()?;
    let config = req.apply(&state.config.driver, &state.regions)?;

    let shared = state.register(&req.name, config).await?;
    let mut machine = shared.lock().await;

    let outcome = machine.create().await;

    // Once an environment exists the record is kept, even on failure.
    let created = machine.record().environment_id.is_some();
    if created {
        state.persist(&machine).await?;
    }
    let response = MachineResponse::provisioned(&machine);
    drop(machine);
    if !created {
        state.forget(&req.name).await;
    }

    outcome?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_machines(
    State(state): State<AppState>,
) -> Result<Json<Vec<MachineResponse>>, ApiError> {
    let records = state.store.list().await?;
    Ok(Json(records.iter().map(MachineResponse::from).collect()))
}

pub async fn get_machine(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MachineResponse>, ApiError> {
    let shared = state.machine(&name).await?;
    let machine = shared.lock().await;
    let current = machine.get_state().await?;
    Ok(Json(MachineResponse::from(machine.record()).with_state(current)))
}

pub async fn get_state(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StateResponse>, ApiError> {
    let shared = state.machine(&name).await?;
    let machine = shared.lock().await;
    let current = machine.get_state().await?;
    Ok(Json(StateResponse {
        name,
        state: current,
    }))
}

pub async fn get_url(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<UrlResponse>, ApiError> {
    let shared = state.machine(&name).await?;
    let mut machine = shared.lock().await;
    let url = machine.url().await?;
    state.persist(&machine).await?;
    Ok(Json(UrlResponse { url }))
}

pub async fn start_machine(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let shared = state.machine(&name).await?;
    shared.lock().await.start().await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn stop_machine(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let shared = state.machine(&name).await?;
    shared.lock().await.stop().await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn restart_machine(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let shared = state.machine(&name).await?;
    let mut machine = shared.lock().await;
    let outcome = machine.restart().await;
    state.persist(&machine).await?;
    outcome?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn kill_machine(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let shared = state.machine(&name).await?;
    shared.lock().await.kill().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_machine(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let shared = state.machine(&name).await?;
    let mut machine = shared.lock().await;
    machine.remove().await?;
    state.store.remove(&name).await?;
    drop(machine);
    state.forget(&name).await;
    Ok(StatusCode::NO_CONTENT)
}
