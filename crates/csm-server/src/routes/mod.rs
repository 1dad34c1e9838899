pub mod machines;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::auth::auth_middleware;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/machines",
            post(machines::create_machine).get(machines::list_machines),
        )
        .route(
            "/machines/{name}",
            get(machines::get_machine).delete(machines::remove_machine),
        )
        .route("/machines/{name}/state", get(machines::get_state))
        .route("/machines/{name}/url", get(machines::get_url))
        .route("/machines/{name}/start", post(machines::start_machine))
        .route("/machines/{name}/stop", post(machines::stop_machine))
        .route("/machines/{name}/restart", post(machines::restart_machine))
        .route("/machines/{name}/kill", post(machines::kill_machine))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}
