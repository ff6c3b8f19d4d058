pub mod health;
pub mod telemetry_ws;

use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(telemetry_ws::router())
        .with_state(state)
}
