use crate::config::CoreConfig;
use crate::db;
use crate::services::alert_dedup::AlertDedup;
use crate::services::broadcast::Broadcaster;
use crate::state::AppState;
use std::sync::Arc;

pub fn test_config() -> CoreConfig {
    CoreConfig {
        database_url: "postgresql://postgres@localhost/postgres".to_string(),
        cors_origin: None,
        dedup_window_seconds: 300,
        dedup_sweep_interval_seconds: 60,
        broadcast_capacity: 16,
    }
}

pub fn test_state() -> AppState {
    let config = test_config();
    let pool = db::connect_lazy(&config.database_url).expect("connect_lazy");
    AppState {
        broadcaster: Broadcaster::new(config.broadcast_capacity),
        alert_dedup: Arc::new(AlertDedup::new(chrono::Duration::seconds(
            config.dedup_window_seconds,
        ))),
        config,
        db: pool,
    }
}
