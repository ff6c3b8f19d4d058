use crate::config::CoreConfig;
use crate::services::alert_dedup::AlertDedup;
use crate::services::broadcast::Broadcaster;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: CoreConfig,
    pub db: PgPool,
    pub broadcaster: Broadcaster,
    pub alert_dedup: Arc<AlertDedup>,
}
