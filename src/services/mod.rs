pub mod alert_dedup;
pub mod broadcast;
pub mod ingest;
pub mod readings;
pub mod registry;
pub mod thresholds;
