pub mod feed_models;
pub mod monitor_models;
