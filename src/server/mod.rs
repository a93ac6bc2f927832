pub mod change_feed;
pub mod config;
pub mod feed_hub;
pub mod monitor_loop;
pub mod prober;
