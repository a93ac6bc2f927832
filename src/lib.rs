//! Single-target website availability monitor with a live dashboard feed.

pub mod alerting;
pub mod db;
pub mod server;
pub mod web;
