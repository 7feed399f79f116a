//! # CRM Core Library
//!
//! Contacts, deals and quotes for a small sales team: the entity services,
//! the pipeline state machine, and the aggregation engine that keeps quote
//! totals, deal values and contact lifetime values consistent.

pub mod aggregation;
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod money;
pub mod pipeline;
pub mod repositories;
pub mod server;
pub mod shipping;
pub mod telemetry;
pub use migration;
