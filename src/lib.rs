//! Proximity-filtered alert delivery for CORSAIR.
//!
//! Document-store change events are reduced into alert deliveries, analyst
//! report feeds and role-targeted notifications.

pub mod config;
pub mod db;
pub mod geo;
pub mod kafka;
pub mod models;
pub mod processor;
pub mod time_window;
