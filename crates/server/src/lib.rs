//! Project-scoped issue tracker served over HTTP.
//!
//! `GET|POST|PUT|DELETE /api/issues/:project` list, create, update and
//! delete issues held in MongoDB or SQLite.
pub mod app_state;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod store;
