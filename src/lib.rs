//! This crate provides statcube, a service that turns multi-dimensional statistical datasets in
//! [JSON-stat 2.0](https://json-stat.org/format/) format into flat, row-oriented tables.
//!
//! A dataset (a cube) stores its values in a single flat array laid out in row-major order over
//! its dimensions, with the last dimension varying fastest. Statcube enumerates every combination
//! of categories, substitutes human-readable labels for category codes, and reads the value at the
//! matching flat offset. On top of this it provides:
//!
//! * sub-cube selection by category code
//! * single cell lookup
//! * chart series extraction along a chosen x axis
//! * searchable, sortable and paged table views, and CSV export
//! * construction of JSON-RPC requests for the PxStat statistical data API and its catalogue
//! * facets, filters and ordering of catalogue search results
//!
//! Statcube is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team, on top of the [hyper] HTTP library.
//! * [Serde](serde) performs (de)serialisation of JSON request and response data.
//! * [ndarray] provides n-dimensional arrays used to enumerate and select cells.
//! * [Rayon](rayon) optionally runs CPU-bound transformations off the async runtime.

pub mod app;
pub mod app_state;
pub mod catalogue;
pub mod cli;
pub mod cube;
pub mod error;
pub mod jsonstat;
pub mod metrics;
pub mod models;
pub mod resource_manager;
pub mod rpc;
pub mod series;
pub mod server;
pub mod table;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod validated_json;
