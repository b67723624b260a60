//! core
//!
//! Domain types, manifest schema, and the operation dependency graph.
//!
//! # Modules
//!
//! - [`types`]: Strong types (service names, hostnames, fingerprints, ids)
//! - [`manifest`]: Manifest loading and validation
//! - [`graph`]: Operation dependency DAG

pub mod graph;
pub mod manifest;
pub mod types;
