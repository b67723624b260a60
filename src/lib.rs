//! # berth
//!
//! A declarative deployment orchestrator. A TOML manifest describes the
//! desired end state of a project's services, DNS records, domain
//! bindings, and managed certificates; berth observes what the providers
//! currently have and applies the minimal, dependency-ordered set of
//! idempotent operations to converge.
//!
//! ## Architecture
//!
//! The crate is layered; each layer depends only on the ones below it:
//!
//! - [`cli`] - argument parsing and command dispatch
//! - [`engine`] - the run lifecycle: observe, plan, execute
//! - [`report`] - progress events, run results, and their persistence
//! - [`provider`] - the provider trait, HTTP adapters, and the mock
//! - [`core`] - manifest schema, validated types, the operation graph
//! - [`ui`] - terminal output
//!
//! ## Design principles
//!
//! - **Declarative**: the manifest states the end, never the steps
//! - **Deterministic**: the same diff always yields the same plan
//! - **Idempotent**: re-applying a converged manifest does nothing
//! - **Partial-failure honest**: a failed operation is reported as
//!   failed, halts its dependents, and never masks as success

pub mod cli;
pub mod core;
pub mod engine;
pub mod provider;
pub mod report;
pub mod ui;
