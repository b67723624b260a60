//! provider
//!
//! Abstraction for remote provider control planes (DNS registrar, frontend
//! host, container platform, load balancer).
//!
//! # Architecture
//!
//! The `Provider` trait defines a uniform capability interface: a small
//! verb set every adapter implements for the capabilities it has. The
//! engine uses the [`ProviderSet`] built by the factory rather than
//! importing specific adapters, so new providers slot in without touching
//! the reconciliation engine.
//!
//! Provider calls are invoked only from the executor, after the manifest
//! has validated; provider failures never corrupt local state, they only
//! mark operations failed in the run report.
//!
//! # Modules
//!
//! - `traits`: Core `Provider` trait, error taxonomy, ref/state types
//! - [`dns`]: DNS registrar adapter
//! - [`pages`]: Static-site host adapter
//! - [`containers`]: Container platform adapter
//! - [`loadbalancer`]: Load balancer adapter
//! - [`mock`]: Deterministic in-memory implementation for tests
//! - `factory`: Provider selection and creation from environment credentials

pub mod containers;
pub mod dns;
mod factory;
mod http;
pub mod loadbalancer;
pub mod mock;
pub mod pages;
mod traits;

pub use factory::{FactoryError, ProviderSet};
pub use traits::*;
