//! engine::observe
//!
//! Once-per-run observed-state fetch.
//!
//! # Design
//!
//! The cache is the run's only view of remote state: it is filled before
//! planning and never refreshed, so the planner and executor agree on
//! what the world looked like. Concurrent readers are safe because the
//! cache is immutable after [`StateCache::fetch`] returns.
//!
//! An observe failure is fatal for the run: without a trustworthy view of
//! one provider there is no safe diff against it.

use std::collections::HashMap;

use thiserror::Error;

use crate::provider::{ObservedState, ProviderError, ProviderKind, ProviderSet};

/// Errors from state observation.
#[derive(Debug, Error)]
pub enum ObserveError {
    /// A provider's observe call failed.
    #[error("failed to observe {kind} provider: {source}")]
    Provider {
        kind: ProviderKind,
        #[source]
        source: ProviderError,
    },
}

static EMPTY: ObservedState = ObservedState {
    endpoint: None,
    records: Vec::new(),
    services: Vec::new(),
    bindings: Vec::new(),
    certificates: Vec::new(),
};

/// Per-provider observed state, read-only after construction.
#[derive(Debug, Default)]
pub struct StateCache {
    states: HashMap<ProviderKind, ObservedState>,
}

impl StateCache {
    /// Fetch state from every provider in the set.
    pub async fn fetch(providers: &ProviderSet) -> Result<Self, ObserveError> {
        let mut states = HashMap::new();
        for kind in providers.kinds() {
            let provider = providers.get(kind).expect("kind listed by the set");
            let state = provider
                .observe()
                .await
                .map_err(|source| ObserveError::Provider { kind, source })?;
            states.insert(kind, state);
        }
        Ok(Self { states })
    }

    /// Build a cache from explicit states (tests and planner unit tests).
    pub fn from_states(states: impl IntoIterator<Item = (ProviderKind, ObservedState)>) -> Self {
        Self {
            states: states.into_iter().collect(),
        }
    }

    /// The observed state for a kind; empty if the kind was not observed.
    pub fn state(&self, kind: ProviderKind) -> &ObservedState {
        self.states.get(&kind).unwrap_or(&EMPTY)
    }

    /// Whether the cache holds state for a kind.
    pub fn has(&self, kind: ProviderKind) -> bool {
        self.states.contains_key(&kind)
    }
}
