//! Context manager contract.
//!
//! Capability agents publish their state to a central context manager, which
//! folds it into outbound requests. The manager is treated as a sink here; no
//! aggregation happens in this crate.

use std::sync::Arc;

use async_trait::async_trait;

use crate::directive::NamespaceAndName;
use crate::Result;

/// Whether the context manager should refresh this state before building a
/// context snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRefreshPolicy {
    Always,
    Never,
}

/// Why a `get_context` request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRequestError {
    StateProviderTimedOut,
    BuildContextError,
}

/// Sink for agent state and source of full context snapshots.
#[async_trait]
pub trait ContextManager: Send + Sync {
    /// Publish `json_state` under `namespace`. `state_request_token` is set
    /// when the publication answers a `provide_state` request and absent for
    /// proactive updates.
    async fn set_state(
        &self,
        namespace: NamespaceAndName,
        json_state: String,
        refresh_policy: StateRefreshPolicy,
        state_request_token: Option<u32>,
    ) -> Result<()>;

    /// Request a full context snapshot, delivered through `requester`.
    fn get_context(&self, requester: Arc<dyn ContextRequester>);
}

/// Receives replies to a prior `get_context` call.
pub trait ContextRequester: Send + Sync {
    fn on_context_available(&self, json_context: String);

    fn on_context_failure(&self, error: ContextRequestError);
}

/// Implemented by agents whose state the context manager can demand.
pub trait StateProvider: Send + Sync {
    /// Publish the current state via `ContextManager::set_state`, passing
    /// `state_request_token` through.
    fn provide_state(&self, state_request_token: u32);
}
