//! Capability agent contract.

use std::sync::Arc;

use crate::directive::{Directive, DirectiveHandlerConfiguration, DirectiveInfo};

/// A capability agent handles one namespace of directives, publishes context,
/// and emits events.
///
/// All methods are invoked by the directive sequencer from arbitrary threads;
/// implementations post the real work onto their own executor and return
/// immediately.
pub trait CapabilityAgent: Send + Sync {
    /// Static mapping of the directives this agent handles to their blocking
    /// policies.
    fn get_configuration(&self) -> DirectiveHandlerConfiguration;

    /// Fast path used when no pre-handling is required; there is no result
    /// sink to report to.
    fn handle_directive_immediately(&self, directive: Arc<Directive>);

    /// Validate the directive and stage its resources ahead of its turn.
    fn pre_handle_directive(&self, info: DirectiveInfo);

    /// Begin handling a previously pre-handled directive.
    fn handle_directive(&self, info: DirectiveInfo);

    /// Abandon a pre-handled or in-flight directive.
    fn cancel_directive(&self, info: DirectiveInfo);

    /// The directive sequencer no longer routes to this agent; flush all
    /// in-flight state and release held resources.
    fn on_deregistered(&self);
}
