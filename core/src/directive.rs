//! Directive model shared between the directive sequencer and capability
//! agents.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Namespace/name pair identifying a directive kind or a context state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceAndName {
    pub namespace: String,
    pub name: String,
}

impl NamespaceAndName {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for NamespaceAndName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Header of a server-issued directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveHeader {
    pub namespace: String,
    pub name: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog_request_id: Option<String>,
}

/// A server-issued command: a header plus an unparsed JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directive {
    pub header: DirectiveHeader,
    pub payload: String,
}

impl Directive {
    pub fn namespace_and_name(&self) -> NamespaceAndName {
        NamespaceAndName::new(&self.header.namespace, &self.header.name)
    }

    /// Reassembled wire form, used when reporting the directive in an
    /// exception message.
    pub fn unparsed(&self) -> String {
        json!({
            "header": {
                "namespace": self.header.namespace,
                "name": self.header.name,
                "messageId": self.header.message_id,
            },
            "payload": self.payload,
        })
        .to_string()
    }
}

/// How a directive blocks the processing of subsequent directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingPolicy {
    /// Subsequent directives may be handled immediately.
    NonBlocking,
    /// Subsequent directives on the audio medium wait until this one
    /// completes.
    BlockingMedium,
}

/// Static mapping from the directive kinds an agent handles to their blocking
/// policies.
pub type DirectiveHandlerConfiguration = HashMap<NamespaceAndName, BlockingPolicy>;

/// One-shot outcome sink handed to the handler by the directive sequencer.
/// Exactly one of the three methods is invoked per directive.
pub trait DirectiveHandlerResult: Send + Sync {
    fn set_completed(&self);

    fn set_failed(&self, description: &str);

    fn set_canceled(&self);
}

/// A directive paired with its result sink. The sink is absent on the
/// handle-immediately fast path.
#[derive(Clone)]
pub struct DirectiveInfo {
    pub directive: Arc<Directive>,
    pub result: Option<Arc<dyn DirectiveHandlerResult>>,
}
