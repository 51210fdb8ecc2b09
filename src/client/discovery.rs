use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{RpcClient, RpcOutcome, TransportError, MESSAGE_PATH};
use crate::agent::oracle::FunctionTool;
use crate::protocol::{JsonRpcError, ToolDescriptor, ToolsListResult};

/// Where a discovered tool is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationTarget {
    pub endpoint: String,
    pub method: String,
}

impl InvocationTarget {
    fn for_descriptor(descriptor: &ToolDescriptor) -> Self {
        match &descriptor.invocation_hints {
            Some(hints) => Self {
                endpoint: hints.endpoint.clone(),
                method: hints.method.clone(),
            },
            None => Self {
                endpoint: MESSAGE_PATH.into(),
                method: "POST".into(),
            },
        }
    }
}

/// Snapshot of one successful discovery: the oracle-facing function list and
/// the name → target map, always replaced together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    pub functions: Vec<FunctionTool>,
    pub endpoints: HashMap<String, InvocationTarget>,
}

impl ToolCatalog {
    pub fn from_descriptors(descriptors: &[ToolDescriptor]) -> Result<Self, DiscoveryError> {
        let mut seen = HashSet::new();
        for descriptor in descriptors {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(DiscoveryError::DuplicateTool(descriptor.name.clone()));
            }
        }

        Ok(Self {
            functions: descriptors.iter().map(FunctionTool::from_descriptor).collect(),
            endpoints: descriptors
                .iter()
                .map(|d| (d.name.clone(), InvocationTarget::for_descriptor(d)))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiscoveryError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("server error {}: {}", .0.code, .0.message)]
    Protocol(JsonRpcError),
    #[error("malformed tool catalog: {0}")]
    Malformed(String),
    #[error("duplicate tool name in catalog: {0}")]
    DuplicateTool(String),
}

/// Agent-side cache of the gateway's tool catalog.
pub struct ToolDiscovery {
    client: Arc<RpcClient>,
    catalog: RwLock<Arc<ToolCatalog>>,
}

impl ToolDiscovery {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self {
            client,
            catalog: RwLock::new(Arc::new(ToolCatalog::default())),
        }
    }

    /// Fetch `tools/list` and swap in the new catalog.
    ///
    /// On any failure the previous catalog stays in place and `false` is
    /// returned; the agent keeps running with whatever it had (possibly no
    /// tools at all).
    pub async fn discover(&self) -> bool {
        match self.fetch().await {
            Ok(catalog) => {
                let count = catalog.len();
                *self.catalog.write() = Arc::new(catalog);
                tracing::info!(tools = count, "loaded tools from gateway");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "tool discovery failed; keeping previous catalog");
                false
            }
        }
    }

    /// Current catalog. The returned snapshot never changes underneath the
    /// caller, even if a discovery completes meanwhile.
    pub fn catalog(&self) -> Arc<ToolCatalog> {
        self.catalog.read().clone()
    }

    async fn fetch(&self) -> Result<ToolCatalog, DiscoveryError> {
        let result = match self.client.call("tools/list", None).await {
            RpcOutcome::Success(result) => result,
            RpcOutcome::Protocol(err) => return Err(DiscoveryError::Protocol(err)),
            RpcOutcome::Transport(err) => return Err(DiscoveryError::Transport(err)),
        };

        let list: ToolsListResult =
            serde_json::from_value(result).map_err(|e| DiscoveryError::Malformed(e.to_string()))?;
        ToolCatalog::from_descriptors(&list.tools)
    }
}
