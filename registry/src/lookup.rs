use crate::catalog::{SelectionMode, select};
use crate::instance::ServiceInstance;
use std::sync::Arc;

/// Fault raised by a [`LocalRegistry`] handle while it is consulted.
pub type HandleError = Box<dyn std::error::Error + Send + Sync>;

/// Handle onto an already-maintained local registry cache.
///
/// Implementations keep their own subscription to the registry; consulting
/// them never performs a network round trip. Must be safe for concurrent
/// reads.
pub trait LocalRegistry: Send + Sync {
    /// All instances currently registered under `service_id`, in
    /// registration order, or `None` when the application is unknown.
    fn instances(&self, service_id: &str) -> Result<Option<Vec<ServiceInstance>>, HandleError>;
}

#[derive(thiserror::Error, Debug)]
pub enum LookupError {
    #[error("service '{0}' is not registered to the discovery service")]
    NotRegistered(String),

    #[error("'{0}' has no primary instance registered to the discovery service")]
    NoPrimaryInstance(String),

    #[error("registry handle failure: {0}")]
    Handle(#[source] HandleError),
}

impl LookupError {
    /// Whether retrying on the next poll is pointless. Not-yet-registered
    /// conditions are routine; handle faults are not.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LookupError::Handle(_))
    }
}

/// Finds instances through a [`LocalRegistry`] handle, classifying routine
/// not-found conditions apart from unexpected handle faults.
pub struct LookupExecutor {
    registry: Arc<dyn LocalRegistry>,
}

impl LookupExecutor {
    pub fn new(registry: Arc<dyn LocalRegistry>) -> Self {
        LookupExecutor { registry }
    }

    /// Find the primary instance registered under `service_id`.
    pub fn run(&self, service_id: &str) -> Result<ServiceInstance, LookupError> {
        tracing::debug!(service_id, "starting instance lookup");

        let instances = self
            .registry
            .instances(service_id)
            .map_err(LookupError::Handle)?
            .ok_or_else(|| LookupError::NotRegistered(service_id.to_string()))?;

        select(&instances, SelectionMode::Primary)
            .cloned()
            .ok_or_else(|| LookupError::NoPrimaryInstance(service_id.to_string()))
    }
}
