//! Capability contracts a provisioned resource must satisfy

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque identifier assigned by the remote API on creation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Anything carrying a stable remote identifier
pub trait Identifiable {
    fn resource_id(&self) -> ResourceId;
}

/// Coarse lifecycle classification of a remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Still copying or building
    Pending,
    /// Terminal success
    Ready,
    /// Terminal failure
    Failed,
}

impl Availability {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Availability::Pending)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Availability::Failed)
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Pending => write!(f, "pending"),
            Availability::Ready => write!(f, "ready"),
            Availability::Failed => write!(f, "failed"),
        }
    }
}

/// A resource the orchestrator can drive.
///
/// The status vocabulary ("available", "migrating", "up", ...) belongs to
/// the resource type, so the mapping into [`Availability`] lives here and
/// not in the orchestrator.
pub trait Resource: Identifiable + Clone + Send + Sync + 'static {
    /// Classification of the background copy/build.
    ///
    /// `None` marks a resource that is created synchronously and has no
    /// availability semantics.
    fn availability(&self) -> Option<Availability> {
        None
    }

    /// Classification of the operational ("up") state.
    fn instance_state(&self) -> Availability {
        Availability::Ready
    }
}

/// Result of probing a resource's capabilities once per attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Availability(Availability),
    Plain,
}

impl Capability {
    pub fn of<R: Resource>(resource: &R) -> Self {
        match resource.availability() {
            Some(availability) => Capability::Availability(availability),
            None => Capability::Plain,
        }
    }
}

/// Maps a resource snapshot to its terminal classification
pub type Classifier<R> = Arc<dyn Fn(&R) -> Availability + Send + Sync>;

/// Classifier for the copy phase. Plain resources count as ready.
pub fn copy_classifier<R: Resource>() -> Classifier<R> {
    Arc::new(|r: &R| r.availability().unwrap_or(Availability::Ready))
}

/// Classifier for the wait-for-up phase
pub fn up_classifier<R: Resource>() -> Classifier<R> {
    Arc::new(|r: &R| r.instance_state())
}
