use serde::{Deserialize, Serialize};
use std::fmt;

pub mod duration;
pub mod error;
pub mod filter;
pub mod record;

pub use duration::format_duration;
pub use error::CoreError;
pub use filter::{DateRange, FilterConfig, FileFormat, TimeUnit, WeightMetric};
pub use record::{CaseTrace, EdgeRecord, EngineOutput, Histogram, VariantRecord};

/// Id of the synthetic anchor that feeds every zero in-degree node.
pub const START_NODE_ID: &str = "START_NODE";
/// Id of the synthetic anchor fed by every zero out-degree node.
pub const END_NODE_ID: &str = "END_NODE";

/// Activity name; unique per graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn start() -> Self {
        Self(START_NODE_ID.to_string())
    }

    pub fn end() -> Self {
        Self(END_NODE_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_anchor(&self) -> bool {
        self.0 == START_NODE_ID || self.0 == END_NODE_ID
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Conventional `"{source}->{target}"` id.
    pub fn between(source: &NodeId, target: &NodeId) -> Self {
        Self(format!("{}->{}", source.0, target.0))
    }

    /// Index-suffixed id used when a source/target pair was already taken.
    pub fn indexed(source: &NodeId, target: &NodeId, index: usize) -> Self {
        Self(format!("{}->{}#{}", source.0, target.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Semantic type tag controlling how a node renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Start,
    End,
    #[default]
    Activity,
}

/// Hard layer pin honoured by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerConstraint {
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LayoutDirection {
    /// Layers advance along x (left to right).
    #[default]
    Horizontal,
    /// Layers advance along y (top to bottom).
    Vertical,
}
