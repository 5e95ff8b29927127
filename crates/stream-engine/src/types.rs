//! Core types for pipeline graphs
//!
//! Handles for nodes and datasets, plus the serializable snapshot
//! returned by [`Pipeline::summary`](crate::Pipeline::summary).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pixel::PixelType;
use crate::region::Region;

/// Handle to a node in a [`Pipeline`](crate::Pipeline)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

/// Handle to a dataset in a [`Pipeline`](crate::Pipeline)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the pipeline arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl DataId {
    /// Position of the dataset in the pipeline arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data#{}", self.0)
    }
}

/// A node together with the dataset it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub node: NodeId,
    pub output: DataId,
}

/// How a node takes part in the update protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Computes its whole requested output in one step
    Filter,
    /// Splits its requested output into sequential passes
    Streaming,
}

/// Snapshot of one node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub id: NodeId,
    pub name: String,
    pub type_name: String,
    pub role: NodeRole,
    pub inputs: Vec<DataId>,
    pub output: DataId,
    /// Current pass of a streaming node (-1 when idle), `None` for plain filters
    pub current_request_number: Option<i64>,
}

/// Snapshot of one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub id: DataId,
    pub source: Option<NodeId>,
    pub pixel_type: PixelType,
    pub largest_possible_region: Region,
    pub buffered_region: Region,
    pub requested_region: Option<Region>,
    pub generation: u64,
    pub release_data: bool,
}

/// Snapshot of a whole pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub nodes: Vec<NodeSummary>,
    pub datasets: Vec<DatasetSummary>,
}
