//! Error types for the stream engine

use thiserror::Error;

use crate::region::Region;
use crate::types::{DataId, NodeId};

/// Result type alias using StreamError
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that can occur while building or updating a pipeline
#[derive(Debug, Error)]
pub enum StreamError {
    /// A dataset's requested region is not inside its largest possible region
    #[error("Requested region {requested} of dataset {data} lies outside its largest possible region {largest}")]
    RegionOutOfBounds {
        data: DataId,
        requested: Region,
        largest: Region,
    },

    /// An input could not satisfy the sub-region requested for a pass
    #[error("Upstream propagation failed during pass {pass} of '{node}': {source}")]
    UpstreamPropagation {
        node: String,
        pass: u64,
        #[source]
        source: Box<StreamError>,
    },

    /// The split policy produced an unusable pass plan
    #[error("Split policy of '{node}' failed{}: {reason}", pass_suffix(.pass))]
    SplitPolicy {
        node: String,
        pass: Option<u64>,
        reason: String,
        #[source]
        source: Option<Box<StreamError>>,
    },

    /// The per-pass compute hook failed
    #[error("Pass {pass} of '{node}' failed: {source}")]
    ComputeHook {
        node: String,
        pass: u64,
        #[source]
        source: Box<StreamError>,
    },

    /// A non-streaming node (or a run-level hook) failed
    #[error("Node '{node}' failed: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: Box<StreamError>,
    },

    /// A node finished without buffering everything that was requested
    #[error("Node '{node}' buffered {buffered} but {requested} was requested")]
    BufferUnderrun {
        node: String,
        requested: Region,
        buffered: Region,
    },

    /// A streaming run was reset from inside one of its passes
    #[error("Streaming run of '{node}' was reset during pass {pass}")]
    Reset { node: String, pass: u64 },

    /// Execution failed with a message
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Work was cancelled cooperatively
    #[error("Cancelled")]
    Cancelled,

    /// Connecting an input would create a cycle
    #[error("Connecting dataset {data} to node '{node}' would create a cycle")]
    CycleDetected { node: String, data: DataId },

    /// A node is already executing further up the call stack
    #[error("Node {0} is already executing")]
    NodeBusy(NodeId),

    /// Unknown node handle
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Unknown dataset handle
    #[error("Unknown dataset: {0}")]
    UnknownData(DataId),

    /// A node has no input at the given position
    #[error("Node has no input {index} (it has {count})")]
    MissingInput { index: usize, count: usize },

    /// Regions or indices of different dimension were combined
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A pixel buffer does not match its region
    #[error("Pixel buffer holds {actual} elements but region {region} needs {expected}")]
    BufferSize {
        region: Region,
        expected: u64,
        actual: u64,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn pass_suffix(pass: &Option<u64>) -> String {
    match pass {
        Some(pass) => format!(" at pass {}", pass),
        None => String::new(),
    }
}

impl StreamError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Create a split policy error
    pub fn split_policy(node: impl Into<String>, pass: Option<u64>, reason: impl Into<String>) -> Self {
        Self::SplitPolicy {
            node: node.into(),
            pass,
            reason: reason.into(),
            source: None,
        }
    }

    /// Wrap a failure of the split hook itself as a split policy error
    pub fn split_hook(node: impl Into<String>, pass: u64, source: StreamError) -> Self {
        Self::SplitPolicy {
            node: node.into(),
            pass: Some(pass),
            reason: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error, or any error it wraps, is a cooperative cancellation
    pub fn is_cancelled(&self) -> bool {
        self.root_cause_is(|e| matches!(e, StreamError::Cancelled))
    }

    /// Whether this error, or any error it wraps, is a split policy failure
    pub fn is_split_policy(&self) -> bool {
        self.root_cause_is(|e| matches!(e, StreamError::SplitPolicy { .. }))
    }

    /// The pass index of the outermost streaming failure, if any
    pub fn failed_pass(&self) -> Option<u64> {
        match self {
            Self::UpstreamPropagation { pass, .. }
            | Self::ComputeHook { pass, .. }
            | Self::Reset { pass, .. } => Some(*pass),
            Self::SplitPolicy { pass, .. } => *pass,
            _ => None,
        }
    }

    fn root_cause_is(&self, pred: impl Fn(&StreamError) -> bool) -> bool {
        let mut current = self;
        loop {
            if pred(current) {
                return true;
            }
            match current {
                Self::UpstreamPropagation { source, .. }
                | Self::ComputeHook { source, .. }
                | Self::NodeFailed { source, .. } => current = &**source,
                Self::SplitPolicy {
                    source: Some(source),
                    ..
                } => current = &**source,
                _ => return false,
            }
        }
    }
}
