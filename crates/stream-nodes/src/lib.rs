//! Stream Nodes
//!
//! Node implementations for the stream engine. Each node is a building
//! block that can be composed into pipelines.
//!
//! # Categories
//!
//! - **Input**: Nodes that serve data from memory or from a function
//! - **Processing**: Nodes that transform a requested region in one step
//! - **Streaming**: Nodes that divide their output into sequential passes

pub mod input;
pub mod processing;
pub mod streaming;

// Re-export all nodes for convenience
pub use input::*;
pub use processing::*;
pub use streaming::*;
