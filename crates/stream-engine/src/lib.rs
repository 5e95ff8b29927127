//! Stream Engine - Demand-driven streaming pipelines over region-based data
//!
//! This crate provides a pipeline engine in which nodes produce
//! N-dimensional pixel datasets on demand. It supports:
//!
//! - Lazy updates: only stale outputs are regenerated, only over the
//!   region a consumer asked for
//! - Streaming: a node may split its requested output into sequential
//!   passes, so upstream memory stays bounded by one pass
//! - Progress events at every pass boundary
//!
//! # Architecture
//!
//! - `Pipeline`: arena of nodes and datasets running the four-phase update
//!   protocol
//! - `StreamingController`: drives a `StreamingFilter` through its passes
//!   and tracks the current request number (-1 when idle)
//! - `EventSink`: generic event streaming (channel, collector, or nothing)
//!
//! # Example
//!
//! ```ignore
//! use stream_engine::{NullEventSink, Pipeline};
//!
//! let mut pipeline = Pipeline::new();
//! let image = pipeline.add_dataset(image);
//! let streamed = pipeline.add_streaming("streamer", my_streaming_filter, &[image])?;
//! pipeline.update(streamed.output, &NullEventSink)?;
//! ```

pub mod config;
pub mod controller;
pub mod dataset;
pub mod error;
pub mod events;
pub mod node;
pub mod pipeline;
pub mod pixel;
pub mod region;
pub mod split;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export key types
pub use config::{PipelineConfig, StreamingOptions};
pub use controller::{PassContext, StreamingController, NOT_UPDATING};
pub use dataset::Dataset;
pub use error::{Result, StreamError};
pub use events::{ChannelEventSink, EventError, EventSink, NullEventSink, StreamEvent, VecEventSink};
pub use node::{copy_input_information, copy_output_request_to_inputs, Filter, NodeIo, StreamingFilter};
pub use pipeline::{NodeKind, Pipeline};
pub use pixel::{PixelBuffer, PixelType};
pub use region::Region;
pub use split::SplitStrategy;
pub use types::{DataId, NodeHandle, NodeId, NodeRole, PipelineSummary};
