//! Streaming nodes
//!
//! Nodes that divide their requested output into sequential passes so that
//! upstream nodes only ever hold one piece at a time.

mod statistics;
mod streamer;

pub use statistics::{Statistics, StatisticsFilter};
pub use streamer::StreamingImageFilter;
