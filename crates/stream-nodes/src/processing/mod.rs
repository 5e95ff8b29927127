//! Processing nodes
//!
//! Nodes that compute their whole requested output in one step.

mod cast;
mod mean;

pub use cast::{CastConfig, CastFilter};
pub use mean::{MeanConfig, MeanFilter};
