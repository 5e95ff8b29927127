//! Input nodes
//!
//! Nodes without inputs that serve whatever region is requested of them.

mod image_source;
mod synthetic_source;

pub use image_source::{ImageSource, SERVED_HISTORY};
pub use synthetic_source::SyntheticSource;
