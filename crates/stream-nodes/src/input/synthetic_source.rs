//! Synthetic Source
//!
//! Computes pixel values from their index, only where they are requested.

use stream_engine::{Filter, NodeIo, PixelType, Region, Result};

type PixelFn = Box<dyn Fn(&[i64]) -> f64 + Send>;

/// Synthetic Source
///
/// Stands in for a reader of an image too large to hold in memory: nothing
/// outside the requested region is ever evaluated.
pub struct SyntheticSource {
    pixel_type: PixelType,
    largest: Region,
    value: PixelFn,
    evaluated: u64,
}

impl SyntheticSource {
    pub fn new(
        pixel_type: PixelType,
        largest: Region,
        value: impl Fn(&[i64]) -> f64 + Send + 'static,
    ) -> Self {
        Self {
            pixel_type,
            largest,
            value: Box::new(value),
            evaluated: 0,
        }
    }

    /// Total number of pixels computed so far
    pub fn evaluated(&self) -> u64 {
        self.evaluated
    }
}

impl Filter for SyntheticSource {
    fn type_name(&self) -> &'static str {
        "SyntheticSource"
    }

    fn generate_output_information(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        let output = io.output_mut();
        output.set_largest_possible_region(self.largest.clone());
        output.set_pixel_type(self.pixel_type);
        Ok(())
    }

    fn generate_data(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        let region = io.output_requested_region()?;
        let output = io.output_mut();
        for index in region.indices() {
            output.set(&index, (self.value)(&index))?;
        }
        self.evaluated += region.number_of_elements();
        Ok(())
    }
}
