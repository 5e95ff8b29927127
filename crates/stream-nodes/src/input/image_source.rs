//! Image Source
//!
//! Serves requested sub-regions of an in-memory image.

use std::collections::VecDeque;

use stream_engine::{Dataset, Filter, NodeIo, Region, Result, StreamError};

/// Image Source
///
/// Holds a fully buffered image and copies out only the region that is
/// requested of it. Copies are counted and the most recent
/// [`SERVED_HISTORY`] regions are kept, which makes it easy to see how much
/// of the image a streaming consumer pulled at a time.
///
/// # Outputs
/// - The image's extent and pixel type; pixels over the requested region
pub struct ImageSource {
    image: Dataset,
    generations: u64,
    served: VecDeque<Region>,
}

/// Number of served regions an [`ImageSource`] remembers
pub const SERVED_HISTORY: usize = 32;

impl ImageSource {
    /// Create a source from a fully buffered image
    pub fn new(image: Dataset) -> Result<Self> {
        check_buffered(&image)?;
        Ok(Self {
            image,
            generations: 0,
            served: VecDeque::with_capacity(SERVED_HISTORY),
        })
    }

    pub fn image(&self) -> &Dataset {
        &self.image
    }

    /// Replace the image
    pub fn set_image(&mut self, image: Dataset) -> Result<()> {
        check_buffered(&image)?;
        self.image = image;
        Ok(())
    }

    /// Number of times pixels were copied out
    pub fn generations(&self) -> u64 {
        self.generations
    }

    /// The last [`SERVED_HISTORY`] regions copied out, oldest first
    pub fn served_regions(&self) -> &VecDeque<Region> {
        &self.served
    }
}

fn check_buffered(image: &Dataset) -> Result<()> {
    if image.buffered_region() != image.largest_possible_region() {
        return Err(StreamError::failed(format!(
            "image source needs the whole image buffered, got {} of {}",
            image.buffered_region(),
            image.largest_possible_region()
        )));
    }
    Ok(())
}

impl Filter for ImageSource {
    fn type_name(&self) -> &'static str {
        "ImageSource"
    }

    fn generate_output_information(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        let output = io.output_mut();
        output.set_largest_possible_region(self.image.largest_possible_region().clone());
        output.set_pixel_type(self.image.pixel_type());
        Ok(())
    }

    fn generate_data(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        let region = io.output_requested_region()?;
        io.output_mut().copy_region_from(&self.image, &region)?;
        log::trace!("ImageSource served {}", region);
        if self.served.len() == SERVED_HISTORY {
            self.served.pop_front();
        }
        self.served.push_back(region);
        self.generations += 1;
        Ok(())
    }
}
