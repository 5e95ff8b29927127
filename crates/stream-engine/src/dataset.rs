//! Dataset handles
//!
//! A dataset carries three regions: the largest possible region (the full
//! logical extent), the buffered region (what is resident in memory) and
//! the requested region (what a consumer wants next). Pixels are stored
//! over the buffered region only.
//!
//! Every dataset also carries stamps used by the update protocol:
//!
//! - **generation**: bumped whenever the content changes
//! - **pipeline stamp**: newest change anywhere upstream, refreshed by the
//!   output-information phase
//! - **update stamp**: when the producer last generated the content
//!
//! Content is stale when it was never generated, was generated before the
//! pipeline stamp, or does not cover the requested region.

use crate::error::{Result, StreamError};
use crate::pixel::{PixelBuffer, PixelType};
use crate::region::Region;
use crate::types::NodeId;

/// A region-addressed pixel dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    largest: Region,
    buffered: Region,
    requested: Option<Region>,
    pixels: PixelBuffer,
    generation: u64,
    pub(crate) pipeline_stamp: u64,
    pub(crate) update_stamp: u64,
    pub(crate) source: Option<NodeId>,
    release_data: bool,
}

impl Dataset {
    /// Create an empty dataset; nothing is buffered until it is allocated
    pub fn new(pixel_type: PixelType, largest: Region) -> Self {
        let dimension = largest.dimension();
        Self {
            largest,
            buffered: Region::empty(dimension),
            requested: None,
            pixels: PixelBuffer::zeros(pixel_type, 0),
            generation: 0,
            pipeline_stamp: 0,
            update_stamp: 0,
            source: None,
            release_data: false,
        }
    }

    /// Create a fully buffered dataset from existing pixels
    pub fn from_pixels(largest: Region, pixels: PixelBuffer) -> Result<Self> {
        let expected = largest.number_of_elements();
        if pixels.len() as u64 != expected {
            return Err(StreamError::BufferSize {
                region: largest,
                expected,
                actual: pixels.len() as u64,
            });
        }
        let mut dataset = Self::new(pixels.pixel_type(), largest.clone());
        dataset.buffered = largest;
        dataset.pixels = pixels;
        Ok(dataset)
    }

    /// Create a fully buffered dataset with every pixel computed from its index
    pub fn from_fn(pixel_type: PixelType, largest: Region, f: impl Fn(&[i64]) -> f64) -> Self {
        let values: Vec<f64> = largest.indices().map(|index| f(&index)).collect();
        let mut dataset = Self::new(pixel_type, largest.clone());
        dataset.pixels = PixelBuffer::from_f64(pixel_type, &values);
        dataset.buffered = largest;
        dataset
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixels.pixel_type()
    }

    pub fn dimension(&self) -> usize {
        self.largest.dimension()
    }

    pub fn largest_possible_region(&self) -> &Region {
        &self.largest
    }

    pub fn buffered_region(&self) -> &Region {
        &self.buffered
    }

    /// The region a consumer asked for, if one has been set
    pub fn requested_region(&self) -> Option<&Region> {
        self.requested.as_ref()
    }

    /// Monotonic stamp of the last content change
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut PixelBuffer {
        &mut self.pixels
    }

    pub fn set_largest_possible_region(&mut self, region: Region) {
        if region.dimension() != self.buffered.dimension() {
            self.buffered = Region::empty(region.dimension());
            self.pixels = PixelBuffer::zeros(self.pixel_type(), 0);
        }
        self.largest = region;
    }

    /// Set the requested region; containment is checked during propagation
    pub fn set_requested_region(&mut self, region: Region) {
        self.requested = Some(region);
    }

    pub fn set_requested_region_to_largest_possible_region(&mut self) {
        self.requested = Some(self.largest.clone());
    }

    /// Whether the requested region is not resident
    pub fn requested_region_is_outside_of_buffered_region(&self) -> bool {
        match &self.requested {
            Some(requested) => !self.buffered.contains(requested),
            None => false,
        }
    }

    /// Change the pixel type, dropping the buffer if it changes
    pub fn set_pixel_type(&mut self, pixel_type: PixelType) {
        if self.pixel_type() != pixel_type {
            self.pixels = PixelBuffer::zeros(pixel_type, 0);
            self.buffered = Region::empty(self.dimension());
        }
    }

    /// Allocate a zeroed buffer covering `region`
    pub fn allocate(&mut self, region: Region) -> Result<()> {
        let len = usize::try_from(region.number_of_elements()).map_err(|_| StreamError::BufferSize {
            region: region.clone(),
            expected: region.number_of_elements(),
            actual: usize::MAX as u64,
        })?;
        self.pixels = PixelBuffer::zeros(self.pixel_type(), len);
        self.buffered = region;
        Ok(())
    }

    /// Whether the release-data flag is set
    pub fn release_data_flag(&self) -> bool {
        self.release_data
    }

    /// Release the buffer after downstream consumers have read it
    pub fn set_release_data_flag(&mut self, release: bool) {
        self.release_data = release;
    }

    /// Drop the buffered pixels; the next update regenerates them
    pub fn release_data(&mut self) {
        self.pixels = PixelBuffer::zeros(self.pixel_type(), 0);
        self.buffered = Region::empty(self.dimension());
        self.update_stamp = 0;
    }

    /// Pixel at `index` as f64, `None` if it is not buffered
    pub fn get(&self, index: &[i64]) -> Option<f64> {
        self.buffered
            .offset_of(index)
            .and_then(|offset| self.pixels.get(offset))
    }

    /// Store a pixel; the index must be buffered
    pub fn set(&mut self, index: &[i64], value: f64) -> Result<()> {
        let offset = self.buffered.offset_of(index).ok_or_else(|| {
            StreamError::failed(format!(
                "index {:?} is outside buffered region {}",
                index, self.buffered
            ))
        })?;
        self.pixels.set(offset, value);
        Ok(())
    }

    /// Values of `region` in buffer order
    pub fn region_values(&self, region: &Region) -> Result<Vec<f64>> {
        if !self.buffered.contains(region) {
            return Err(StreamError::failed(format!(
                "region {} is not inside buffered region {}",
                region, self.buffered
            )));
        }
        Ok(region
            .indices()
            .filter_map(|index| self.get(&index))
            .collect())
    }

    /// Copy `region` from `source` into this dataset, line by line
    ///
    /// Both buffers must contain `region`.
    pub fn copy_region_from(&mut self, source: &Dataset, region: &Region) -> Result<()> {
        if region.is_empty() {
            return Ok(());
        }
        if !source.buffered.contains(region) || !self.buffered.contains(region) {
            return Err(StreamError::failed(format!(
                "cannot copy {}: source buffers {}, destination buffers {}",
                region, source.buffered, self.buffered
            )));
        }
        let line = region.size()[0];
        let lines = region.number_of_elements() / line;
        for n in 0..lines {
            let Some(start) = region.index_at(n * line) else {
                break;
            };
            let (Some(from), Some(to)) = (source.buffered.offset_of(&start), self.buffered.offset_of(&start))
            else {
                continue;
            };
            self.pixels.copy_span(to, &source.pixels, from, line as usize);
        }
        Ok(())
    }

    /// Record an external content change
    pub(crate) fn touch(&mut self, stamp: u64) {
        self.generation = stamp;
    }

    /// Record that the producer finished generating the content
    pub(crate) fn mark_generated(&mut self, stamp: u64) {
        self.generation = stamp;
        self.update_stamp = stamp;
    }

    pub(crate) fn is_stale(&self) -> bool {
        self.update_stamp == 0
            || self.update_stamp < self.pipeline_stamp
            || self.requested_region_is_outside_of_buffered_region()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(size: &[u64]) -> Dataset {
        let region = Region::from_size(size.to_vec());
        let width = size[0] as i64;
        Dataset::from_fn(PixelType::F32, region, |index| (index[1] * width + index[0]) as f64)
    }

    #[test]
    fn test_from_pixels_checks_length() {
        let region = Region::from_size(vec![2, 2]);
        assert!(Dataset::from_pixels(region.clone(), PixelBuffer::zeros(PixelType::U8, 3)).is_err());
        let dataset = Dataset::from_pixels(region.clone(), PixelBuffer::zeros(PixelType::U8, 4)).unwrap();
        assert_eq!(dataset.buffered_region(), &region);
        assert_eq!(dataset.pixel_type(), PixelType::U8);
    }

    #[test]
    fn test_get_set_within_buffer() {
        let mut dataset = Dataset::new(PixelType::I32, Region::from_size(vec![10, 10]));
        dataset.allocate(Region::new(vec![0, 5], vec![10, 5]).unwrap()).unwrap();

        dataset.set(&[3, 6], 42.0).unwrap();
        assert_eq!(dataset.get(&[3, 6]), Some(42.0));
        assert_eq!(dataset.get(&[3, 2]), None);
        assert!(dataset.set(&[3, 2], 1.0).is_err());
    }

    #[test]
    fn test_copy_region_between_buffers() {
        let source = ramp(&[8, 8]);
        let mut target = Dataset::new(PixelType::F64, Region::from_size(vec![8, 8]));
        let slab = Region::new(vec![0, 2], vec![8, 3]).unwrap();
        target.allocate(slab.clone()).unwrap();

        let window = Region::new(vec![2, 3], vec![4, 2]).unwrap();
        target.copy_region_from(&source, &window).unwrap();

        assert_eq!(target.get(&[2, 3]), Some(26.0));
        assert_eq!(target.get(&[5, 4]), Some(37.0));
        assert_eq!(target.get(&[1, 3]), Some(0.0));
        assert_eq!(target.region_values(&window).unwrap(), source.region_values(&window).unwrap());

        let outside = Region::new(vec![0, 0], vec![8, 1]).unwrap();
        assert!(target.copy_region_from(&source, &outside).is_err());
    }

    #[test]
    fn test_staleness_and_release() {
        let mut dataset = ramp(&[4, 4]);
        assert!(dataset.is_stale());

        dataset.mark_generated(5);
        dataset.pipeline_stamp = 4;
        dataset.set_requested_region(Region::new(vec![1, 1], vec![2, 2]).unwrap());
        assert!(!dataset.is_stale());
        assert_eq!(dataset.generation(), 5);

        dataset.pipeline_stamp = 6;
        assert!(dataset.is_stale());

        dataset.mark_generated(7);
        dataset.release_data();
        assert!(dataset.buffered_region().is_empty());
        assert!(dataset.is_stale());
    }
}
