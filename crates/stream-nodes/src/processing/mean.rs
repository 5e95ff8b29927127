//! Mean Filter
//!
//! Box mean over a neighbourhood of a given radius.

use serde::{Deserialize, Serialize};
use stream_engine::{Filter, NodeIo, Region, Result, StreamError};

/// Configuration for the mean filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanConfig {
    /// Neighbourhood radius along every axis
    pub radius: u64,
}

impl Default for MeanConfig {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

/// Mean Filter
///
/// Each output pixel is the mean of the input pixels within `radius` of it
/// along every axis. Near the border only the part of the neighbourhood
/// inside the image is averaged.
///
/// The input is asked for the output request padded by the radius and
/// cropped to the input's extent, so streaming consumers get correct
/// borders between pieces.
///
/// # Inputs
/// - 0: image of any pixel type
///
/// # Outputs
/// - Same extent and pixel type as the input
pub struct MeanFilter {
    config: MeanConfig,
}

impl MeanFilter {
    pub fn new(radius: u64) -> Self {
        Self::with_config(MeanConfig { radius })
    }

    pub fn with_config(config: MeanConfig) -> Self {
        Self { config }
    }

    pub fn radius(&self) -> u64 {
        self.config.radius
    }

    pub fn set_radius(&mut self, radius: u64) {
        self.config.radius = radius;
    }

    fn neighbourhood(&self, index: &[i64], bounds: &Region) -> Result<Option<Region>> {
        let centre = Region::new(index.to_vec(), vec![1; index.len()])?;
        let mut window = centre.pad(&vec![self.config.radius; index.len()])?;
        Ok(window.crop(bounds).then_some(window))
    }
}

impl Filter for MeanFilter {
    fn type_name(&self) -> &'static str {
        "MeanFilter"
    }

    fn generate_input_requested_region(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        let requested = io.output_requested_region()?;
        let largest = io.input(0)?.largest_possible_region().clone();
        let mut padded = requested.pad(&vec![self.config.radius; requested.dimension()])?;
        if !padded.crop(&largest) {
            padded = Region::empty(largest.dimension());
        }
        io.set_input_requested_region(0, padded)
    }

    fn generate_data(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        let region = io.output_requested_region()?;
        let (inputs, output) = io.split()?;
        let input = inputs
            .first()
            .copied()
            .ok_or(StreamError::MissingInput { index: 0, count: 0 })?;
        let bounds = input.largest_possible_region();

        for index in region.indices() {
            let Some(window) = self.neighbourhood(&index, bounds)? else {
                continue;
            };
            let values = input.region_values(&window)?;
            let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
            output.set(&index, mean)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use stream_engine::{Dataset, NullEventSink, Pipeline, PixelType};

    use super::*;

    fn checkerboard() -> Dataset {
        Dataset::from_fn(PixelType::F64, Region::from_size(vec![4, 4]), |i| {
            ((i[0] + i[1]) % 2) as f64 * 9.0
        })
    }

    #[test]
    fn test_mean_with_cropped_border() {
        let mut pipeline = Pipeline::new();
        let input = pipeline.add_dataset(checkerboard());
        let mean = pipeline.add_filter("mean", MeanFilter::new(1), &[input]).unwrap();

        pipeline.update(mean.output, &NullEventSink).unwrap();

        let output = pipeline.dataset(mean.output).unwrap();
        // Interior: 4 of 9 neighbours are 9
        assert_eq!(output.get(&[1, 1]), Some(4.0));
        // Corner: 2 of 4 neighbours are 9
        assert_eq!(output.get(&[0, 0]), Some(4.5));
        assert_eq!(output.pixel_type(), PixelType::F64);
    }

    #[test]
    fn test_input_request_is_padded_and_cropped() {
        let mut pipeline = Pipeline::new();
        let input = pipeline.add_dataset(checkerboard());
        let mean = pipeline.add_filter("mean", MeanFilter::new(1), &[input]).unwrap();
        let window = Region::new(vec![0, 2], vec![2, 1]).unwrap();
        pipeline.set_requested_region(mean.output, window).unwrap();

        pipeline.update(mean.output, &NullEventSink).unwrap();

        assert_eq!(
            pipeline.dataset(input).unwrap().requested_region(),
            Some(&Region::new(vec![0, 1], vec![3, 3]).unwrap())
        );
        assert_eq!(pipeline.dataset(mean.output).unwrap().get(&[1, 2]), Some(5.0));
    }

    #[test]
    fn test_radius_change_reruns() {
        let mut pipeline = Pipeline::new();
        let input = pipeline.add_dataset(checkerboard());
        let mean = pipeline.add_filter("mean", MeanFilter::new(0), &[input]).unwrap();
        pipeline.update(mean.output, &NullEventSink).unwrap();
        assert_eq!(pipeline.dataset(mean.output).unwrap().get(&[1, 0]), Some(9.0));

        pipeline.filter_mut::<MeanFilter>(mean.node).unwrap().set_radius(1);
        pipeline.update(mean.output, &NullEventSink).unwrap();
        assert_eq!(pipeline.dataset(mean.output).unwrap().get(&[1, 0]), Some(4.5));
    }

    #[test]
    fn test_config_defaults() {
        let config: MeanConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(MeanFilter::with_config(config).radius(), 1);
    }
}
