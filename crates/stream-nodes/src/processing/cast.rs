//! Cast Filter
//!
//! Converts pixels to another pixel type.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stream_engine::{copy_input_information, Filter, NodeIo, PixelBuffer, PixelType, Result, StreamError};

/// Configuration for the cast filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastConfig {
    /// Pixel type of the output
    pub pixel_type: PixelType,
}

/// Cast Filter
///
/// Copies its input over the requested region, converting every pixel with
/// `as` semantics (float to integer truncates and saturates, NaN becomes 0).
/// Lines along the fastest axis are converted in parallel.
///
/// # Inputs
/// - 0: image of any pixel type
///
/// # Outputs
/// - Same extent as the input, `pixel_type` pixels
pub struct CastFilter {
    config: CastConfig,
}

impl CastFilter {
    pub fn new(pixel_type: PixelType) -> Self {
        Self::with_config(CastConfig { pixel_type })
    }

    pub fn with_config(config: CastConfig) -> Self {
        Self { config }
    }

    pub fn pixel_type(&self) -> PixelType {
        self.config.pixel_type
    }

    pub fn set_pixel_type(&mut self, pixel_type: PixelType) {
        self.config.pixel_type = pixel_type;
    }
}

impl Filter for CastFilter {
    fn type_name(&self) -> &'static str {
        "CastFilter"
    }

    fn generate_output_information(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        copy_input_information(io)?;
        io.output_mut().set_pixel_type(self.config.pixel_type);
        Ok(())
    }

    fn generate_data(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        let region = io.output_requested_region()?;
        let (inputs, output) = io.split()?;
        let input = inputs
            .first()
            .copied()
            .ok_or(StreamError::MissingInput { index: 0, count: 0 })?;
        if !input.buffered_region().contains(&region) {
            return Err(StreamError::failed(format!(
                "cast input buffers {} but {} is needed",
                input.buffered_region(),
                region
            )));
        }
        if region.is_empty() {
            return Ok(());
        }

        let line = region.size()[0] as usize;
        let mut values = vec![0.0; region.number_of_elements() as usize];
        values
            .par_chunks_mut(line)
            .enumerate()
            .for_each(|(row, chunk)| {
                let start = region
                    .index_at((row * line) as u64)
                    .and_then(|start| input.buffered_region().offset_of(&start));
                if let Some(from) = start {
                    for (x, value) in chunk.iter_mut().enumerate() {
                        *value = input.pixels().get(from + x).unwrap_or_default();
                    }
                }
            });

        *output.pixels_mut() = PixelBuffer::from_f64(self.config.pixel_type, &values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use stream_engine::{Dataset, NullEventSink, Pipeline, Region};

    use super::*;

    #[test]
    fn test_float_to_integer_saturates() {
        let region = Region::from_size(vec![4, 3]);
        let image = Dataset::from_pixels(
            region,
            PixelBuffer::from_f64(
                PixelType::F64,
                &[-1.5, 0.4, 254.6, 300.0, f64::NAN, 7.9, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0],
            ),
        )
        .unwrap();

        let mut pipeline = Pipeline::new();
        let input = pipeline.add_dataset(image);
        let cast = pipeline
            .add_filter("cast", CastFilter::new(PixelType::U8), &[input])
            .unwrap();
        pipeline.update(cast.output, &NullEventSink).unwrap();

        let output = pipeline.dataset(cast.output).unwrap();
        assert_eq!(output.pixel_type(), PixelType::U8);
        assert_eq!(
            output.pixels().to_f64(),
            vec![0.0, 0.0, 254.0, 255.0, 0.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0]
        );
    }

    #[test]
    fn test_window_of_larger_input() {
        let image = Dataset::from_fn(PixelType::I32, Region::from_size(vec![5, 5]), |i| {
            (i[0] * 100 + i[1]) as f64
        });
        let mut pipeline = Pipeline::new();
        let input = pipeline.add_dataset(image);
        let cast = pipeline
            .add_filter("cast", CastFilter::new(PixelType::F32), &[input])
            .unwrap();
        let window = Region::new(vec![1, 2], vec![3, 2]).unwrap();
        pipeline.set_requested_region(cast.output, window).unwrap();

        pipeline.update(cast.output, &NullEventSink).unwrap();

        let output = pipeline.dataset(cast.output).unwrap();
        assert_eq!(output.pixels().to_f64(), vec![102.0, 202.0, 302.0, 103.0, 203.0, 303.0]);
    }

    #[test]
    fn test_config_from_json() {
        let config: CastConfig = serde_json::from_str(r#"{"pixelType": "i16"}"#).unwrap();
        assert_eq!(CastFilter::with_config(config).pixel_type(), PixelType::I16);
    }
}
