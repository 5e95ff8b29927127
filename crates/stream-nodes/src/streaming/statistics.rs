//! Statistics Filter
//!
//! Streaming reduction over an image of any size.

use serde::{Deserialize, Serialize};
use stream_engine::{
    NodeIo, PassContext, Region, Result, StreamError, StreamingFilter, StreamingOptions,
};

use super::streamer::{planned_passes, request_piece};

/// Summary statistics of the last streamed region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub count: u64,
    pub minimum: f64,
    pub maximum: f64,
    pub sum: f64,
    pub mean: f64,
    /// Sample variance; 0 for fewer than two pixels
    pub variance: f64,
}

impl Statistics {
    pub fn sigma(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Running count, extremes, mean and sum of squared deviations
///
/// Values are folded in with Welford's update and whole passes are combined
/// with Chan's merge, so a large common offset does not cancel out the
/// spread.
#[derive(Debug, Clone, Default)]
struct Accumulator {
    count: u64,
    sum: f64,
    mean: f64,
    m2: f64,
    minimum: f64,
    maximum: f64,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.minimum = value;
            self.maximum = value;
        } else {
            self.minimum = self.minimum.min(value);
            self.maximum = self.maximum.max(value);
        }
        self.count += 1;
        self.sum += value;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn merge(&mut self, other: &Accumulator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let (n_a, n_b) = (self.count as f64, other.count as f64);
        let total = n_a + n_b;
        let delta = other.mean - self.mean;
        self.mean += delta * n_b / total;
        self.m2 += other.m2 + delta * delta * n_a * n_b / total;
        self.count += other.count;
        self.sum += other.sum;
        self.minimum = self.minimum.min(other.minimum);
        self.maximum = self.maximum.max(other.maximum);
    }

    fn finish(&self) -> Statistics {
        let variance = if self.count > 1 {
            (self.m2 / (self.count - 1) as f64).max(0.0)
        } else {
            0.0
        };
        Statistics {
            count: self.count,
            minimum: self.minimum,
            maximum: self.maximum,
            sum: self.sum,
            mean: self.mean,
            variance,
        }
    }
}

/// Statistics Filter
///
/// Streams its input like [`StreamingImageFilter`](super::StreamingImageFilter)
/// and passes it through unchanged, accumulating count, extremes, mean and
/// variance one piece at a time. Accumulators are cleared before the first
/// pass and the result is published after the last one, so a failed run
/// leaves the previous statistics in place.
///
/// # Inputs
/// - 0: image to measure
///
/// # Outputs
/// - The input's pixels over the requested region
#[derive(Default)]
pub struct StatisticsFilter {
    options: StreamingOptions,
    accumulator: Accumulator,
    statistics: Option<Statistics>,
}

impl StatisticsFilter {
    pub fn new(options: StreamingOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            ..Default::default()
        })
    }

    /// Statistics of the last completed run
    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }
}

impl StreamingFilter for StatisticsFilter {
    fn type_name(&self) -> &'static str {
        "StatisticsFilter"
    }

    fn number_of_input_requested_regions(&self, io: &NodeIo<'_>) -> u64 {
        planned_passes(&self.options, io)
    }

    fn generate_nth_input_requested_region(&mut self, pass: u64, io: &mut NodeIo<'_>) -> Result<Region> {
        request_piece(&self.options, pass, io)
    }

    fn before_streamed_generate_data(&mut self, _io: &mut NodeIo<'_>) -> Result<()> {
        self.accumulator = Accumulator::default();
        Ok(())
    }

    fn streamed_generate_data(&mut self, pass: &mut PassContext<'_>) -> Result<()> {
        let piece = pass.region().clone();
        let (inputs, output) = pass.io_mut().split()?;
        let input = inputs
            .first()
            .copied()
            .ok_or(StreamError::MissingInput { index: 0, count: 0 })?;
        let mut partial = Accumulator::default();
        for value in input.region_values(&piece)? {
            partial.add(value);
        }
        self.accumulator.merge(&partial);
        output.copy_region_from(input, &piece)
    }

    fn after_streamed_generate_data(&mut self, _io: &mut NodeIo<'_>) -> Result<()> {
        let statistics = self.accumulator.finish();
        log::debug!(
            "Statistics over {} pixels: mean {} variance {}",
            statistics.count,
            statistics.mean,
            statistics.variance
        );
        self.statistics = Some(statistics);
        Ok(())
    }
}
