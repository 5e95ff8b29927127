//! Node capability interfaces
//!
//! Every node in a pipeline is one of two kinds:
//!
//! - [`Filter`]: computes its whole requested output in one step. The
//!   generic update protocol propagates the output request to its inputs,
//!   updates them, allocates the output and calls `generate_data`.
//! - [`StreamingFilter`]: divides its requested output into sequential
//!   passes. The [`StreamingController`](crate::StreamingController) drives
//!   it: no upfront propagation, then per pass narrow the inputs, update
//!   them, and call `streamed_generate_data`.
//!
//! Both see their datasets through a [`NodeIo`] view scoped to the node's
//! own inputs and output.

use std::any::Any;
use std::cmp::Ordering;

use crate::controller::PassContext;
use crate::dataset::Dataset;
use crate::error::{Result, StreamError};
use crate::region::Region;
use crate::types::DataId;

/// A node's view of its input datasets and its output dataset
pub struct NodeIo<'a> {
    datasets: &'a mut [Dataset],
    inputs: &'a [DataId],
    output: DataId,
}

impl<'a> NodeIo<'a> {
    pub(crate) fn new(datasets: &'a mut [Dataset], inputs: &'a [DataId], output: DataId) -> Self {
        Self {
            datasets,
            inputs,
            output,
        }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn input_id(&self, index: usize) -> Result<DataId> {
        self.inputs.get(index).copied().ok_or(StreamError::MissingInput {
            index,
            count: self.inputs.len(),
        })
    }

    pub fn input(&self, index: usize) -> Result<&Dataset> {
        let id = self.input_id(index)?;
        self.datasets.get(id.0).ok_or(StreamError::UnknownData(id))
    }

    pub fn output_id(&self) -> DataId {
        self.output
    }

    pub fn output(&self) -> &Dataset {
        &self.datasets[self.output.0]
    }

    pub fn output_mut(&mut self) -> &mut Dataset {
        &mut self.datasets[self.output.0]
    }

    /// The output's requested region
    pub fn output_requested_region(&self) -> Result<Region> {
        self.output().requested_region().cloned().ok_or_else(|| {
            StreamError::failed(format!("dataset {} has no requested region", self.output))
        })
    }

    /// Narrow (or widen) what is asked of input `index`
    pub fn set_input_requested_region(&mut self, index: usize, region: Region) -> Result<()> {
        let id = self.input_id(index)?;
        let input = self.datasets.get_mut(id.0).ok_or(StreamError::UnknownData(id))?;
        if input.dimension() != region.dimension() {
            return Err(StreamError::DimensionMismatch {
                expected: input.dimension(),
                actual: region.dimension(),
            });
        }
        input.set_requested_region(region);
        Ok(())
    }

    /// Borrow all inputs for reading and the output for writing at once
    pub fn split(&mut self) -> Result<(Vec<&Dataset>, &mut Dataset)> {
        let out = self.output.0;
        if out >= self.datasets.len() {
            return Err(StreamError::UnknownData(self.output));
        }
        let (before, rest) = self.datasets.split_at_mut(out);
        let (output, after) = rest
            .split_first_mut()
            .ok_or(StreamError::UnknownData(self.output))?;
        let before: &[Dataset] = before;
        let after: &[Dataset] = after;

        let mut inputs = Vec::with_capacity(self.inputs.len());
        for id in self.inputs {
            let input = match id.0.cmp(&out) {
                Ordering::Less => before.get(id.0),
                Ordering::Greater => after.get(id.0 - out - 1),
                Ordering::Equal => None,
            };
            inputs.push(input.ok_or(StreamError::UnknownData(*id))?);
        }
        Ok((inputs, output))
    }
}

/// Output information default: the output takes the first input's extent
/// and pixel type
pub fn copy_input_information(io: &mut NodeIo<'_>) -> Result<()> {
    if io.input_count() == 0 {
        return Ok(());
    }
    let input = io.input(0)?;
    let largest = input.largest_possible_region().clone();
    let pixel_type = input.pixel_type();
    let output = io.output_mut();
    output.set_largest_possible_region(largest);
    output.set_pixel_type(pixel_type);
    Ok(())
}

/// Input request default: every input is asked for the output's requested
/// region, cropped to the input's largest possible region
pub fn copy_output_request_to_inputs(io: &mut NodeIo<'_>) -> Result<()> {
    let requested = io.output_requested_region()?;
    for index in 0..io.input_count() {
        let mut region = requested.clone();
        region.crop(io.input(index)?.largest_possible_region());
        io.set_input_requested_region(index, region)?;
    }
    Ok(())
}

/// A node that computes its requested output in one step
pub trait Filter: Any + Send {
    /// Name used in logs and summaries
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Refresh the output's largest possible region (and pixel type)
    fn generate_output_information(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        copy_input_information(io)
    }

    /// Grow the output request before it is propagated (e.g. to whole lines)
    fn enlarge_output_requested_region(&mut self, _io: &mut NodeIo<'_>) -> Result<()> {
        Ok(())
    }

    /// Decide what to ask of each input for the output's requested region
    fn generate_input_requested_region(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        copy_output_request_to_inputs(io)
    }

    /// Fill the output's requested region
    ///
    /// The output is already allocated over its requested region and every
    /// input buffers at least what was asked of it.
    fn generate_data(&mut self, io: &mut NodeIo<'_>) -> Result<()>;
}

/// A node that produces its output in sequential passes
///
/// The controller allocates the output over the full requested region once,
/// before `before_streamed_generate_data` runs. Hooks write into that buffer
/// and must not reallocate it.
pub trait StreamingFilter: Any + Send {
    /// Name used in logs and summaries
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Refresh the output's largest possible region (and pixel type)
    fn generate_output_information(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        copy_input_information(io)
    }

    /// Number of passes for the current request, at least one
    ///
    /// Called once per run before anything is propagated. Return 1 when the
    /// output cannot be divided.
    fn number_of_input_requested_regions(&self, io: &NodeIo<'_>) -> u64;

    /// Set every input's requested region for pass `pass`
    ///
    /// Returns the part of the output this pass produces. Over all passes
    /// these parts must cover the output's requested region.
    fn generate_nth_input_requested_region(&mut self, pass: u64, io: &mut NodeIo<'_>) -> Result<Region>;

    /// Compute the output for one pass from the now-resident input regions
    fn streamed_generate_data(&mut self, pass: &mut PassContext<'_>) -> Result<()>;

    /// Called once per run before the first pass
    fn before_streamed_generate_data(&mut self, _io: &mut NodeIo<'_>) -> Result<()> {
        Ok(())
    }

    /// Called once per successful run after the last pass
    fn after_streamed_generate_data(&mut self, _io: &mut NodeIo<'_>) -> Result<()> {
        Ok(())
    }
}
