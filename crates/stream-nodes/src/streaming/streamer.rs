//! Streaming Image Filter
//!
//! Pulls its input through in pieces and assembles the full output.

use stream_engine::{
    NodeIo, PassContext, Region, Result, SplitStrategy, StreamError, StreamingFilter, StreamingOptions,
};

/// Number of pieces the output's requested region is divided into
pub(crate) fn planned_passes(options: &StreamingOptions, io: &NodeIo<'_>) -> u64 {
    match io.output().requested_region() {
        Some(region) => options.strategy.number_of_splits(region, options.divisions),
        None => 1,
    }
}

/// Ask every input for piece `pass` and return it
pub(crate) fn request_piece(options: &StreamingOptions, pass: u64, io: &mut NodeIo<'_>) -> Result<Region> {
    let requested = io.output_requested_region()?;
    let piece = options
        .strategy
        .split(&requested, pass, options.divisions)
        .ok_or_else(|| StreamError::failed(format!("{} has no piece {}", requested, pass)))?;
    for index in 0..io.input_count() {
        io.set_input_requested_region(index, piece.clone())?;
    }
    Ok(piece)
}

/// Streaming Image Filter
///
/// Divides its requested output into `divisions` pieces (slabs or tiles)
/// and updates the upstream pipeline once per piece, copying each piece
/// into the output. Upstream nodes never hold more than one piece, which
/// keeps memory bounded on images larger than RAM. With one division it
/// behaves like a plain pass-through.
///
/// # Inputs
/// - 0: image to stream
///
/// # Outputs
/// - The input's pixels over the requested region
#[derive(Default)]
pub struct StreamingImageFilter {
    options: StreamingOptions,
}

impl StreamingImageFilter {
    pub fn new(divisions: u64) -> Result<Self> {
        Ok(Self::with_options(StreamingOptions::new(divisions, SplitStrategy::Slab)?))
    }

    pub fn with_options(options: StreamingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &StreamingOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: StreamingOptions) -> Result<()> {
        options.validate()?;
        self.options = options;
        Ok(())
    }
}

impl StreamingFilter for StreamingImageFilter {
    fn type_name(&self) -> &'static str {
        "StreamingImageFilter"
    }

    fn number_of_input_requested_regions(&self, io: &NodeIo<'_>) -> u64 {
        planned_passes(&self.options, io)
    }

    fn generate_nth_input_requested_region(&mut self, pass: u64, io: &mut NodeIo<'_>) -> Result<Region> {
        request_piece(&self.options, pass, io)
    }

    fn streamed_generate_data(&mut self, pass: &mut PassContext<'_>) -> Result<()> {
        let piece = pass.region().clone();
        let (inputs, output) = pass.io_mut().split()?;
        let input = inputs
            .first()
            .copied()
            .ok_or(StreamError::MissingInput { index: 0, count: 0 })?;
        output.copy_region_from(input, &piece)
    }
}
