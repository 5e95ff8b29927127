//! Test doubles shared by the engine's unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::controller::PassContext;
use crate::dataset::Dataset;
use crate::error::{Result, StreamError};
use crate::node::{Filter, NodeIo, StreamingFilter};
use crate::pixel::PixelType;
use crate::region::Region;
use crate::split::SplitStrategy;

/// `width x height` image whose pixel at (x, y) is `y * width + x`
pub(crate) fn ramp(width: u64, height: u64) -> Dataset {
    let row = width as i64;
    Dataset::from_fn(PixelType::F32, Region::from_size(vec![width, height]), move |index| {
        (index[1] * row + index[0]) as f64
    })
}

fn double_into(input: &Dataset, output: &mut Dataset, region: &Region) -> Result<()> {
    for index in region.indices() {
        let value = input
            .get(&index)
            .ok_or_else(|| StreamError::failed(format!("{:?} is not buffered upstream", index)))?;
        output.set(&index, value * 2.0)?;
    }
    Ok(())
}

/// Doubles its first input in one step, counting calls
#[derive(Default, Clone)]
pub(crate) struct Doubler {
    calls: Arc<AtomicUsize>,
}

impl Doubler {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Filter for Doubler {
    fn generate_data(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let region = io.output_requested_region()?;
        let (inputs, output) = io.split()?;
        let input = inputs
            .first()
            .copied()
            .ok_or(StreamError::MissingInput { index: 0, count: 0 })?;
        double_into(input, output, &region)
    }
}

#[derive(Default)]
struct PassRecord {
    passes: Vec<u64>,
    requests: Vec<i64>,
    regions: Vec<Region>,
    before_calls: usize,
    after_calls: usize,
    before_buffered: Option<Region>,
    request_after_reset: Option<i64>,
}

/// What a [`SlabDoubler`] saw, shared with the test body
#[derive(Default, Clone)]
pub(crate) struct PassLog {
    inner: Arc<Mutex<PassRecord>>,
}

impl PassLog {
    fn record(&self, f: impl FnOnce(&mut PassRecord)) {
        if let Ok(mut record) = self.inner.lock() {
            f(&mut record);
        }
    }

    fn read<T>(&self, f: impl FnOnce(&PassRecord) -> T) -> T {
        let record = self.inner.lock().unwrap();
        f(&record)
    }

    pub(crate) fn clear(&self) {
        self.record(|record| *record = PassRecord::default());
    }

    pub(crate) fn passes(&self) -> Vec<u64> {
        self.read(|r| r.passes.clone())
    }

    pub(crate) fn requests(&self) -> Vec<i64> {
        self.read(|r| r.requests.clone())
    }

    pub(crate) fn regions(&self) -> Vec<Region> {
        self.read(|r| r.regions.clone())
    }

    pub(crate) fn hook_calls(&self) -> usize {
        self.read(|r| r.passes.len())
    }

    pub(crate) fn before_calls(&self) -> usize {
        self.read(|r| r.before_calls)
    }

    pub(crate) fn after_calls(&self) -> usize {
        self.read(|r| r.after_calls)
    }

    pub(crate) fn before_buffered(&self) -> Option<Region> {
        self.read(|r| r.before_buffered.clone())
    }

    pub(crate) fn request_after_reset(&self) -> Option<i64> {
        self.read(|r| r.request_after_reset)
    }
}

/// Streams its first input in slabs (or tiles) and doubles each piece
///
/// The builder methods inject the faults the controller has to survive.
pub(crate) struct SlabDoubler {
    divisions: u64,
    strategy: SplitStrategy,
    log: PassLog,
    fail_at: Option<u64>,
    overreach_at: Option<u64>,
    skip: Option<u64>,
    reset_at: Option<u64>,
    cancel: Option<(Arc<AtomicBool>, u64)>,
}

impl SlabDoubler {
    pub(crate) fn new(divisions: u64, log: PassLog) -> Self {
        Self {
            divisions,
            strategy: SplitStrategy::Slab,
            log,
            fail_at: None,
            overreach_at: None,
            skip: None,
            reset_at: None,
            cancel: None,
        }
    }

    pub(crate) fn with_strategy(mut self, strategy: SplitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// The compute hook fails at `pass`
    pub(crate) fn failing_at(mut self, pass: u64) -> Self {
        self.fail_at = Some(pass);
        self
    }

    /// The input is asked for twice its width at `pass`
    pub(crate) fn overreaching_at(mut self, pass: u64) -> Self {
        self.overreach_at = Some(pass);
        self
    }

    /// `pass` repeats the previous piece, leaving a hole
    pub(crate) fn skipping(mut self, pass: u64) -> Self {
        self.skip = Some(pass);
        self
    }

    /// The compute hook resets the pipeline at `pass`
    pub(crate) fn resetting_at(mut self, pass: u64) -> Self {
        self.reset_at = Some(pass);
        self
    }

    pub(crate) fn stop_resetting(&mut self) {
        self.reset_at = None;
    }

    /// `flag` is raised at `pass`; every hook checks it before working
    pub(crate) fn cancelled_by(mut self, flag: Arc<AtomicBool>, pass: u64) -> Self {
        self.cancel = Some((flag, pass));
        self
    }
}

impl StreamingFilter for SlabDoubler {
    fn number_of_input_requested_regions(&self, io: &NodeIo<'_>) -> u64 {
        if self.divisions == 0 {
            return 0;
        }
        match io.output().requested_region() {
            Some(region) => self.strategy.number_of_splits(region, self.divisions),
            None => 1,
        }
    }

    fn generate_nth_input_requested_region(&mut self, pass: u64, io: &mut NodeIo<'_>) -> Result<Region> {
        if let Some((flag, _)) = &self.cancel {
            if flag.load(Ordering::SeqCst) {
                return Err(StreamError::Cancelled);
            }
        }
        let requested = io.output_requested_region()?;
        let piece_index = match self.skip {
            Some(skip) if skip == pass && pass > 0 => pass - 1,
            _ => pass,
        };
        let piece = self
            .strategy
            .split(&requested, piece_index, self.divisions)
            .ok_or_else(|| StreamError::failed(format!("no piece {} of {}", piece_index, requested)))?;

        let input_request = if self.overreach_at == Some(pass) {
            let mut size = piece.size().to_vec();
            size[0] *= 2;
            Region::new(piece.index().to_vec(), size)?
        } else {
            piece.clone()
        };
        io.set_input_requested_region(0, input_request)?;
        Ok(piece)
    }

    fn streamed_generate_data(&mut self, pass: &mut PassContext<'_>) -> Result<()> {
        let (index, request, region) = (pass.pass(), pass.current_request_number(), pass.region().clone());
        self.log.record(|r| {
            r.passes.push(index);
            r.requests.push(request);
            r.regions.push(region.clone());
        });

        if let Some((flag, at)) = &self.cancel {
            if index == *at {
                flag.store(true, Ordering::SeqCst);
            }
            if flag.load(Ordering::SeqCst) {
                return Err(StreamError::Cancelled);
            }
        }
        if self.fail_at == Some(index) {
            return Err(StreamError::failed("injected failure"));
        }

        let (inputs, output) = pass.io_mut().split()?;
        let input = inputs
            .first()
            .copied()
            .ok_or(StreamError::MissingInput { index: 0, count: 0 })?;
        double_into(input, output, &region)?;

        if self.reset_at == Some(index) {
            pass.reset_pipeline();
            let after = pass.current_request_number();
            self.log.record(|r| r.request_after_reset = Some(after));
        }
        Ok(())
    }

    fn before_streamed_generate_data(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        let buffered = io.output().buffered_region().clone();
        self.log.record(|r| {
            r.before_calls += 1;
            r.before_buffered = Some(buffered);
        });
        Ok(())
    }

    fn after_streamed_generate_data(&mut self, _io: &mut NodeIo<'_>) -> Result<()> {
        self.log.record(|r| r.after_calls += 1);
        Ok(())
    }
}
