//! Streaming controller
//!
//! Wraps a [`StreamingFilter`] and turns one logical update of its output
//! into a sequence of passes. Each pass narrows the inputs' requested
//! regions, re-drives the upstream pipeline for just that region, and hands
//! the resident inputs to the filter's per-pass hook.
//!
//! The controller tracks the pass being executed as a request number:
//! `0..N` while a pass runs, [`NOT_UPDATING`] (-1) at every other time,
//! including after failed and reset runs.

use std::fmt;

use uuid::Uuid;

use crate::error::{Result, StreamError};
use crate::events::{emit, EventSink, StreamEvent};
use crate::node::{NodeIo, StreamingFilter};
use crate::pipeline::{Pipeline, RunTarget};
use crate::region::Region;

/// Request number of a controller that is not executing a pass
pub const NOT_UPDATING: i64 = -1;

/// Mutable iteration state of a controller
#[derive(Debug)]
pub(crate) struct RunState {
    current_request: i64,
    reset_requested: bool,
}

impl RunState {
    fn idle() -> Self {
        Self {
            current_request: NOT_UPDATING,
            reset_requested: false,
        }
    }
}

/// What a [`StreamingFilter`] sees during one pass
pub struct PassContext<'a> {
    io: NodeIo<'a>,
    pass: u64,
    passes: u64,
    region: Region,
    state: &'a mut RunState,
}

impl<'a> PassContext<'a> {
    /// Index of this pass
    pub fn pass(&self) -> u64 {
        self.pass
    }

    /// Number of passes in the run
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Part of the output this pass produces
    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn io(&self) -> &NodeIo<'a> {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut NodeIo<'a> {
        &mut self.io
    }

    /// Current request number of the controller running this pass
    pub fn current_request_number(&self) -> i64 {
        self.state.current_request
    }

    /// Abandon the run once this hook returns
    ///
    /// The request number drops to -1 immediately. The remaining passes are
    /// skipped, the run reports [`StreamError::Reset`] and its output stays
    /// stale, so the next update starts again from pass 0.
    pub fn reset_pipeline(&mut self) {
        self.state.current_request = NOT_UPDATING;
        self.state.reset_requested = true;
    }
}

/// Drives a [`StreamingFilter`] through its passes
pub struct StreamingController {
    filter: Box<dyn StreamingFilter>,
    state: RunState,
}

impl StreamingController {
    pub fn new(filter: impl StreamingFilter) -> Self {
        Self::from_boxed(Box::new(filter))
    }

    pub fn from_boxed(filter: Box<dyn StreamingFilter>) -> Self {
        Self {
            filter,
            state: RunState::idle(),
        }
    }

    /// The pass currently executing, or -1 when no run is in progress
    pub fn current_request_number(&self) -> i64 {
        self.state.current_request
    }

    /// Whether a pass is executing
    pub fn is_streaming(&self) -> bool {
        self.state.current_request != NOT_UPDATING
    }

    /// Drop any in-flight iteration state
    pub fn reset_pipeline(&mut self) {
        self.state = RunState::idle();
    }

    pub fn filter(&self) -> &dyn StreamingFilter {
        self.filter.as_ref()
    }

    pub fn filter_mut(&mut self) -> &mut dyn StreamingFilter {
        self.filter.as_mut()
    }

    /// Run every pass for the output's requested region
    ///
    /// Whatever happens, the request number is back at -1 when this returns.
    pub(crate) fn update_output_data(
        &mut self,
        pipeline: &mut Pipeline,
        target: &RunTarget,
        events: &dyn EventSink,
    ) -> Result<()> {
        let run_id = Uuid::new_v4().to_string();
        self.state = RunState::idle();

        let result = self.run_passes(pipeline, target, &run_id, events);
        self.state.current_request = NOT_UPDATING;

        match result {
            Ok(passes) => {
                log::info!("'{}' finished {} passes", target.name, passes);
                emit(
                    events,
                    StreamEvent::RunCompleted {
                        node: target.name.clone(),
                        run_id,
                        passes,
                    },
                );
                Ok(())
            }
            Err(e) => {
                log::error!("'{}' aborted: {}", target.name, e);
                emit(
                    events,
                    StreamEvent::RunFailed {
                        node: target.name.clone(),
                        run_id,
                        pass: e.failed_pass(),
                        error: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    fn run_passes(
        &mut self,
        pipeline: &mut Pipeline,
        target: &RunTarget,
        run_id: &str,
        events: &dyn EventSink,
    ) -> Result<u64> {
        let Self { filter, state } = self;
        let name = target.name.as_str();
        let node_failed = |e: StreamError| StreamError::NodeFailed {
            node: name.to_string(),
            source: Box::new(e),
        };

        let requested = pipeline.io(target).output_requested_region()?;
        pipeline.dataset_internal_mut(target.output)?.allocate(requested.clone())?;

        filter
            .before_streamed_generate_data(&mut pipeline.io(target))
            .map_err(node_failed)?;

        let passes = filter.number_of_input_requested_regions(&pipeline.io(target));
        if passes == 0 {
            return Err(StreamError::split_policy(name, None, "pass count must be at least 1"));
        }
        if passes > i64::MAX as u64 {
            return Err(StreamError::split_policy(
                name,
                None,
                format!("pass count {} cannot be tracked", passes),
            ));
        }
        log::debug!("'{}' streaming {} in {} passes", name, requested, passes);
        emit(
            events,
            StreamEvent::RunStarted {
                node: name.to_string(),
                run_id: run_id.to_string(),
                passes,
            },
        );

        let config = pipeline.config().clone();
        let mut uncovered = vec![requested.clone()];

        for pass in 0..passes {
            state.current_request = pass as i64;
            if config.pass_events {
                emit(
                    events,
                    StreamEvent::PassStarted {
                        node: name.to_string(),
                        run_id: run_id.to_string(),
                        pass,
                        passes,
                    },
                );
            }

            let piece = filter
                .generate_nth_input_requested_region(pass, &mut pipeline.io(target))
                .map_err(|e| StreamError::split_hook(name, pass, e))?;
            if !requested.contains(&piece) {
                return Err(StreamError::split_policy(
                    name,
                    Some(pass),
                    format!("pass region {} is outside the requested region {}", piece, requested),
                ));
            }
            if config.verify_tiling {
                uncovered = uncovered.iter().flat_map(|r| r.subtract(&piece)).collect();
            }
            check_input_requests(pipeline, target, pass)?;

            for &input in &target.inputs {
                pipeline
                    .propagate_requested_region(input)
                    .and_then(|_| pipeline.update_output_data(input, events))
                    .map_err(|e| StreamError::UpstreamPropagation {
                        node: name.to_string(),
                        pass,
                        source: Box::new(e),
                    })?;
            }

            log::debug!("'{}' pass {}/{} over {}", name, pass + 1, passes, piece);
            let mut context = PassContext {
                io: pipeline.io(target),
                pass,
                passes,
                region: piece,
                state: &mut *state,
            };
            filter
                .streamed_generate_data(&mut context)
                .map_err(|e| StreamError::ComputeHook {
                    node: name.to_string(),
                    pass,
                    source: Box::new(e),
                })?;

            if state.reset_requested {
                emit(
                    events,
                    StreamEvent::PipelineReset {
                        node: name.to_string(),
                        run_id: run_id.to_string(),
                        pass,
                    },
                );
                return Err(StreamError::Reset {
                    node: name.to_string(),
                    pass,
                });
            }
            if config.pass_events {
                emit(events, StreamEvent::pass_completed(name, run_id, pass, passes));
            }
        }

        if config.verify_tiling && !uncovered.is_empty() {
            let missing: u64 = uncovered.iter().map(Region::number_of_elements).sum();
            return Err(StreamError::split_policy(
                name,
                None,
                format!("{} elements of {} were not covered by any pass", missing, requested),
            ));
        }

        filter
            .after_streamed_generate_data(&mut pipeline.io(target))
            .map_err(node_failed)?;
        Ok(passes)
    }
}

/// Every input must have been asked for something inside its extent
fn check_input_requests(pipeline: &Pipeline, target: &RunTarget, pass: u64) -> Result<()> {
    for &input in &target.inputs {
        let dataset = pipeline.dataset(input)?;
        let largest = dataset.largest_possible_region();
        match dataset.requested_region() {
            Some(requested) if largest.contains(requested) => {}
            Some(requested) => {
                return Err(StreamError::split_policy(
                    target.name.as_str(),
                    Some(pass),
                    format!(
                        "input {} was asked for {} outside its largest possible region {}",
                        input, requested, largest
                    ),
                ));
            }
            None => {
                return Err(StreamError::split_policy(
                    target.name.as_str(),
                    Some(pass),
                    format!("input {} was given no requested region", input),
                ));
            }
        }
    }
    Ok(())
}

impl fmt::Display for StreamingController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (current request number: {})",
            self.filter.type_name(),
            self.state.current_request
        )
    }
}

impl fmt::Debug for StreamingController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingController")
            .field("filter", &self.filter.type_name())
            .field("current_request_number", &self.state.current_request)
            .finish()
    }
}
