//! Demand-driven pipeline
//!
//! The [`Pipeline`] is an arena owning every node and dataset. Each node
//! owns exactly one output dataset and reads any number of input datasets;
//! datasets without a producing node are external data supplied by the
//! caller.
//!
//! Updating a dataset runs four phases over the nodes upstream of it:
//!
//! 1. **Output information**: largest possible regions and pixel types are
//!    refreshed wherever a node or anything upstream changed.
//! 2. **Requested region propagation**: the request is checked against the
//!    largest possible region and handed upstream. Streaming nodes stop the
//!    propagation; they narrow their inputs once per pass instead.
//! 3. **Output data**: a node regenerates its output only when it is stale.
//! 4. **Completion**: the output is stamped, checked to buffer what was
//!    requested, and inputs flagged for release are dropped.
//!
//! Any failed update resets every node upstream of the requested dataset.

use std::any::Any;
use std::collections::HashSet;

use crate::config::PipelineConfig;
use crate::controller::StreamingController;
use crate::dataset::Dataset;
use crate::error::{Result, StreamError};
use crate::events::EventSink;
use crate::node::{Filter, NodeIo, StreamingFilter};
use crate::pixel::PixelType;
use crate::region::Region;
use crate::types::{
    DataId, DatasetSummary, NodeHandle, NodeId, NodeRole, NodeSummary, PipelineSummary,
};

/// The behaviour behind a pipeline node
pub enum NodeKind {
    Filter(Box<dyn Filter>),
    Streaming(StreamingController),
}

impl NodeKind {
    pub fn role(&self) -> NodeRole {
        match self {
            Self::Filter(_) => NodeRole::Filter,
            Self::Streaming(_) => NodeRole::Streaming,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Filter(filter) => filter.type_name(),
            Self::Streaming(controller) => controller.filter().type_name(),
        }
    }

    fn generate_output_information(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
        match self {
            Self::Filter(filter) => filter.generate_output_information(io),
            Self::Streaming(controller) => controller.filter_mut().generate_output_information(io),
        }
    }

    fn as_any(&self) -> &dyn Any {
        match self {
            Self::Filter(filter) => {
                let filter: &dyn Filter = filter.as_ref();
                filter as &dyn Any
            }
            Self::Streaming(controller) => controller.filter() as &dyn Any,
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        match self {
            Self::Filter(filter) => {
                let filter: &mut dyn Filter = filter.as_mut();
                filter as &mut dyn Any
            }
            Self::Streaming(controller) => controller.filter_mut() as &mut dyn Any,
        }
    }
}

struct NodeSlot {
    name: String,
    inputs: Vec<DataId>,
    output: DataId,
    /// Stamp of the last change to the node's parameters or wiring
    modified: u64,
    /// Pipeline stamp the output information was last generated for
    info_stamp: u64,
    role: NodeRole,
    type_name: &'static str,
    /// `None` while the node is executing
    kind: Option<NodeKind>,
}

/// A node lifted out of the arena for execution
pub(crate) struct RunTarget {
    pub(crate) node: NodeId,
    pub(crate) name: String,
    pub(crate) inputs: Vec<DataId>,
    pub(crate) output: DataId,
}

/// Arena of nodes and datasets with the demand-driven update protocol
pub struct Pipeline {
    nodes: Vec<NodeSlot>,
    datasets: Vec<Dataset>,
    clock: u64,
    config: PipelineConfig,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            nodes: Vec::new(),
            datasets: Vec::new(),
            clock: 0,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Add caller-owned data
    pub fn add_dataset(&mut self, mut dataset: Dataset) -> DataId {
        let stamp = self.tick();
        dataset.touch(stamp);
        dataset.source = None;
        self.datasets.push(dataset);
        DataId(self.datasets.len() - 1)
    }

    /// Add a node that computes its output in one step
    pub fn add_filter(
        &mut self,
        name: impl Into<String>,
        filter: impl Filter,
        inputs: &[DataId],
    ) -> Result<NodeHandle> {
        self.add_node(name.into(), NodeKind::Filter(Box::new(filter)), inputs)
    }

    /// Add a node that computes its output in passes
    pub fn add_streaming(
        &mut self,
        name: impl Into<String>,
        filter: impl StreamingFilter,
        inputs: &[DataId],
    ) -> Result<NodeHandle> {
        self.add_node(
            name.into(),
            NodeKind::Streaming(StreamingController::new(filter)),
            inputs,
        )
    }

    pub fn add_node(&mut self, name: String, kind: NodeKind, inputs: &[DataId]) -> Result<NodeHandle> {
        for &input in inputs {
            self.dataset(input)?;
        }
        let node = NodeId(self.nodes.len());
        let (pixel_type, largest) = match inputs.first() {
            Some(&first) => {
                let first = &self.datasets[first.0];
                (first.pixel_type(), first.largest_possible_region().clone())
            }
            None => (PixelType::F64, Region::empty(0)),
        };

        let mut output = Dataset::new(pixel_type, largest);
        output.source = Some(node);
        output.set_release_data_flag(self.config.release_data_by_default);
        self.datasets.push(output);
        let output = DataId(self.datasets.len() - 1);

        log::debug!("Added {} '{}' ({}) producing {}", node, name, kind.type_name(), output);
        let modified = self.tick();
        self.nodes.push(NodeSlot {
            name,
            inputs: inputs.to_vec(),
            output,
            modified,
            info_stamp: 0,
            role: kind.role(),
            type_name: kind.type_name(),
            kind: Some(kind),
        });
        Ok(NodeHandle { node, output })
    }

    /// Rewire input `index` of `node` to read `data`
    pub fn connect(&mut self, node: NodeId, index: usize, data: DataId) -> Result<()> {
        self.dataset(data)?;
        let slot = self.slot(node)?;
        if index >= slot.inputs.len() {
            return Err(StreamError::MissingInput {
                index,
                count: slot.inputs.len(),
            });
        }
        if self.depends_on(data, node) {
            return Err(StreamError::CycleDetected {
                node: slot.name.clone(),
                data,
            });
        }
        let stamp = self.tick();
        let slot = &mut self.nodes[node.0];
        slot.inputs[index] = data;
        slot.modified = stamp;
        Ok(())
    }

    /// Whether `node` is `data`'s producer or anywhere upstream of it
    fn depends_on(&self, data: DataId, node: NodeId) -> bool {
        let mut stack = vec![data];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(source) = self.datasets.get(id.0).and_then(|d| d.source) else {
                continue;
            };
            if source == node {
                return true;
            }
            stack.extend(self.nodes[source.0].inputs.iter().copied());
        }
        false
    }

    fn slot(&self, node: NodeId) -> Result<&NodeSlot> {
        self.nodes.get(node.0).ok_or(StreamError::UnknownNode(node))
    }

    pub fn dataset(&self, data: DataId) -> Result<&Dataset> {
        self.datasets.get(data.0).ok_or(StreamError::UnknownData(data))
    }

    /// Edit external data; bumps its generation so consumers go stale
    ///
    /// Data produced by a node can only be changed through the node.
    pub fn dataset_mut(&mut self, data: DataId) -> Result<&mut Dataset> {
        if let Some(source) = self.dataset(data)?.source {
            return Err(StreamError::failed(format!(
                "{} is produced by '{}' and cannot be edited directly",
                data, self.nodes[source.0].name
            )));
        }
        let stamp = self.tick();
        let dataset = &mut self.datasets[data.0];
        dataset.touch(stamp);
        Ok(dataset)
    }

    pub(crate) fn dataset_internal_mut(&mut self, data: DataId) -> Result<&mut Dataset> {
        self.datasets.get_mut(data.0).ok_or(StreamError::UnknownData(data))
    }

    /// Ask for part of a dataset; checked against its extent on the next update
    pub fn set_requested_region(&mut self, data: DataId, region: Region) -> Result<()> {
        self.dataset_internal_mut(data)?.set_requested_region(region);
        Ok(())
    }

    pub fn set_release_data_flag(&mut self, data: DataId, release: bool) -> Result<()> {
        self.dataset_internal_mut(data)?.set_release_data_flag(release);
        Ok(())
    }

    /// Mark a node's parameters as changed
    pub fn modified(&mut self, node: NodeId) -> Result<()> {
        self.slot(node)?;
        let stamp = self.tick();
        self.nodes[node.0].modified = stamp;
        Ok(())
    }

    /// The filter behind `node`, if it is a `T`
    pub fn filter<T: Any>(&self, node: NodeId) -> Option<&T> {
        self.nodes.get(node.0)?.kind.as_ref()?.as_any().downcast_ref()
    }

    /// Mutable access to the filter behind `node`, if it is a `T`
    ///
    /// A successful lookup marks the node modified; a mismatched type leaves
    /// it untouched.
    pub fn filter_mut<T: Any>(&mut self, node: NodeId) -> Option<&mut T> {
        let matches = self.filter::<T>(node).is_some();
        if !matches {
            return None;
        }
        let stamp = self.tick();
        let slot = self.nodes.get_mut(node.0)?;
        slot.modified = stamp;
        slot.kind.as_mut()?.as_any_mut().downcast_mut()
    }

    pub fn controller(&self, node: NodeId) -> Option<&StreamingController> {
        match self.nodes.get(node.0)?.kind.as_ref()? {
            NodeKind::Streaming(controller) => Some(controller),
            NodeKind::Filter(_) => None,
        }
    }

    /// Current pass of a streaming node, `None` for anything else
    ///
    /// An update holds the pipeline exclusively, so from outside this is
    /// always -1 for a streaming node. Hooks read the live value through
    /// [`PassContext::current_request_number`](crate::controller::PassContext::current_request_number).
    pub fn current_request_number(&self, node: NodeId) -> Option<i64> {
        self.controller(node).map(StreamingController::current_request_number)
    }

    /// Bring `data` up to date for its requested region
    ///
    /// A dataset without a requested region is updated over its largest
    /// possible region.
    pub fn update(&mut self, data: DataId, events: &dyn EventSink) -> Result<()> {
        self.run_update(data, events, false)
    }

    /// Bring all of `data` up to date
    pub fn update_largest_possible_region(&mut self, data: DataId, events: &dyn EventSink) -> Result<()> {
        self.run_update(data, events, true)
    }

    fn run_update(&mut self, data: DataId, events: &dyn EventSink, largest: bool) -> Result<()> {
        self.dataset(data)?;
        let result = self
            .update_output_information(data)
            .and_then(|_| {
                if largest {
                    self.datasets[data.0].set_requested_region_to_largest_possible_region();
                }
                self.propagate_requested_region(data)
            })
            .and_then(|_| self.update_output_data(data, events));

        if let Err(e) = &result {
            log::warn!("Update of {} failed, resetting upstream nodes: {}", data, e);
            self.reset_upstream(data);
        }
        result
    }

    /// Reset every node upstream of `data`
    ///
    /// Streaming nodes drop their iteration state and produced outputs are
    /// marked stale, so the next update regenerates them.
    pub fn reset_pipeline(&mut self, data: DataId) -> Result<()> {
        self.dataset(data)?;
        self.reset_upstream(data);
        Ok(())
    }

    fn reset_upstream(&mut self, data: DataId) {
        let mut stack = vec![data];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(dataset) = self.datasets.get_mut(id.0) else {
                continue;
            };
            let Some(node) = dataset.source else {
                continue;
            };
            dataset.update_stamp = 0;
            let slot = &mut self.nodes[node.0];
            if let Some(NodeKind::Streaming(controller)) = slot.kind.as_mut() {
                controller.reset_pipeline();
            }
            stack.extend(slot.inputs.iter().copied());
        }
    }

    fn run_target(&self, node: NodeId) -> Result<RunTarget> {
        let slot = self.slot(node)?;
        Ok(RunTarget {
            node,
            name: slot.name.clone(),
            inputs: slot.inputs.clone(),
            output: slot.output,
        })
    }

    fn take_kind(&mut self, node: NodeId) -> Result<NodeKind> {
        self.nodes
            .get_mut(node.0)
            .ok_or(StreamError::UnknownNode(node))?
            .kind
            .take()
            .ok_or(StreamError::NodeBusy(node))
    }

    pub(crate) fn io<'a>(&'a mut self, target: &'a RunTarget) -> NodeIo<'a> {
        NodeIo::new(&mut self.datasets, &target.inputs, target.output)
    }

    /// Phase 1: refresh extents and pipeline stamps upstream of `data`
    pub(crate) fn update_output_information(&mut self, data: DataId) -> Result<()> {
        let source = self.dataset(data)?.source;
        let Some(node) = source else {
            let dataset = &mut self.datasets[data.0];
            dataset.pipeline_stamp = dataset.generation();
            return Ok(());
        };

        let target = self.run_target(node)?;
        let mut stamp = self.nodes[node.0].modified;
        for &input in &target.inputs {
            self.update_output_information(input)?;
            stamp = stamp.max(self.datasets[input.0].pipeline_stamp);
        }

        if stamp > self.nodes[node.0].info_stamp {
            let mut kind = self.take_kind(node)?;
            let result = kind.generate_output_information(&mut self.io(&target));
            self.nodes[node.0].kind = Some(kind);
            result.map_err(|e| node_failed(&target.name, e))?;
            self.nodes[node.0].info_stamp = stamp;
            log::trace!("Refreshed output information of '{}'", target.name);
        }
        self.datasets[data.0].pipeline_stamp = stamp;
        Ok(())
    }

    /// Phase 2: check the request and hand it upstream
    pub(crate) fn propagate_requested_region(&mut self, data: DataId) -> Result<()> {
        let dataset = self.dataset_internal_mut(data)?;
        if dataset.requested_region().is_none() {
            dataset.set_requested_region_to_largest_possible_region();
        }
        check_request(data, dataset)?;
        let Some(node) = dataset.source else {
            return Ok(());
        };
        if !dataset.is_stale() {
            return Ok(());
        }

        let target = self.run_target(node)?;
        let mut kind = self.take_kind(node)?;
        let result = match &mut kind {
            NodeKind::Filter(filter) => {
                let mut io = self.io(&target);
                filter
                    .enlarge_output_requested_region(&mut io)
                    .and_then(|_| filter.generate_input_requested_region(&mut io))
                    .map(|_| true)
            }
            NodeKind::Streaming(_) => Ok(false),
        };
        self.nodes[node.0].kind = Some(kind);

        if result.map_err(|e| node_failed(&target.name, e))? {
            check_request(data, &self.datasets[data.0])?;
            for &input in &target.inputs {
                self.propagate_requested_region(input)?;
            }
        }
        Ok(())
    }

    /// Phase 3: regenerate `data` if it is stale
    pub(crate) fn update_output_data(&mut self, data: DataId, events: &dyn EventSink) -> Result<()> {
        let dataset = self.dataset(data)?;
        let Some(node) = dataset.source else {
            return check_buffered(&data.to_string(), dataset);
        };
        if !dataset.is_stale() {
            log::trace!("{} is up to date", data);
            return Ok(());
        }

        let target = self.run_target(node)?;
        let mut kind = self.take_kind(node)?;
        let result = match &mut kind {
            NodeKind::Filter(filter) => self.generate_filter_data(filter.as_mut(), &target, events),
            NodeKind::Streaming(controller) => controller.update_output_data(self, &target, events),
        };
        self.nodes[target.node.0].kind = Some(kind);
        result?;
        self.complete(&target)
    }

    fn generate_filter_data(
        &mut self,
        filter: &mut dyn Filter,
        target: &RunTarget,
        events: &dyn EventSink,
    ) -> Result<()> {
        for &input in &target.inputs {
            self.update_output_data(input, events)?;
        }
        let requested = self.io(target).output_requested_region()?;
        log::debug!("Generating '{}' over {}", target.name, requested);
        self.datasets[target.output.0].allocate(requested)?;
        filter
            .generate_data(&mut self.io(target))
            .map_err(|e| node_failed(&target.name, e))
    }

    /// Phase 4: stamp the output and release consumed inputs
    fn complete(&mut self, target: &RunTarget) -> Result<()> {
        check_buffered(&target.name, &self.datasets[target.output.0])?;
        let stamp = self.tick();
        self.datasets[target.output.0].mark_generated(stamp);

        for &input in &target.inputs {
            let input = &mut self.datasets[input.0];
            if input.source.is_some() && input.release_data_flag() {
                log::trace!("Releasing input of '{}'", target.name);
                input.release_data();
            }
        }
        Ok(())
    }

    /// Serializable snapshot of every node and dataset
    pub fn summary(&self) -> PipelineSummary {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, slot)| NodeSummary {
                id: NodeId(index),
                name: slot.name.clone(),
                type_name: slot.type_name.to_string(),
                role: slot.role,
                inputs: slot.inputs.clone(),
                output: slot.output,
                current_request_number: match &slot.kind {
                    Some(NodeKind::Streaming(controller)) => Some(controller.current_request_number()),
                    _ => None,
                },
            })
            .collect();

        let datasets = self
            .datasets
            .iter()
            .enumerate()
            .map(|(index, dataset)| DatasetSummary {
                id: DataId(index),
                source: dataset.source,
                pixel_type: dataset.pixel_type(),
                largest_possible_region: dataset.largest_possible_region().clone(),
                buffered_region: dataset.buffered_region().clone(),
                requested_region: dataset.requested_region().cloned(),
                generation: dataset.generation(),
                release_data: dataset.release_data_flag(),
            })
            .collect();

        PipelineSummary { nodes, datasets }
    }
}

fn node_failed(node: &str, source: StreamError) -> StreamError {
    StreamError::NodeFailed {
        node: node.to_string(),
        source: Box::new(source),
    }
}

fn check_request(data: DataId, dataset: &Dataset) -> Result<()> {
    match dataset.requested_region() {
        Some(requested) if !dataset.largest_possible_region().contains(requested) => {
            Err(StreamError::RegionOutOfBounds {
                data,
                requested: requested.clone(),
                largest: dataset.largest_possible_region().clone(),
            })
        }
        _ => Ok(()),
    }
}

fn check_buffered(node: &str, dataset: &Dataset) -> Result<()> {
    match dataset.requested_region() {
        Some(requested) if dataset.requested_region_is_outside_of_buffered_region() => {
            Err(StreamError::BufferUnderrun {
                node: node.to_string(),
                requested: requested.clone(),
                buffered: dataset.buffered_region().clone(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventSink;
    use crate::testing::{ramp, Doubler, PassLog, SlabDoubler};

    fn chain() -> (Pipeline, DataId, Doubler, NodeHandle, NodeHandle) {
        let mut pipeline = Pipeline::new();
        let input = pipeline.add_dataset(ramp(8, 6));
        let first = Doubler::default();
        let a = pipeline.add_filter("a", first.clone(), &[input]).unwrap();
        let b = pipeline.add_filter("b", Doubler::default(), &[a.output]).unwrap();
        (pipeline, input, first, a, b)
    }

    /// Writes less than it was asked for
    struct Shrinker;

    impl Filter for Shrinker {
        fn generate_data(&mut self, io: &mut NodeIo<'_>) -> Result<()> {
            io.output_mut().allocate(Region::new(vec![0, 0], vec![1, 1])?)
        }
    }

    #[test]
    fn test_update_runs_chain_once() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (mut pipeline, _, first, a, b) = chain();

        pipeline.update(b.output, &NullEventSink).unwrap();
        let output = pipeline.dataset(b.output).unwrap();
        assert_eq!(output.get(&[7, 5]), Some(4.0 * 47.0));
        assert_eq!(output.buffered_region(), &Region::from_size(vec![8, 6]));
        assert_eq!(first.calls(), 1);

        pipeline.update(b.output, &NullEventSink).unwrap();
        assert_eq!(first.calls(), 1);
        assert!(pipeline.dataset(a.output).unwrap().generation() > 0);
    }

    #[test]
    fn test_external_change_invalidates_downstream() {
        let (mut pipeline, input, first, _, b) = chain();
        pipeline.update(b.output, &NullEventSink).unwrap();

        pipeline.dataset_mut(input).unwrap().set(&[0, 0], 1.5).unwrap();
        pipeline.update(b.output, &NullEventSink).unwrap();
        assert_eq!(first.calls(), 2);
        assert_eq!(pipeline.dataset(b.output).unwrap().get(&[0, 0]), Some(6.0));
    }

    #[test]
    fn test_modified_node_reruns() {
        let (mut pipeline, _, first, a, b) = chain();
        pipeline.update(b.output, &NullEventSink).unwrap();

        pipeline.modified(a.node).unwrap();
        pipeline.update(b.output, &NullEventSink).unwrap();
        assert_eq!(first.calls(), 2);

        assert!(pipeline.filter_mut::<Doubler>(a.node).is_some());
        pipeline.update(b.output, &NullEventSink).unwrap();
        assert_eq!(first.calls(), 3);
        assert!(pipeline.filter::<SlabDoubler>(a.node).is_none());
    }

    #[test]
    fn test_mismatched_filter_mut_leaves_node_clean() {
        let log = PassLog::default();
        let mut pipeline = Pipeline::new();
        let input = pipeline.add_dataset(ramp(10, 10));
        let streamed = pipeline
            .add_streaming("slabs", SlabDoubler::new(5, log.clone()), &[input])
            .unwrap();
        pipeline.update(streamed.output, &NullEventSink).unwrap();
        assert_eq!(log.hook_calls(), 5);

        log.clear();
        assert!(pipeline.filter_mut::<Doubler>(streamed.node).is_none());
        assert!(pipeline.filter_mut::<Doubler>(NodeId(9)).is_none());
        pipeline.update(streamed.output, &NullEventSink).unwrap();
        assert_eq!(log.hook_calls(), 0);

        assert!(pipeline.filter_mut::<SlabDoubler>(streamed.node).is_some());
        pipeline.update(streamed.output, &NullEventSink).unwrap();
        assert_eq!(log.hook_calls(), 5);
    }

    #[test]
    fn test_sub_region_request_only_computes_window() {
        let (mut pipeline, _, _, a, b) = chain();
        let window = Region::new(vec![2, 1], vec![3, 2]).unwrap();
        pipeline.set_requested_region(b.output, window.clone()).unwrap();

        pipeline.update(b.output, &NullEventSink).unwrap();
        assert_eq!(pipeline.dataset(a.output).unwrap().buffered_region(), &window);

        // A larger request is no longer satisfied by the buffer
        pipeline.update_largest_possible_region(b.output, &NullEventSink).unwrap();
        assert_eq!(
            pipeline.dataset(b.output).unwrap().buffered_region(),
            &Region::from_size(vec![8, 6])
        );
    }

    #[test]
    fn test_request_outside_extent_fails() {
        let (mut pipeline, _, first, _, b) = chain();
        let outside = Region::new(vec![4, 4], vec![8, 8]).unwrap();
        pipeline.set_requested_region(b.output, outside).unwrap();

        let err = pipeline.update(b.output, &NullEventSink).unwrap_err();
        assert!(matches!(err, StreamError::RegionOutOfBounds { data, .. } if data == b.output));
        assert_eq!(first.calls(), 0);
    }

    #[test]
    fn test_connect_rejects_cycles() {
        let (mut pipeline, input, _, a, b) = chain();

        let err = pipeline.connect(a.node, 0, b.output).unwrap_err();
        assert!(matches!(err, StreamError::CycleDetected { .. }));
        let err = pipeline.connect(a.node, 0, a.output).unwrap_err();
        assert!(matches!(err, StreamError::CycleDetected { .. }));
        assert!(matches!(
            pipeline.connect(a.node, 1, input),
            Err(StreamError::MissingInput { index: 1, count: 1 })
        ));

        let other = pipeline.add_dataset(ramp(8, 6));
        pipeline.connect(a.node, 0, other).unwrap();
        assert_eq!(pipeline.summary().nodes[a.node.index()].inputs, vec![other]);
    }

    #[test]
    fn test_release_data_after_consumption() {
        let (mut pipeline, _, first, a, b) = chain();
        pipeline.set_release_data_flag(a.output, true).unwrap();

        pipeline.update(b.output, &NullEventSink).unwrap();
        assert!(pipeline.dataset(a.output).unwrap().buffered_region().is_empty());
        assert_eq!(pipeline.dataset(b.output).unwrap().get(&[1, 0]), Some(4.0));

        // Released data is regenerated on demand
        pipeline.update(a.output, &NullEventSink).unwrap();
        assert_eq!(first.calls(), 2);
    }

    #[test]
    fn test_produced_data_is_read_only() {
        let (mut pipeline, input, _, a, _) = chain();
        assert!(pipeline.dataset_mut(a.output).is_err());
        let before = pipeline.dataset(input).unwrap().generation();
        pipeline.dataset_mut(input).unwrap();
        assert!(pipeline.dataset(input).unwrap().generation() > before);
    }

    #[test]
    fn test_buffer_underrun_is_reported() {
        let mut pipeline = Pipeline::new();
        let input = pipeline.add_dataset(ramp(4, 4));
        let shrink = pipeline.add_filter("shrink", Shrinker, &[input]).unwrap();

        let err = pipeline.update(shrink.output, &NullEventSink).unwrap_err();
        assert!(matches!(err, StreamError::BufferUnderrun { ref node, .. } if node == "shrink"));

        let empty = pipeline.add_dataset(Dataset::new(PixelType::U8, Region::from_size(vec![4, 4])));
        let b = pipeline.add_filter("b", Doubler::default(), &[empty]).unwrap();
        let err = pipeline.update(b.output, &NullEventSink).unwrap_err();
        assert!(matches!(err, StreamError::BufferUnderrun { .. }));
    }

    #[test]
    fn test_failed_update_resets_streaming_nodes() {
        let log = PassLog::default();
        let mut pipeline = Pipeline::new();
        let input = pipeline.add_dataset(ramp(10, 10));
        let streamed = pipeline
            .add_streaming("slabs", SlabDoubler::new(5, log.clone()), &[input])
            .unwrap();
        let shrink = pipeline.add_filter("shrink", Shrinker, &[streamed.output]).unwrap();

        assert!(pipeline.update(shrink.output, &NullEventSink).is_err());
        assert_eq!(log.hook_calls(), 5);
        assert_eq!(pipeline.current_request_number(streamed.node), Some(-1));

        // The streamed output was invalidated by the reset
        log.clear();
        pipeline.update(streamed.output, &NullEventSink).unwrap();
        assert_eq!(log.hook_calls(), 5);
    }

    #[test]
    fn test_summary_serializes() {
        let log = PassLog::default();
        let (mut pipeline, _, _, _, b) = chain();
        let streamed = pipeline
            .add_streaming("slabs", SlabDoubler::new(2, log), &[b.output])
            .unwrap();
        pipeline.update(streamed.output, &NullEventSink).unwrap();

        let summary = pipeline.summary();
        assert_eq!(summary.nodes.len(), 3);
        assert_eq!(summary.nodes[2].role, NodeRole::Streaming);
        assert_eq!(summary.nodes[2].current_request_number, Some(-1));
        assert_eq!(summary.nodes[0].current_request_number, None);
        assert!(summary.nodes[0].type_name.ends_with("Doubler"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["nodes"][2]["name"], "slabs");
        assert_eq!(json["datasets"][0]["pixelType"], serde_json::json!("f32"));
    }

    #[test]
    fn test_unknown_handles() {
        let mut pipeline = Pipeline::new();
        assert!(matches!(
            pipeline.update(DataId(3), &NullEventSink),
            Err(StreamError::UnknownData(_))
        ));
        assert!(matches!(pipeline.modified(NodeId(0)), Err(StreamError::UnknownNode(_))));
        assert!(pipeline
            .add_filter("dangling", Doubler::default(), &[DataId(0)])
            .is_err());
    }
}
