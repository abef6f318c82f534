//! Instantiated graph: validated topology, calculators in execution order,
//! and the per-tick run loop used by the task runner's executor thread

use crate::calculator::{node_options, Calculator, CalculatorContext};
use crate::error::{Result, TaskError};
use crate::flow_limiter::{FlowLimiter, FlowLimiterOptions};
use crate::graph::{GraphConfig, NodeConfig, TaggedStream, FINISHED_TAG, FLOW_LIMITER_CALCULATOR};
use crate::packet::{Packet, PacketMap};
use crate::registry::CalculatorRegistry;
use crate::timestamp::Timestamp;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

enum NodeKind {
    Calculator(Box<dyn Calculator>),
    /// Admission happens before the tick is queued; inside the tick the
    /// limiter only forwards its inputs
    FlowLimiter,
}

struct ScheduledNode {
    kind: NodeKind,
    config: NodeConfig,
}

impl ScheduledNode {
    fn name(&self) -> &str {
        match &self.kind {
            NodeKind::Calculator(calculator) => calculator.name(),
            NodeKind::FlowLimiter => FLOW_LIMITER_CALCULATOR,
        }
    }
}

/// A graph ready to run ticks
pub struct GraphExecutor {
    /// Nodes in dependency order
    nodes: Vec<ScheduledNode>,

    input_streams: Vec<TaggedStream>,

    output_streams: Vec<TaggedStream>,

    limiter: Option<Arc<FlowLimiter>>,

    /// Stream whose packet releases the limiter (its FINISHED back edge)
    finished_stream: Option<String>,
}

impl GraphExecutor {
    /// Validate `config` and instantiate every node through `registry`
    pub fn new(config: &GraphConfig, registry: &CalculatorRegistry) -> Result<Self> {
        validate_topology(config, registry)?;
        let order = execution_order(config)?;

        let mut limiter = None;
        let mut finished_stream = None;
        let mut nodes = Vec::with_capacity(order.len());

        for idx in order {
            let node = &config.nodes[idx];
            let kind = if node.calculator == FLOW_LIMITER_CALCULATOR {
                if limiter.is_some() {
                    return Err(TaskError::InvalidGraph(
                        "Only one flow limiter per graph is supported".to_string(),
                    ));
                }
                for input in node.input_streams.iter().filter(|s| !s.back_edge) {
                    if config.input_streams.iter().all(|s| s.name != input.name) {
                        return Err(TaskError::InvalidGraph(format!(
                            "Flow limiter input '{input}' must be a graph input"
                        )));
                    }
                }
                let options: FlowLimiterOptions = if node.options.is_null() {
                    FlowLimiterOptions::default()
                } else {
                    node_options(node)?
                };
                limiter = Some(Arc::new(FlowLimiter::new(options)));
                finished_stream = node.input(FINISHED_TAG).map(|s| s.name.clone());
                NodeKind::FlowLimiter
            } else {
                NodeKind::Calculator(registry.create(node)?)
            };
            nodes.push(ScheduledNode {
                kind,
                config: node.clone(),
            });
        }

        info!(
            "Graph instantiated: {} nodes, {} inputs, {} outputs{}",
            nodes.len(),
            config.input_streams.len(),
            config.output_streams.len(),
            if limiter.is_some() { ", flow limited" } else { "" }
        );

        Ok(Self {
            nodes,
            input_streams: config.input_streams.clone(),
            output_streams: config.output_streams.clone(),
            limiter,
            finished_stream,
        })
    }

    pub fn flow_limiter(&self) -> Option<Arc<FlowLimiter>> {
        self.limiter.clone()
    }

    pub fn input_streams(&self) -> &[TaggedStream] {
        &self.input_streams
    }

    /// Run one admitted tick and collect the graph outputs.
    ///
    /// Outputs not produced this tick come back as empty packets. The flow
    /// limiter slot, if any, is released before returning, whether or not the
    /// tick succeeded.
    pub fn run_tick(&mut self, inputs: &PacketMap, timestamp: Timestamp) -> Result<PacketMap> {
        let mut released = false;
        let result = self.run_nodes(inputs, timestamp, &mut released);
        if let (Some(limiter), false) = (&self.limiter, released) {
            limiter.release();
        }
        result
    }

    /// Outputs for a tick the flow limiter dropped: every stream empty
    pub fn dropped_tick(&self, timestamp: Timestamp) -> PacketMap {
        self.empty_outputs(timestamp)
    }

    fn run_nodes(
        &mut self,
        inputs: &PacketMap,
        timestamp: Timestamp,
        released: &mut bool,
    ) -> Result<PacketMap> {
        let mut streams: HashMap<String, Packet> = inputs.clone();

        for node in &mut self.nodes {
            let mut node_inputs = HashMap::with_capacity(node.config.input_streams.len());
            for input in node.config.input_streams.iter().filter(|s| !s.back_edge) {
                if let Some(packet) = streams.get(&input.name).filter(|p| !p.is_empty()) {
                    node_inputs.insert(input.tag.clone(), packet.clone());
                }
            }
            if node_inputs.is_empty() {
                debug!("Skipping '{}' at {}: no input", node.name(), timestamp);
                continue;
            }

            let outputs = match &mut node.kind {
                NodeKind::FlowLimiter => node_inputs,
                NodeKind::Calculator(calculator) => {
                    let mut cx = CalculatorContext::new(&node_inputs, timestamp);
                    calculator.process(&mut cx)?;
                    cx.into_outputs()
                }
            };

            for output in &node.config.output_streams {
                if let Some(packet) = outputs.get(&output.tag) {
                    streams.insert(output.name.clone(), packet.clone());
                }
            }

            if let (Some(limiter), Some(finished)) = (&self.limiter, &self.finished_stream) {
                let done = streams.get(finished).is_some_and(|p| !p.is_empty());
                if done && !*released {
                    limiter.release();
                    *released = true;
                }
            }
        }

        let mut outputs = self.empty_outputs(timestamp);
        for output in &self.output_streams {
            if let Some(packet) = streams.remove(&output.name) {
                outputs.insert(output.name.clone(), packet);
            }
        }
        Ok(outputs)
    }

    fn empty_outputs(&self, timestamp: Timestamp) -> PacketMap {
        let mut outputs = PacketMap::with_capacity(self.output_streams.len());
        for output in &self.output_streams {
            outputs.insert(output.name.clone(), Packet::empty().at(timestamp));
        }
        outputs
    }
}

fn validate_topology(config: &GraphConfig, registry: &CalculatorRegistry) -> Result<()> {
    let mut produced = HashSet::with_capacity(config.input_streams.len() + config.nodes.len() * 2);

    for input in &config.input_streams {
        if !produced.insert(input.name.as_str()) {
            return Err(TaskError::InvalidGraph(format!(
                "Graph input stream '{}' declared twice",
                input.name
            )));
        }
    }

    for node in &config.nodes {
        if !registry.contains(&node.calculator) {
            return Err(TaskError::InvalidGraph(format!(
                "No calculator registered for type: {}",
                node.calculator
            )));
        }
        for output in &node.output_streams {
            if !produced.insert(output.name.as_str()) {
                return Err(TaskError::InvalidGraph(format!(
                    "Stream '{}' has more than one producer",
                    output.name
                )));
            }
        }
    }

    for node in &config.nodes {
        for input in &node.input_streams {
            config.require_stream(&input.name)?;
        }
    }

    for output in &config.output_streams {
        config.require_stream(&output.name)?;
    }

    Ok(())
}

/// Topological order of nodes (Kahn's algorithm). Back edges are ignored;
/// any other cycle is an error.
fn execution_order(config: &GraphConfig) -> Result<Vec<usize>> {
    let num_nodes = config.nodes.len();

    // dependents[i] = nodes consuming an output of node i
    let mut dependents: Vec<Vec<usize>> = (0..num_nodes).map(|_| Vec::with_capacity(2)).collect();
    let mut in_degree = vec![0_usize; num_nodes];

    for (consumer, node) in config.nodes.iter().enumerate() {
        for input in node.input_streams.iter().filter(|s| !s.back_edge) {
            if let Some((producer, _)) = config.producer_of(&input.name) {
                dependents[producer].push(consumer);
                in_degree[consumer] += 1;
            }
        }
    }

    let mut queue: Vec<usize> = (0..num_nodes).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(num_nodes);

    while let Some(idx) = queue.pop() {
        order.push(idx);
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push(dependent);
            }
        }
    }

    if order.len() != num_nodes {
        return Err(TaskError::InvalidGraph(
            "Graph contains a cycle that is not marked as a back edge".to_string(),
        ));
    }

    debug!("Execution order: {:?}", order);
    Ok(order)
}
