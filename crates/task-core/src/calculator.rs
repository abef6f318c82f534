//! Calculator trait and the per-tick context calculators run against

use crate::error::{Result, TaskError};
use crate::graph::NodeConfig;
use crate::packet::Packet;
use crate::timestamp::Timestamp;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// A graph node implementation.
///
/// The engine calls `process` once per tick in which the node has input, on
/// the graph's executor thread. A calculator that returns an error fails the
/// tick; the graph keeps running for later ticks.
pub trait Calculator: Send {
    /// Calculator type name, used in logs
    fn name(&self) -> &str;

    /// Consume this tick's inputs and emit outputs
    fn process(&mut self, cx: &mut CalculatorContext<'_>) -> Result<()>;
}

/// Inputs, outputs and timestamp of one node for one tick, keyed by tag
pub struct CalculatorContext<'a> {
    inputs: &'a HashMap<String, Packet>,
    outputs: HashMap<String, Packet>,
    timestamp: Timestamp,
}

impl<'a> CalculatorContext<'a> {
    pub fn new(inputs: &'a HashMap<String, Packet>, timestamp: Timestamp) -> Self {
        Self {
            inputs,
            outputs: HashMap::with_capacity(2),
            timestamp,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Packet on the input bound to `tag`; empty if nothing arrived
    pub fn input(&self, tag: &str) -> Packet {
        self.inputs.get(tag).cloned().unwrap_or_default()
    }

    /// Payload on the input bound to `tag`, failing if absent or mistyped
    pub fn input_value<T: std::any::Any>(&self, tag: &str) -> Result<&T> {
        self.inputs
            .get(tag)
            .ok_or_else(|| TaskError::EngineFailure(format!("No packet on input tag '{tag}'")))?
            .get::<T>()
    }

    /// Emit `packet` on the output bound to `tag`, stamped with this tick
    pub fn output(&mut self, tag: &str, packet: Packet) {
        self.outputs
            .insert(tag.to_string(), packet.at(self.timestamp));
    }

    pub fn into_outputs(self) -> HashMap<String, Packet> {
        self.outputs
    }
}

/// Decode a node's options message into the calculator's options type
pub fn node_options<T: DeserializeOwned>(node: &NodeConfig) -> Result<T> {
    serde_json::from_value(node.options.clone()).map_err(|e| {
        TaskError::InvalidGraph(format!(
            "Invalid options for node '{}': {}",
            node.calculator, e
        ))
    })
}
