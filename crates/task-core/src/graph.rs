//! Declarative graph topology and the builder used by tasks to assemble it

use crate::error::{Result, TaskError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Calculator type name of the built-in flow limiter
pub const FLOW_LIMITER_CALCULATOR: &str = "FlowLimiterCalculator";

/// Flow limiter input tag carrying the release signal (a back edge)
pub const FINISHED_TAG: &str = "FINISHED";

/// A stream bound to a tag on a node or graph boundary, written `TAG:name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedStream {
    pub tag: String,
    pub name: String,

    /// Marks an input fed from downstream, exempt from ordering checks
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub back_edge: bool,
}

impl TaggedStream {
    pub fn new(tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
            back_edge: false,
        }
    }

    pub fn back_edge(tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            back_edge: true,
            ..Self::new(tag, name)
        }
    }
}

impl fmt::Display for TaggedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, self.name)
    }
}

/// One calculator (or subgraph) node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Registered calculator type name
    pub calculator: String,

    #[serde(default)]
    pub input_streams: Vec<TaggedStream>,

    #[serde(default)]
    pub output_streams: Vec<TaggedStream>,

    /// Node options message, decoded by the calculator factory
    #[serde(default)]
    pub options: serde_json::Value,
}

impl NodeConfig {
    pub fn input(&self, tag: &str) -> Option<&TaggedStream> {
        self.input_streams.iter().find(|s| s.tag == tag)
    }

    pub fn output(&self, tag: &str) -> Option<&TaggedStream> {
        self.output_streams.iter().find(|s| s.tag == tag)
    }
}

/// Complete graph topology: boundary streams plus nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub input_streams: Vec<TaggedStream>,

    #[serde(default)]
    pub output_streams: Vec<TaggedStream>,

    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

impl GraphConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn input_stream(&self, tag: &str) -> Option<&TaggedStream> {
        self.input_streams.iter().find(|s| s.tag == tag)
    }

    pub fn output_stream(&self, tag: &str) -> Option<&TaggedStream> {
        self.output_streams.iter().find(|s| s.tag == tag)
    }

    /// Nodes of the given calculator type
    pub fn nodes_of<'a>(&'a self, calculator: &'a str) -> impl Iterator<Item = &'a NodeConfig> {
        self.nodes.iter().filter(move |n| n.calculator == calculator)
    }
}

/// Index of a node inside a [`GraphBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// Incremental graph construction.
///
/// Tasks declare boundary streams, add nodes and wire tags to stream names;
/// `build` hands back the finished topology. Validation happens when the
/// engine instantiates the config, not here.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    config: GraphConfig,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a graph input stream
    pub fn input(&mut self, tag: &str, name: &str) -> &mut Self {
        self.config.input_streams.push(TaggedStream::new(tag, name));
        self
    }

    /// Export a stream as a graph output
    pub fn output(&mut self, tag: &str, name: &str) -> &mut Self {
        self.config.output_streams.push(TaggedStream::new(tag, name));
        self
    }

    pub fn add_node(&mut self, calculator: &str, options: serde_json::Value) -> NodeId {
        self.config.nodes.push(NodeConfig {
            calculator: calculator.to_string(),
            input_streams: Vec::with_capacity(2),
            output_streams: Vec::with_capacity(2),
            options,
        });
        NodeId(self.config.nodes.len() - 1)
    }

    pub fn node_input(&mut self, node: NodeId, tag: &str, stream: &str) -> &mut Self {
        self.config.nodes[node.0]
            .input_streams
            .push(TaggedStream::new(tag, stream));
        self
    }

    pub fn node_back_edge_input(&mut self, node: NodeId, tag: &str, stream: &str) -> &mut Self {
        self.config.nodes[node.0]
            .input_streams
            .push(TaggedStream::back_edge(tag, stream));
        self
    }

    pub fn node_output(&mut self, node: NodeId, tag: &str, stream: &str) -> &mut Self {
        self.config.nodes[node.0]
            .output_streams
            .push(TaggedStream::new(tag, stream));
        self
    }

    /// Connect the graph input declared under each of `tags` straight to the
    /// same tag on `node`
    pub fn connect_inputs(&mut self, node: NodeId, tags: &[&str]) -> &mut Self {
        for tag in tags {
            if let Some(name) = self.config.input_stream(tag).map(|s| s.name.clone()) {
                self.node_input(node, tag, &name);
            }
        }
        self
    }

    pub fn node(&self, node: NodeId) -> &NodeConfig {
        &self.config.nodes[node.0]
    }

    pub fn build(self) -> GraphConfig {
        self.config
    }
}

/// Interpose a flow limiter between the graph inputs under `tags` and
/// `node`, and close the loop with a back edge from `node`'s `finished_tag`
/// output. At most one tick is then in flight through `node`; input arriving
/// meanwhile is dropped.
pub fn add_flow_limiter(
    mut builder: GraphBuilder,
    node: NodeId,
    tags: &[&str],
    finished_tag: &str,
) -> GraphConfig {
    let limiter = builder.add_node(
        FLOW_LIMITER_CALCULATOR,
        serde_json::json!({ "max_in_flight": 1 }),
    );

    for tag in tags {
        let Some(name) = builder.config.input_stream(tag).map(|s| s.name.clone()) else {
            continue;
        };
        let throttled = format!("throttled_{name}");
        builder
            .node_input(limiter, tag, &name)
            .node_output(limiter, tag, &throttled)
            .node_input(node, tag, &throttled);
    }

    if let Some(finished) = builder.node(node).output(finished_tag).map(|s| s.name.clone()) {
        builder.node_back_edge_input(limiter, FINISHED_TAG, &finished);
    }

    builder.build()
}

impl From<&str> for TaggedStream {
    /// Parse `TAG:name`; a bare name gets an empty tag
    fn from(s: &str) -> Self {
        match s.split_once(':') {
            Some((tag, name)) => TaggedStream::new(tag, name),
            None => TaggedStream::new("", s),
        }
    }
}

impl GraphConfig {
    /// Name of the node output feeding `stream`, if any node produces it
    pub fn producer_of(&self, stream: &str) -> Option<(usize, &TaggedStream)> {
        self.nodes.iter().enumerate().find_map(|(idx, node)| {
            node.output_streams
                .iter()
                .find(|s| s.name == stream)
                .map(|s| (idx, s))
        })
    }

    /// Fails if `name` is not produced by any node or graph input
    pub fn require_stream(&self, name: &str) -> Result<()> {
        if self.input_streams.iter().any(|s| s.name == name) || self.producer_of(name).is_some() {
            Ok(())
        } else {
            Err(TaskError::InvalidGraph(format!(
                "Stream '{name}' is consumed but never produced"
            )))
        }
    }
}
