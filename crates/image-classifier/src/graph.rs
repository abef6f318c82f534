//! Topology of the image classifier graph

use crate::graph_options::ImageClassifierGraphOptions;
use vision_task_core::{add_flow_limiter, GraphBuilder, GraphConfig, NodeId, NormalizedRect};

pub const CLASSIFICATION_RESULT_STREAM_NAME: &str = "classification_result_out";
pub const CLASSIFICATION_RESULT_TAG: &str = "CLASSIFICATION_RESULT";
pub const IMAGE_IN_STREAM_NAME: &str = "image_in";
pub const IMAGE_OUT_STREAM_NAME: &str = "image_out";
pub const IMAGE_TAG: &str = "IMAGE";
pub const NORM_RECT_STREAM_NAME: &str = "norm_rect_in";
pub const NORM_RECT_TAG: &str = "NORM_RECT";

/// Calculator type of the classification subgraph
pub const SUBGRAPH_TYPE_NAME: &str = "vision.tasks.image_classifier.ImageClassifierGraph";

/// Region covering the entire image
pub fn build_full_image_norm_rect() -> NormalizedRect {
    NormalizedRect::new(0.5, 0.5, 1.0, 1.0)
}

/// The caller's region, or the full frame when none was given
pub fn normalize_region(roi: Option<NormalizedRect>) -> NormalizedRect {
    roi.unwrap_or_else(build_full_image_norm_rect)
}

/// Graph with the classifier subgraph fed by `IMAGE` and `NORM_RECT` inputs
/// and exporting `CLASSIFICATION_RESULT` and a pass-through `IMAGE`.
///
/// With flow limiting (live-stream mode) a flow limiter sits between the
/// graph inputs and the subgraph, released by the classification output.
pub fn create_graph_config(
    options: ImageClassifierGraphOptions,
    enable_flow_limiting: bool,
) -> GraphConfig {
    let (builder, subgraph) = declare_classifier(options);
    if enable_flow_limiting {
        with_flow_limiter(builder, subgraph)
    } else {
        connect_directly(builder, subgraph)
    }
}

fn declare_classifier(options: ImageClassifierGraphOptions) -> (GraphBuilder, NodeId) {
    let mut graph = GraphBuilder::new();
    graph
        .input(IMAGE_TAG, IMAGE_IN_STREAM_NAME)
        .input(NORM_RECT_TAG, NORM_RECT_STREAM_NAME);

    let subgraph = graph.add_node(SUBGRAPH_TYPE_NAME, options.to_node_options());
    graph
        .node_output(
            subgraph,
            CLASSIFICATION_RESULT_TAG,
            CLASSIFICATION_RESULT_STREAM_NAME,
        )
        .output(CLASSIFICATION_RESULT_TAG, CLASSIFICATION_RESULT_STREAM_NAME)
        .node_output(subgraph, IMAGE_TAG, IMAGE_OUT_STREAM_NAME)
        .output(IMAGE_TAG, IMAGE_OUT_STREAM_NAME);
    (graph, subgraph)
}

fn with_flow_limiter(graph: GraphBuilder, subgraph: NodeId) -> GraphConfig {
    add_flow_limiter(
        graph,
        subgraph,
        &[IMAGE_TAG, NORM_RECT_TAG],
        CLASSIFICATION_RESULT_TAG,
    )
}

fn connect_directly(mut graph: GraphBuilder, subgraph: NodeId) -> GraphConfig {
    graph.connect_inputs(subgraph, &[IMAGE_TAG, NORM_RECT_TAG]);
    graph.build()
}
