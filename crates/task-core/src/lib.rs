//! Vision Task Core - graph engine underneath vision tasks
//!
//! This crate provides the pieces a vision task is assembled from: a
//! declarative graph topology, timestamped packets, a calculator registry,
//! and a task runner that executes the graph on its own executor thread in
//! either blocking (process) or callback (send) style.

pub mod calculator;
pub mod error;
pub mod executor;
pub mod flow_limiter;
pub mod graph;
pub mod image;
pub mod packet;
pub mod rect;
pub mod registry;
pub mod running_mode;
pub mod task_runner;
pub mod timestamp;
pub mod vision_task_api;

pub use calculator::{node_options, Calculator, CalculatorContext};
pub use error::{Result, TaskError, TaskErrorCode};
pub use executor::GraphExecutor;
pub use flow_limiter::{FlowLimiter, FlowLimiterOptions};
pub use graph::{
    add_flow_limiter, GraphBuilder, GraphConfig, NodeConfig, NodeId, TaggedStream, FINISHED_TAG,
    FLOW_LIMITER_CALCULATOR,
};
pub use crate::image::{GpuBuffer, Image};
pub use packet::{Packet, PacketMap};
pub use rect::NormalizedRect;
pub use registry::{CalculatorFactory, CalculatorRegistry};
pub use running_mode::RunningMode;
pub use task_runner::{PacketsCallback, TaskRunner};
pub use timestamp::{Timestamp, MICROS_PER_MILLI, MICROS_PER_SECOND};
pub use vision_task_api::{VisionTaskApi, VisionTaskApiFactory};
