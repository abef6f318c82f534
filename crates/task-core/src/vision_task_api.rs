//! Mode-aware front of a task runner, shared by vision tasks

use crate::error::{Result, TaskError, TaskErrorCode};
use crate::graph::GraphConfig;
use crate::packet::PacketMap;
use crate::registry::CalculatorRegistry;
use crate::running_mode::RunningMode;
use crate::task_runner::{PacketsCallback, TaskRunner};
use tracing::info;

/// Creates vision task APIs, checking the running mode against the callback
pub struct VisionTaskApiFactory;

impl VisionTaskApiFactory {
    /// Instantiate `graph_config` for `running_mode`.
    ///
    /// Live-stream mode requires a packets callback; image and video modes
    /// must not have one.
    pub fn create(
        graph_config: GraphConfig,
        op_resolver: &CalculatorRegistry,
        running_mode: RunningMode,
        packets_callback: Option<PacketsCallback>,
    ) -> Result<VisionTaskApi> {
        match (running_mode, packets_callback.is_some()) {
            (RunningMode::LiveStream, false) => {
                return Err(TaskError::invalid_argument(
                    TaskErrorCode::InvalidTaskGraphConfigError,
                    "The vision task is in live stream mode, a user-defined result callback \
                     must be provided.",
                ));
            }
            (RunningMode::Image | RunningMode::Video, true) => {
                return Err(TaskError::invalid_argument(
                    TaskErrorCode::InvalidTaskGraphConfigError,
                    "The vision task is in image or video mode, a user-defined result callback \
                     shouldn't be provided.",
                ));
            }
            _ => {}
        }

        let runner = TaskRunner::create(graph_config, op_resolver, packets_callback)?;
        info!("Vision task created in {} mode", running_mode);
        Ok(VisionTaskApi {
            runner,
            running_mode,
        })
    }
}

/// A task runner bound to one running mode.
///
/// Each submission entry point is legal in exactly one mode; calling another
/// fails with `RunnerApiCalledInWrongModeError` before anything is submitted.
pub struct VisionTaskApi {
    runner: TaskRunner,
    running_mode: RunningMode,
}

impl VisionTaskApi {
    pub fn running_mode(&self) -> RunningMode {
        self.running_mode
    }

    /// Blocking submission of a single image
    pub fn process_image_data(&self, inputs: PacketMap) -> Result<PacketMap> {
        self.check_mode(RunningMode::Image)?;
        self.runner.process(inputs)
    }

    /// Blocking submission of a timestamped video frame
    pub fn process_video_data(&self, inputs: PacketMap) -> Result<PacketMap> {
        self.check_mode(RunningMode::Video)?;
        self.runner.process(inputs)
    }

    /// Non-blocking submission of a live-stream frame
    pub fn send_live_stream_data(&self, inputs: PacketMap) -> Result<()> {
        self.check_mode(RunningMode::LiveStream)?;
        self.runner.send(inputs)
    }

    pub fn close(&mut self) -> Result<()> {
        self.runner.close()
    }

    fn check_mode(&self, expected: RunningMode) -> Result<()> {
        if self.running_mode == expected {
            return Ok(());
        }
        let mode = match expected {
            RunningMode::Image => "image",
            RunningMode::Video => "video",
            RunningMode::LiveStream => "live stream",
        };
        Err(TaskError::invalid_argument(
            TaskErrorCode::RunnerApiCalledInWrongModeError,
            format!(
                "Task is not initialized with the {mode} mode. Current running mode: {}",
                self.running_mode
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{Calculator, CalculatorContext};
    use crate::graph::GraphBuilder;
    use crate::packet::Packet;
    use std::sync::Arc;

    struct Identity;

    impl Calculator for Identity {
        fn name(&self) -> &str {
            "Identity"
        }

        fn process(&mut self, cx: &mut CalculatorContext<'_>) -> Result<()> {
            cx.output("OUT", cx.input("IN"));
            Ok(())
        }
    }

    fn setup() -> (GraphConfig, CalculatorRegistry) {
        let mut builder = GraphBuilder::new();
        builder.input("IN", "in");
        let node = builder.add_node("Identity", serde_json::Value::Null);
        builder
            .connect_inputs(node, &["IN"])
            .node_output(node, "OUT", "out")
            .output("OUT", "out");

        let mut registry = CalculatorRegistry::new();
        registry.register_fn("Identity", |_| Ok(Box::new(Identity)));
        (builder.build(), registry)
    }

    fn inputs() -> PacketMap {
        PacketMap::from([("in".to_string(), Packet::new(1_u8))])
    }

    #[test]
    fn test_live_stream_requires_callback() {
        let (config, registry) = setup();
        let err = VisionTaskApiFactory::create(config, &registry, RunningMode::LiveStream, None)
            .err()
            .unwrap();
        assert_eq!(err.code(), Some(TaskErrorCode::InvalidTaskGraphConfigError));
    }

    #[test]
    fn test_image_mode_rejects_callback() {
        let (config, registry) = setup();
        let callback: PacketsCallback = Arc::new(|_: Result<PacketMap>| {});
        let result =
            VisionTaskApiFactory::create(config, &registry, RunningMode::Image, Some(callback));
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_mode_calls_fail() {
        let (config, registry) = setup();
        let api = VisionTaskApiFactory::create(config, &registry, RunningMode::Image, None).unwrap();

        assert!(api.process_image_data(inputs()).is_ok());

        let err = api.process_video_data(inputs()).unwrap_err();
        assert_eq!(
            err.code(),
            Some(TaskErrorCode::RunnerApiCalledInWrongModeError)
        );
        assert!(err.to_string().contains("video mode"));
        assert!(err.to_string().contains("IMAGE"));

        let err = api.send_live_stream_data(inputs()).unwrap_err();
        assert_eq!(
            err.code(),
            Some(TaskErrorCode::RunnerApiCalledInWrongModeError)
        );
    }
}
