//! Task runner: owns an instantiated graph and its executor thread
//!
//! Submissions are validated and timestamped on the caller's thread, then
//! queued to a single executor thread over a crossbeam channel, so outputs
//! come back in submission order.
//!
//! ```text
//! [caller] --process()--> Job + reply channel --> [executor] --reply--> [caller]
//! [caller] --send()-----> Job ------------------> [executor] --callback-->
//! ```

use crate::error::{Result, TaskError, TaskErrorCode};
use crate::executor::GraphExecutor;
use crate::flow_limiter::FlowLimiter;
use crate::graph::GraphConfig;
use crate::packet::{Packet, PacketMap};
use crate::registry::CalculatorRegistry;
use crate::timestamp::{Timestamp, MICROS_PER_SECOND};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Receives every tick's outputs (or failure) in live-stream use.
/// Runs on the executor thread.
pub type PacketsCallback = Arc<dyn Fn(Result<PacketMap>) + Send + Sync>;

type Reply = Sender<Result<PacketMap>>;

enum Job {
    Tick {
        inputs: PacketMap,
        timestamp: Timestamp,
        reply: Option<Reply>,
    },
    Dropped {
        timestamp: Timestamp,
        reply: Option<Reply>,
    },
}

/// Last timestamp seen per input stream
#[derive(Default)]
struct InputClock {
    last_seen: HashMap<String, Timestamp>,
}

impl InputClock {
    /// Timestamp for this batch, without recording it.
    ///
    /// Untimed batches get one second past the latest timestamp seen on any
    /// of their streams; timed batches must share one timestamp that is
    /// strictly past every stream's last.
    fn resolve(&self, inputs: &PacketMap) -> Result<Timestamp> {
        let mut stamps = inputs.values().map(Packet::timestamp);
        let first = stamps.next().unwrap_or_default();
        if stamps.any(|ts| ts != first) {
            return Err(TaskError::invalid_argument(
                TaskErrorCode::RunnerUnexpectedInputError,
                "Input packets in one batch must share a timestamp.",
            ));
        }

        if first.is_unset() {
            let latest = inputs
                .keys()
                .filter_map(|name| self.last_seen.get(name))
                .max()
                .copied();
            return Ok(match latest {
                Some(ts) => Timestamp::new(ts.value().saturating_add(MICROS_PER_SECOND)),
                None => Timestamp::new(0),
            });
        }

        for name in inputs.keys() {
            if let Some(last) = self.last_seen.get(name) {
                if first <= *last {
                    return Err(TaskError::invalid_argument(
                        TaskErrorCode::RunnerInvalidTimestampError,
                        format!(
                            "Input timestamp must be monotonically increasing. \
                             Stream '{name}' received {first} after {last}."
                        ),
                    ));
                }
            }
        }
        Ok(first)
    }

    fn commit(&mut self, names: impl Iterator<Item = String>, timestamp: Timestamp) {
        for name in names {
            self.last_seen.insert(name, timestamp);
        }
    }
}

/// Runs one graph instance.
///
/// With a packets callback the runner is in asynchronous mode and only
/// `send` is allowed; without one only the blocking `process` is.
pub struct TaskRunner {
    jobs: Option<Sender<Job>>,
    executor: Option<JoinHandle<()>>,
    has_callback: bool,
    clock: Mutex<InputClock>,
    limiter: Option<Arc<FlowLimiter>>,
    input_streams: HashSet<String>,
}

impl TaskRunner {
    /// Instantiate `config` and start its executor thread
    pub fn create(
        config: GraphConfig,
        registry: &CalculatorRegistry,
        packets_callback: Option<PacketsCallback>,
    ) -> Result<Self> {
        let graph = GraphExecutor::new(&config, registry)?;
        let limiter = graph.flow_limiter();
        let input_streams = graph
            .input_streams()
            .iter()
            .map(|s| s.name.clone())
            .collect();
        let has_callback = packets_callback.is_some();

        let (jobs, job_rx) = unbounded::<Job>();
        let executor = thread::Builder::new()
            .name("task-runner-executor".to_string())
            .spawn(move || executor_loop(graph, job_rx, packets_callback))?;

        info!("Task runner started (async: {})", has_callback);

        Ok(Self {
            jobs: Some(jobs),
            executor: Some(executor),
            has_callback,
            clock: Mutex::new(InputClock::default()),
            limiter,
            input_streams,
        })
    }

    pub fn is_running(&self) -> bool {
        self.jobs.is_some()
    }

    /// Run one batch and block until the graph produces its outputs
    pub fn process(&self, inputs: PacketMap) -> Result<PacketMap> {
        if self.has_callback {
            return Err(TaskError::failed_precondition(
                TaskErrorCode::RunnerApiCalledInWrongModeError,
                "Calling TaskRunner::process is not allowed when a result callback is provided.",
            ));
        }
        let (reply, reply_rx) = bounded(1);
        self.submit(inputs, Some(reply))?;
        reply_rx.recv().map_err(|_| {
            TaskError::EngineFailure("Graph executor stopped before producing output".to_string())
        })?
    }

    /// Queue one batch; outputs are delivered to the packets callback.
    /// Success only means the batch was accepted.
    pub fn send(&self, inputs: PacketMap) -> Result<()> {
        if !self.has_callback {
            return Err(TaskError::failed_precondition(
                TaskErrorCode::RunnerApiCalledInWrongModeError,
                "Calling TaskRunner::send is only allowed when a result callback is provided.",
            ));
        }
        self.submit(inputs, None)
    }

    /// Stop accepting input, let queued work finish and join the executor
    pub fn close(&mut self) -> Result<()> {
        let Some(jobs) = self.jobs.take() else {
            return Err(TaskError::failed_precondition(
                TaskErrorCode::RunnerNotStartedError,
                "Task runner is currently not running.",
            ));
        };
        drop(jobs);

        if let Some(executor) = self.executor.take() {
            executor.join().map_err(|_| {
                TaskError::failed_precondition(
                    TaskErrorCode::RunnerFailedToCloseError,
                    "Graph executor thread panicked",
                )
            })?;
        }
        info!("Task runner closed");
        Ok(())
    }

    fn submit(&self, mut inputs: PacketMap, reply: Option<Reply>) -> Result<()> {
        let jobs = self.jobs.as_ref().ok_or_else(|| {
            TaskError::failed_precondition(
                TaskErrorCode::RunnerNotStartedError,
                "Task runner is currently not running.",
            )
        })?;

        if inputs.is_empty() {
            return Err(TaskError::invalid_argument(
                TaskErrorCode::RunnerUnexpectedInputError,
                "No input packets provided.",
            ));
        }
        if let Some(name) = inputs.keys().find(|n| !self.input_streams.contains(*n)) {
            return Err(TaskError::invalid_argument(
                TaskErrorCode::RunnerUnexpectedInputError,
                format!("Stream '{name}' is not a graph input."),
            ));
        }

        // Held across the enqueue so channel order matches timestamp order
        let mut clock = self
            .clock
            .lock()
            .map_err(|_| TaskError::EngineFailure("Input clock lock poisoned".to_string()))?;
        let timestamp = clock.resolve(&inputs)?;
        for packet in inputs.values_mut() {
            *packet = std::mem::take(packet).at(timestamp);
        }

        let admitted = self.limiter.as_ref().map_or(true, |l| l.try_admit());
        let names: Vec<String> = inputs.keys().cloned().collect();
        let job = if admitted {
            Job::Tick {
                inputs,
                timestamp,
                reply,
            }
        } else {
            debug!("Dropping input at {}: previous tick still in flight", timestamp);
            Job::Dropped { timestamp, reply }
        };

        if jobs.send(job).is_err() {
            if admitted {
                if let Some(limiter) = &self.limiter {
                    limiter.release();
                }
            }
            return Err(TaskError::EngineFailure(
                "Graph executor is no longer running".to_string(),
            ));
        }
        clock.commit(names.into_iter(), timestamp);
        Ok(())
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.close() {
                warn!("Failed to close task runner: {}", e);
            }
        }
    }
}

fn executor_loop(
    mut graph: GraphExecutor,
    jobs: Receiver<Job>,
    packets_callback: Option<PacketsCallback>,
) {
    for job in jobs.iter() {
        let (result, reply) = match job {
            Job::Tick {
                inputs,
                timestamp,
                reply,
            } => {
                debug!("Running tick at {}", timestamp);
                (graph.run_tick(&inputs, timestamp), reply)
            }
            Job::Dropped { timestamp, reply } => (Ok(graph.dropped_tick(timestamp)), reply),
        };

        if let Some(reply) = reply {
            // Caller gone means it no longer wants the answer
            let _ = reply.send(result);
        } else if let Some(callback) = &packets_callback {
            if let Err(e) = &result {
                warn!("Tick failed: {}", e);
            }
            callback(result);
        }
    }
    debug!("Graph executor drained");
}
