//! Timestamped, type-erased payloads flowing through graph streams

use crate::error::TaskError;
use crate::timestamp::Timestamp;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A payload plus the timestamp it travels at.
///
/// Payloads are immutable and shared, so cloning a packet is cheap. An empty
/// packet carries only a timestamp and means "nothing on this stream for this
/// tick".
#[derive(Clone, Default)]
pub struct Packet {
    payload: Option<Arc<dyn Any + Send + Sync>>,
    type_name: &'static str,
    timestamp: Timestamp,
}

impl Packet {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            payload: Some(Arc::new(value)),
            type_name: type_name::<T>(),
            timestamp: Timestamp::unset(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Same payload at `timestamp`
    #[must_use]
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }

    /// Borrow the payload as `T`
    pub fn get<T: Any>(&self) -> Result<&T, TaskError> {
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| TaskError::EngineFailure("Packet is empty".to_string()))?;
        payload.downcast_ref::<T>().ok_or_else(|| {
            TaskError::EngineFailure(format!(
                "Packet holds {} but {} was requested",
                self.type_name,
                type_name::<T>()
            ))
        })
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("type", &if self.is_empty() { "<empty>" } else { self.type_name })
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Named bundle of packets sent into (or read out of) a graph as one unit.
/// Keys are stream names.
pub type PacketMap = HashMap<String, Packet>;
