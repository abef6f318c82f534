//! Running mode of a vision task

use serde::{Deserialize, Serialize};
use std::fmt;

/// Running mode that decides which dispatch calls a task accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunningMode {
    /// Single images, synchronous, engine-assigned timestamps
    #[default]
    Image,

    /// Decoded video frames, synchronous, caller-supplied timestamps
    Video,

    /// Live camera input, asynchronous, results delivered through a callback
    LiveStream,
}

impl RunningMode {
    /// Whether the engine should run with streaming semantics
    pub fn is_streaming(self) -> bool {
        self != RunningMode::Image
    }
}

impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunningMode::Image => write!(f, "IMAGE"),
            RunningMode::Video => write!(f, "VIDEO"),
            RunningMode::LiveStream => write!(f, "LIVE_STREAM"),
        }
    }
}

impl std::str::FromStr for RunningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "image" => Ok(RunningMode::Image),
            "video" => Ok(RunningMode::Video),
            "live_stream" | "live" => Ok(RunningMode::LiveStream),
            other => Err(format!("Unknown running mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_modes() {
        assert!(!RunningMode::Image.is_streaming());
        assert!(RunningMode::Video.is_streaming());
        assert!(RunningMode::LiveStream.is_streaming());
    }

    #[test]
    fn test_parse() {
        assert_eq!("live-stream".parse::<RunningMode>(), Ok(RunningMode::LiveStream));
        assert_eq!("VIDEO".parse::<RunningMode>(), Ok(RunningMode::Video));
        assert!("batch".parse::<RunningMode>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let yaml = serde_yaml::to_string(&RunningMode::LiveStream).unwrap();
        assert_eq!(yaml.trim(), "live_stream");
    }
}
