//! Adapts the user's result callback to the engine's packet callback

use crate::containers::ClassificationResult;
use crate::graph::{CLASSIFICATION_RESULT_STREAM_NAME, IMAGE_OUT_STREAM_NAME};
use crate::options::ResultCallback;
use std::sync::Arc;
use vision_task_core::{Image, Packet, PacketMap, PacketsCallback, TaskError, Timestamp};

/// Classification result and pass-through frame of one engine tick
pub(crate) fn decode_outputs(
    outputs: &PacketMap,
) -> Result<(ClassificationResult, Image, Timestamp), TaskError> {
    let result_packet = output_packet(outputs, CLASSIFICATION_RESULT_STREAM_NAME)?;
    let image = output_packet(outputs, IMAGE_OUT_STREAM_NAME)?
        .get::<Image>()?
        .clone();
    let result = result_packet.get::<ClassificationResult>()?.clone();
    Ok((result, image, result_packet.timestamp()))
}

fn output_packet<'a>(outputs: &'a PacketMap, stream: &str) -> Result<&'a Packet, TaskError> {
    outputs.get(stream).ok_or_else(|| {
        TaskError::EngineFailure(format!("Graph produced no '{stream}' output"))
    })
}

/// Wrap `result_callback` for the task runner.
///
/// Engine failures are reported with an empty image and the unset timestamp.
/// Ticks whose frame output is empty were dropped by the flow limiter and
/// are not reported at all.
pub fn wrap_result_callback(result_callback: ResultCallback) -> PacketsCallback {
    Arc::new(move |outputs: Result<PacketMap, TaskError>| {
        let outputs = match outputs {
            Ok(outputs) => outputs,
            Err(e) => {
                result_callback(Err(e), Image::empty(), Timestamp::unset().value());
                return;
            }
        };

        let frame_dropped = outputs
            .get(IMAGE_OUT_STREAM_NAME)
            .map_or(true, Packet::is_empty);
        if frame_dropped {
            return;
        }

        match decode_outputs(&outputs) {
            Ok((result, image, timestamp)) => {
                result_callback(Ok(result), image, timestamp.to_millis())
            }
            Err(e) => result_callback(Err(e), Image::empty(), Timestamp::unset().value()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Recorded = Arc<Mutex<Vec<(Result<ClassificationResult, TaskError>, bool, i64)>>>;

    fn recording_callback() -> (ResultCallback, Recorded) {
        let calls: Recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let callback: ResultCallback = Arc::new(
            move |result: Result<ClassificationResult, TaskError>, image: Image, ts: i64| {
                sink.lock().unwrap().push((result, image.is_empty(), ts));
            },
        );
        (callback, calls)
    }

    fn tick_outputs(timestamp: Timestamp) -> PacketMap {
        let result = ClassificationResult {
            classifications: vec![],
            timestamp_ms: Some(timestamp.to_millis()),
        };
        let frame = Image::from(image::RgbImage::new(4, 4));
        PacketMap::from([
            (
                CLASSIFICATION_RESULT_STREAM_NAME.to_string(),
                Packet::new(result).at(timestamp),
            ),
            (
                IMAGE_OUT_STREAM_NAME.to_string(),
                Packet::new(frame).at(timestamp),
            ),
        ])
    }

    #[test]
    fn test_result_delivered_with_millis() {
        let (callback, calls) = recording_callback();
        let wrapped = wrap_result_callback(callback);

        wrapped(Ok(tick_outputs(Timestamp::from_millis(250))));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (result, image_empty, ts) = &calls[0];
        assert_eq!(result.as_ref().unwrap().timestamp_ms, Some(250));
        assert!(!*image_empty);
        assert_eq!(*ts, 250);
    }

    #[test]
    fn test_error_reported_with_unset_timestamp() {
        let (callback, calls) = recording_callback();
        let wrapped = wrap_result_callback(callback);

        wrapped(Err(TaskError::EngineFailure("boom".to_string())));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (result, image_empty, ts) = &calls[0];
        assert!(result.is_err());
        assert!(*image_empty);
        assert_eq!(*ts, Timestamp::unset().value());
    }

    #[test]
    fn test_dropped_frame_not_reported() {
        let (callback, calls) = recording_callback();
        let wrapped = wrap_result_callback(callback);

        let ts = Timestamp::from_millis(10);
        wrapped(Ok(PacketMap::from([
            (
                CLASSIFICATION_RESULT_STREAM_NAME.to_string(),
                Packet::empty().at(ts),
            ),
            (IMAGE_OUT_STREAM_NAME.to_string(), Packet::empty().at(ts)),
        ])));

        assert!(calls.lock().unwrap().is_empty());
    }
}
