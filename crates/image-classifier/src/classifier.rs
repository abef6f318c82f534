//! The image classifier task
//!
//! Three ways to feed it, fixed at creation by the running mode:
//! - image: [`ImageClassifier::classify`] blocks on one independent image
//! - video: [`ImageClassifier::classify_for_video`] blocks on timestamped frames
//! - live stream: [`ImageClassifier::classify_async`] returns immediately and
//!   results arrive on the result callback; frames submitted while an earlier
//!   one is still being classified are dropped

use crate::callback::{decode_outputs, wrap_result_callback};
use crate::containers::ClassificationResult;
use crate::graph::{
    create_graph_config, normalize_region, IMAGE_IN_STREAM_NAME, NORM_RECT_STREAM_NAME,
};
use crate::graph_options::convert_options_to_graph_options;
use crate::options::ImageClassifierOptions;
use tracing::{info, warn};
use vision_task_core::{
    Image, NormalizedRect, Packet, PacketMap, RunningMode, TaskError, TaskErrorCode, Timestamp,
    VisionTaskApi, VisionTaskApiFactory,
};

pub struct ImageClassifier {
    api: VisionTaskApi,
}

impl ImageClassifier {
    /// Validate `options`, build the graph and start it
    pub fn create(options: ImageClassifierOptions) -> Result<Self, TaskError> {
        options.classifier_options.validate()?;

        let running_mode = options.running_mode;
        let graph_options = convert_options_to_graph_options(&options);
        let graph_config =
            create_graph_config(graph_options, running_mode == RunningMode::LiveStream);
        let packets_callback = options.result_callback.map(wrap_result_callback);

        let api = VisionTaskApiFactory::create(
            graph_config,
            &options.base_options.op_resolver,
            running_mode,
            packets_callback,
        )?;
        info!("Image classifier created in {} mode", running_mode);
        Ok(Self { api })
    }

    pub fn running_mode(&self) -> RunningMode {
        self.api.running_mode()
    }

    /// Classify one image, optionally restricted to `roi`. Image mode only.
    pub fn classify(
        &self,
        image: Image,
        roi: Option<NormalizedRect>,
    ) -> Result<ClassificationResult, TaskError> {
        let inputs = build_input_packets(image, None, roi)?;
        let outputs = self.api.process_image_data(inputs)?;
        Ok(decode_outputs(&outputs)?.0)
    }

    /// Classify one video frame. Video mode only; `timestamp_ms` must
    /// increase strictly across calls.
    pub fn classify_for_video(
        &self,
        image: Image,
        timestamp_ms: i64,
        roi: Option<NormalizedRect>,
    ) -> Result<ClassificationResult, TaskError> {
        let inputs = build_input_packets(image, Some(timestamp_ms), roi)?;
        let outputs = self.api.process_video_data(inputs)?;
        Ok(decode_outputs(&outputs)?.0)
    }

    /// Queue one live frame. Live-stream mode only; `timestamp_ms` must
    /// increase strictly across calls.
    ///
    /// `Ok` means the frame was accepted, not that it will be classified:
    /// a frame that arrives while another is in flight is dropped and never
    /// reaches the callback.
    pub fn classify_async(
        &self,
        image: Image,
        timestamp_ms: i64,
        roi: Option<NormalizedRect>,
    ) -> Result<(), TaskError> {
        let inputs = build_input_packets(image, Some(timestamp_ms), roi)?;
        self.api.send_live_stream_data(inputs)
    }

    /// Finish queued work and shut the engine down.
    /// Fails if already closed.
    pub fn close(&mut self) -> Result<(), TaskError> {
        self.api.close()
    }
}

impl Drop for ImageClassifier {
    fn drop(&mut self) {
        // Closing an already closed classifier is the expected failure here
        if let Err(e) = self.api.close() {
            if e.code() != Some(TaskErrorCode::RunnerNotStartedError) {
                warn!("Failed to close image classifier: {}", e);
            }
        }
    }
}

/// `IMAGE` and `NORM_RECT` input packets for one submission.
///
/// Without `timestamp_ms` the packets are left unstamped and the runner
/// assigns the next timestamp.
fn build_input_packets(
    image: Image,
    timestamp_ms: Option<i64>,
    roi: Option<NormalizedRect>,
) -> Result<PacketMap, TaskError> {
    if image.uses_gpu() {
        return Err(TaskError::invalid_argument(
            TaskErrorCode::RunnerUnexpectedInputError,
            "GPU input images are currently not supported.",
        ));
    }

    let timestamp = match timestamp_ms {
        Some(ms) => Timestamp::checked_from_millis(ms).ok_or_else(|| {
            TaskError::invalid_argument(
                TaskErrorCode::RunnerInvalidTimestampError,
                format!("Timestamp {ms}ms is out of range."),
            )
        })?,
        None => Timestamp::unset(),
    };
    let norm_rect = normalize_region(roi);
    Ok(PacketMap::from([
        (
            IMAGE_IN_STREAM_NAME.to_string(),
            Packet::new(image).at(timestamp),
        ),
        (
            NORM_RECT_STREAM_NAME.to_string(),
            Packet::new(norm_rect).at(timestamp),
        ),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vision_task_core::GpuBuffer;

    #[test]
    fn test_input_packets_share_timestamp() {
        let image = Image::from(image::RgbImage::new(8, 8));
        let packets = build_input_packets(image, Some(33), None).unwrap();

        let frame = &packets[IMAGE_IN_STREAM_NAME];
        let rect = &packets[NORM_RECT_STREAM_NAME];
        assert_eq!(frame.timestamp(), Timestamp::from_millis(33));
        assert_eq!(rect.timestamp(), frame.timestamp());
        assert_eq!(
            *rect.get::<NormalizedRect>().unwrap(),
            NormalizedRect::full_image()
        );
    }

    #[test]
    fn test_untimed_packets_left_unset() {
        let image = Image::from(image::RgbImage::new(8, 8));
        let roi = NormalizedRect::new(0.3, 0.3, 0.2, 0.2);
        let packets = build_input_packets(image, None, Some(roi)).unwrap();

        assert!(packets[IMAGE_IN_STREAM_NAME].timestamp().is_unset());
        assert_eq!(*packets[NORM_RECT_STREAM_NAME].get::<NormalizedRect>().unwrap(), roi);
    }

    #[test]
    fn test_out_of_range_timestamp_rejected() {
        let image = Image::from(image::RgbImage::new(8, 8));
        let err = build_input_packets(image, Some(i64::MIN / 1000 - 1), None).unwrap_err();
        assert_eq!(err.code(), Some(TaskErrorCode::RunnerInvalidTimestampError));
    }

    #[test]
    fn test_gpu_image_rejected() {
        let gpu = Image::from_gpu_buffer(GpuBuffer {
            texture_id: 1,
            width: 8,
            height: 8,
        });
        let err = build_input_packets(gpu, Some(1), None).unwrap_err();
        assert_eq!(err.code(), Some(TaskErrorCode::RunnerUnexpectedInputError));
        assert!(err.to_string().contains("GPU input images"));
    }
}
