//! LogSink - logs a detection summary via tracing instead of writing images

use contracts::{ContractError, FrameSink, SaveRequest};
use tracing::{info, instrument};

/// Sink that only logs what would have been saved
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_detection(&self, request: &SaveRequest) {
        let largest = request.regions.iter().map(|r| r.pixels).max().unwrap_or(0);

        info!(
            sink = %self.name,
            frame_id = request.frame.frame_id,
            timestamp = request.frame.timestamp,
            width = request.frame.image.width,
            height = request.frame.image.height,
            regions = request.regions.len(),
            largest_region_px = largest,
            "Detection frame received"
        );
    }
}

impl FrameSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_save",
        skip(self, request),
        fields(sink = %self.name, frame_id = request.frame.frame_id)
    )]
    async fn save(&mut self, request: &SaveRequest) -> Result<(), ContractError> {
        self.log_detection(request);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DetectionKind, Frame, ImageData, Region};

    #[tokio::test]
    async fn test_log_sink_save() {
        let mut sink = LogSink::new("test_log");
        let request = SaveRequest {
            frame: Frame {
                frame_id: 7,
                timestamp: 1.5,
                image: ImageData::filled(8, 8, 10),
            },
            regions: vec![Region {
                x: 0,
                y: 0,
                width: 4,
                height: 4,
                pixels: 16,
                kind: DetectionKind::Motion,
            }],
        };

        assert!(sink.save(&request).await.is_ok());
        assert_eq!(sink.name(), "test_log");
    }
}
