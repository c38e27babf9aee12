//! Build the save worker from configuration

use contracts::{SaveConfig, SaveSinkType};
use tracing::info;

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::sinks::{FileSink, FileSinkConfig, LogSink};

/// Create and spawn the configured sink.
///
/// Returns `None` when saving is disabled. Must be called inside a tokio runtime.
pub fn create_sink(config: &SaveConfig) -> Result<Option<SinkHandle>, DispatcherError> {
    if !config.enabled {
        info!("Saving disabled");
        return Ok(None);
    }

    let handle = match config.sink {
        SaveSinkType::Log => SinkHandle::spawn(LogSink::new("log"), config.queue_capacity),
        SaveSinkType::File => {
            let sink_config = FileSinkConfig {
                output_dir: config.output_dir.clone(),
                image_format: config.image_format,
                write_regions: true,
                annotate: true,
            };
            let sink =
                FileSink::new("file", sink_config).map_err(|source| DispatcherError::OutputDir {
                    path: config.output_dir.clone(),
                    source,
                })?;
            SinkHandle::spawn(sink, config.queue_capacity)
        }
    };

    info!(
        sink = handle.name(),
        queue_capacity = config.queue_capacity,
        "Save sink started"
    );
    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_log_sink() {
        let handle = create_sink(&SaveConfig::default()).unwrap().unwrap();
        assert_eq!(handle.name(), "log");
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_create_file_sink_makes_dir() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("nested/captures");
        let config = SaveConfig {
            sink: SaveSinkType::File,
            output_dir: output_dir.clone(),
            ..Default::default()
        };

        let handle = create_sink(&config).unwrap().unwrap();
        assert_eq!(handle.name(), "file");
        assert!(output_dir.is_dir());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_disabled_saving() {
        let config = SaveConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(create_sink(&config).unwrap().is_none());
    }
}
