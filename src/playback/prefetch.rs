//! Background frame prefetch.

use std::path::PathBuf;

use ndarray::Array3;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::to_display_layout;
use crate::container::ContainerReader;
use crate::error::ContainerError;

/// Upper bound on the number of buffered frames.
pub const MAX_PREFETCH: usize = 1024;

/// Every camera's frame for one playback step, in display layout.
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    pub index: usize,
    /// `(camera key, height x width x channel frame)` in camera order.
    pub cameras: Vec<(String, Array3<u8>)>,
}

/// Reads frames ahead of playback on a blocking worker.
///
/// At most `capacity` frames are buffered, clamped to `1..=MAX_PREFETCH`.
/// Dropping the prefetcher closes the channel and the worker stops at its
/// next send.
pub struct FramePrefetcher {
    receiver: mpsc::Receiver<Result<DisplayFrame, ContainerError>>,
    worker: JoinHandle<()>,
}

impl FramePrefetcher {
    /// Start prefetching frames `start..end` of `cameras` from `path`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        path: PathBuf,
        cameras: Vec<String>,
        start: usize,
        end: usize,
        capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.clamp(1, MAX_PREFETCH));

        let worker = tokio::task::spawn_blocking(move || {
            let reader = match ContainerReader::open(&path) {
                Ok(reader) => reader,
                Err(e) => {
                    let _ = sender.blocking_send(Err(e));
                    return;
                }
            };

            for index in start..end {
                let frame = read_display_frame(&reader, &cameras, index);
                let failed = frame.is_err();
                if sender.blocking_send(frame).is_err() {
                    tracing::debug!(index, "Playback stopped, prefetch worker exiting");
                    return;
                }
                if failed {
                    return;
                }
            }
        });

        Self { receiver, worker }
    }

    /// Next prefetched frame; `None` once the range is exhausted.
    pub async fn next(&mut self) -> Option<Result<DisplayFrame, ContainerError>> {
        self.receiver.recv().await
    }

    /// Stop prefetching and wait for the worker to exit.
    pub async fn finish(self) {
        let Self { receiver, worker } = self;
        drop(receiver);
        if let Err(e) = worker.await {
            tracing::warn!(error = %e, "Prefetch worker panicked");
        }
    }
}

fn read_display_frame(
    reader: &ContainerReader,
    cameras: &[String],
    index: usize,
) -> Result<DisplayFrame, ContainerError> {
    let mut frames = Vec::with_capacity(cameras.len());
    for camera in cameras {
        let frame = reader.read_frame(camera, index)?;
        frames.push((camera.clone(), to_display_layout(frame.view())));
    }
    Ok(DisplayFrame {
        index,
        cameras: frames,
    })
}
