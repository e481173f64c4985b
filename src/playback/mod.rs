//! Headless playback of episode containers.
//!
//! A [`PlaybackSession`] holds everything a viewer needs between frames: the
//! camera list, the current frame index, the frame interval and the joint
//! state series. Frames are read ahead by a [`FramePrefetcher`] running on a
//! blocking worker and arrive already in display (height, width, channel)
//! layout.

mod prefetch;
mod session;

use ndarray::{Array3, ArrayView3};

pub use prefetch::{DisplayFrame, FramePrefetcher, MAX_PREFETCH};
pub use session::{PlaybackSession, PlaybackStats, MAX_FPS};

/// Convert one channel-first frame into a contiguous channel-last frame.
pub fn to_display_layout(frame: ArrayView3<'_, u8>) -> Array3<u8> {
    frame
        .permuted_axes([1, 2, 0])
        .as_standard_layout()
        .into_owned()
}
