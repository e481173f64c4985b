//! Consistency checks run before an episode is written.

use crate::episode::Episode;
use crate::error::EpisodeError;

/// Check that every camera has exactly one frame per state row.
///
/// Also covers the action rows, which the container readers assume match the
/// state rows.
pub fn check_step_counts(episode: &Episode) -> Result<(), EpisodeError> {
    let steps = episode.steps();

    if episode.action.nrows() != steps {
        return Err(EpisodeError::ShapeMismatch {
            column: "action".to_string(),
            reason: format!(
                "{} action rows do not match {} state rows",
                episode.action.nrows(),
                steps
            ),
        });
    }

    for (camera, frames) in &episode.cameras {
        let count = frames.shape()[0];
        if count != steps {
            return Err(EpisodeError::StepCountMismatch {
                camera: camera.key().to_string(),
                steps,
                frames: count,
            });
        }
    }

    Ok(())
}
