/// Fatal game errors.
///
/// Anything that reaches `main` as a `GameError` ends the process: the game
/// cannot run without its level images or its terminal. Recoverable trouble
/// (audio, gamepad, config) is logged where it happens and never gets here.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("could not load level image {}: {source}", .path.display())]
    LevelImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("level {0} does not exist")]
    MissingLevel(i32),

    #[error("terminal error: {0}")]
    Io(#[from] std::io::Error),
}
