use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort loading a level. Anything not listed here is logged and skipped.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("Failed to read level {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("This level requires version {required} or greater of the game engine. Yours is {current}")]
    RequiresNewerEngine { required: String, current: String },
    #[error("Level {0} has no theme: a brickset is required")]
    MissingTheme(PathBuf),
    #[error("Duplicate theme in {path} near line {line}")]
    DuplicateTheme { path: PathBuf, line: usize },
    #[error("Can't spawn \"{0}\": entity does not exist")]
    UnknownEntity(String),
    #[error("Can't spawn \"{0}\": object is not an entity")]
    NotAnEntity(String),
    #[error("Duplicate entry of player '{name}' in {path} near line {line}")]
    DuplicatePlayer {
        name: String,
        path: PathBuf,
        line: usize,
    },
    #[error("Can't have more than {max} players per level in {path} near line {line}")]
    TooManyPlayers {
        max: usize,
        path: PathBuf,
        line: usize,
    },
    #[error("{0}")]
    Brickset(String),
    #[error("Scripting error: {0}")]
    Script(String),
}
