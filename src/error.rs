use thiserror::Error;

// Main crate error type

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Load Error: {0}")]
    Load(#[from] LoadError),
    #[error("Config Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Processing Error: {0}")]
    Processing(#[from] ProcessingError),
    #[error("Queue Error: {0}")]
    Queue(#[from] QueueError),
}

/// Raised while resolving a stage-type name to an implementation.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("No stage implementation registered for \"{0}\"")]
    UnknownStage(String),
}

/// Raised while constructing a stage from its configuration. Construction
/// aborts on the first invalid key; no partially built stage is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Stage config missing key: {0}")]
    MissingKey(String),
    #[error("Invalid value for config key \"{key}\": {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Raised by a single `process` invocation. Scoped to that one item: the
/// hosting runner logs it, drops the item and keeps its workers alive.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Frame shape {got:?} does not match background model shape {expected:?}")]
    ShapeMismatch { expected: (u32, u32), got: (u32, u32) },
    #[error("Frame carries no pixel planes")]
    EmptyFrame,
    #[error("Failed to persist training frame: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("The queue is closed.")]
    Closed,
}
