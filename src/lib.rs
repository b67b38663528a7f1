pub mod config;
pub mod error;
pub mod frame;
pub mod queue;
pub mod stage;
pub mod vision;

pub use config::{Settings, StageConfig};
pub use error::{ConfigError, LoadError, ProcessingError, QueueError, StageError};
pub use frame::{Frame, FramePacket, Metadata};
pub use queue::FrameQueue;
pub use stage::{KeyFrameTrigger, Passthrough, Stage, StageRegistry, StageRunner, Verdict};
